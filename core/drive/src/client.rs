//! Google Drive API client.

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use clipdrive_common::{Error, FolderId, Result};

use crate::auth::TokenManager;

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type Drive uses for folders.
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Metadata fields requested for files and folders.
const FILE_FIELDS: &str = "id,name,mimeType,size,parents,trashed,capabilities(canAddChildren)";

/// Account that authorized the stored token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    /// Email address of the account.
    #[serde(default)]
    pub email_address: Option<String>,
    /// Display name of the account.
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AboutResponse {
    user: DriveUser,
}

/// What the authenticated account may do with a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Whether new children can be created inside this folder.
    #[serde(default)]
    pub can_add_children: bool,
}

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes (only for files, not folders).
    #[serde(default)]
    pub size: Option<String>,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Trashed status.
    #[serde(default)]
    pub trashed: bool,
    /// Capabilities of the authenticated account on this file.
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Get size as u64. Drive reports sizes as strings.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }

    /// Whether the account can upload into this folder.
    pub fn can_add_children(&self) -> bool {
        self.capabilities
            .as_ref()
            .map(|c| c.can_add_children)
            .unwrap_or(false)
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Query selecting non-trashed folders.
fn folders_query() -> &'static str {
    "mimeType='application/vnd.google-apps.folder' and trashed=false"
}

/// Query selecting non-trashed children of a folder.
fn children_query(folder_id: &FolderId) -> String {
    format!("'{}' in parents and trashed=false", folder_id.as_str())
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    token_manager: Arc<TokenManager>,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(token_manager: Arc<TokenManager>) -> Self {
        let http = Client::builder()
            .user_agent("clipdrive/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            token_manager,
        }
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.token_manager.access_token().await?;
        Ok(format!("Bearer {}", token))
    }

    /// Identify the account the stored token belongs to.
    pub async fn about_user(&self) -> Result<DriveUser> {
        let url = format!("{}/about", DRIVE_API_BASE);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", "user")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to query account info: {}", e)))?;

        let about: AboutResponse = handle_response(response).await?;
        Ok(about.user)
    }

    /// Get file metadata by ID, including trash state and capabilities.
    pub async fn get_file(&self, file_id: &str) -> Result<DriveFile> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get file: {}", e)))?;

        handle_response(response).await
    }

    /// List the account's folders, most recently modified first.
    ///
    /// Used as remediation when the configured folder ID turns out to be
    /// unreachable: the caller shows this list so the user can pick the
    /// right ID.
    pub async fn list_folders(&self, page_size: u32) -> Result<Vec<DriveFile>> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let auth = self.auth_header().await?;
        let page_size = page_size.to_string();

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[
                ("q", folders_query()),
                ("orderBy", "modifiedTime desc"),
                ("pageSize", page_size.as_str()),
                ("fields", "files(id,name,parents)"),
            ])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list folders: {}", e)))?;

        let list: FileListResponse = handle_response(response).await?;
        Ok(list.files)
    }

    /// List all non-trashed children of a folder.
    pub async fn list_children(&self, folder_id: &FolderId) -> Result<Vec<DriveFile>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let query = children_query(folder_id);

        loop {
            let url = format!("{}/files", DRIVE_API_BASE);
            let auth = self.auth_header().await?;

            let mut request = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, auth)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "files(id,name,mimeType,size,trashed),nextPageToken"),
                    ("pageSize", "1000"),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to list folder: {}", e)))?;

            let list: FileListResponse = handle_response(response).await?;
            all_files.extend(list.files);

            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Upload a new file into a folder.
    ///
    /// Always creates a new file; Drive allows multiple children with the
    /// same name, and clipping filenames carry their own timestamps.
    pub async fn upload(
        &self,
        name: &str,
        folder_id: &FolderId,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let url = format!("{}/files?uploadType=multipart", DRIVE_UPLOAD_BASE);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id.as_str()]
        });

        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| Error::Serialization(format!("Failed to serialize metadata: {}", e)))?;

        let boundary = "clipdrive_boundary";
        let body = multipart_body(boundary, &metadata_json, mime_type, &data);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        handle_response(response).await
    }
}

/// Assemble a `multipart/related` upload body: JSON metadata part followed
/// by the file content part.
fn multipart_body(boundary: &str, metadata_json: &str, mime_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--", boundary).as_bytes());

    body
}

/// Handle API response with error mapping.
///
/// A 403 whose body names an insufficient-permission reason maps to the
/// scope error: the stored token was granted a narrower scope than the
/// operation needs, and only deleting and regenerating it can fix that.
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)));
    }

    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED => Err(Error::Authentication(
            "Invalid or expired token".to_string(),
        )),
        StatusCode::FORBIDDEN if body_names_scope_problem(&body) => Err(Error::InsufficientScope(
            "the stored token does not grant access to this resource".to_string(),
        )),
        StatusCode::FORBIDDEN => Err(Error::PermissionDenied(format!(
            "Access denied: {}",
            summarize_body(&body)
        ))),
        StatusCode::NOT_FOUND => Err(Error::NotFound("Resource not found".to_string())),
        _ => Err(Error::Network(format!(
            "API error: {} - {}",
            status,
            summarize_body(&body)
        ))),
    }
}

/// Whether a 403 body blames the token's granted scope.
fn body_names_scope_problem(body: &str) -> bool {
    body.contains("insufficientPermissions")
        || body.contains("insufficientFilePermissions")
        || body.contains("insufficientScopes")
}

fn summarize_body(body: &str) -> &str {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_file_is_folder() {
        let folder = DriveFile {
            id: "1".to_string(),
            name: "clippings".to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            size: None,
            parents: vec![],
            trashed: false,
            capabilities: None,
        };
        assert!(folder.is_folder());

        let file = DriveFile {
            id: "2".to_string(),
            name: "clip.md".to_string(),
            mime_type: "text/markdown".to_string(),
            size: Some("1024".to_string()),
            parents: vec![],
            trashed: false,
            capabilities: None,
        };
        assert!(!file.is_folder());
        assert_eq!(file.size_bytes(), Some(1024));
    }

    #[test]
    fn test_drive_file_from_api_json() {
        let json = r#"{
            "id": "1AbC",
            "name": "Clippings",
            "mimeType": "application/vnd.google-apps.folder",
            "trashed": false,
            "capabilities": {"canAddChildren": true}
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert!(file.is_folder());
        assert!(!file.trashed);
        assert!(file.can_add_children());
        assert_eq!(file.size_bytes(), None);
    }

    #[test]
    fn test_capabilities_default_to_no_access() {
        let json = r#"{"id": "1", "name": "x", "mimeType": "text/plain"}"#;
        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert!(!file.can_add_children());
    }

    #[test]
    fn test_children_query_embeds_folder_id() {
        let folder = FolderId::new("1AbC").unwrap();
        assert_eq!(
            children_query(&folder),
            "'1AbC' in parents and trashed=false"
        );
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("b", r#"{"name":"x"}"#, "text/markdown", b"hello");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with("--b\r\n"));
        assert!(text.contains("Content-Type: application/json; charset=UTF-8"));
        assert!(text.contains("Content-Type: text/markdown"));
        assert!(text.contains("hello"));
        assert!(text.ends_with("--b--"));
    }

    #[test]
    fn test_scope_problem_detection() {
        let body = r#"{"error": {"errors": [{"reason": "insufficientPermissions"}]}}"#;
        assert!(body_names_scope_problem(body));
        assert!(!body_names_scope_problem(r#"{"error": "rateLimitExceeded"}"#));
    }

    #[test]
    fn test_user_from_api_json() {
        let json = r#"{"user": {"emailAddress": "a@b.c", "displayName": "A"}}"#;
        let about: AboutResponse = serde_json::from_str(json).unwrap();
        assert_eq!(about.user.email_address.as_deref(), Some("a@b.c"));
        assert_eq!(about.user.display_name.as_deref(), Some("A"));
    }
}
