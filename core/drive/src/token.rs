//! Stored OAuth token artifact.
//!
//! The artifact is serialized in Google's "authorized user" JSON layout so
//! files written here are interchangeable with ones produced by the
//! provider's own tooling. The granted scope list is recorded at issuance
//! and never changes for the lifetime of the artifact; switching scope
//! requires deleting the file and running the consent flow again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use clipdrive_common::{AccessScope, Error, Result};

/// Token URI recorded in artifacts generated by this tool.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// OAuth credential produced by a successful consent flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenArtifact {
    /// Current access token.
    #[serde(rename = "token")]
    pub access_token: String,
    /// Refresh token used to obtain new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token endpoint used for refresh.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// OAuth client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Client secret, carried so refresh works without the secret file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Scope URLs granted at issuance.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenArtifact {
    /// Check if the access token is expired or about to expire.
    ///
    /// An artifact without a recorded expiry is treated as expired so the
    /// next use refreshes it and records one.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            // Consider expired if less than 5 minutes remaining
            Some(expiry) => expiry < Utc::now() + Duration::minutes(5),
            None => true,
        }
    }

    /// Check whether the granted scopes satisfy a requirement.
    pub fn grants(&self, scope: AccessScope) -> bool {
        scope.granted_by(&self.scopes)
    }

    /// Parse an artifact from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Token(format!("Invalid token JSON: {}", e)))
    }

    /// Render the artifact as JSON for storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize token: {}", e)))
    }
}

/// Where the configured token artifact comes from.
///
/// `GOOGLE_TOKEN_JSON` accepts either a filesystem path or the token JSON
/// itself, so deployments can inject the credential without a file.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Artifact stored in a file.
    File(PathBuf),
    /// Artifact passed inline as a JSON string.
    Inline(String),
}

impl TokenSource {
    /// Classify a raw `GOOGLE_TOKEN_JSON` value.
    ///
    /// An existing file wins; otherwise anything that looks like a JSON
    /// object is treated as an inline token, and the rest as a (possibly
    /// missing) path so load errors name the path instead of a parse error.
    pub fn detect(raw: &str) -> Self {
        let trimmed = raw.trim();
        if Path::new(trimmed).is_file() {
            return TokenSource::File(PathBuf::from(trimmed));
        }
        if trimmed.starts_with('{') {
            return TokenSource::Inline(trimmed.to_string());
        }
        TokenSource::File(PathBuf::from(trimmed))
    }

    /// Load the token artifact from this source.
    pub fn load(&self) -> Result<TokenArtifact> {
        match self {
            TokenSource::File(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    Error::Token(format!(
                        "Cannot read token file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                TokenArtifact::from_json(&json)
            }
            TokenSource::Inline(json) => TokenArtifact::from_json(json),
        }
    }

    /// Human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenSource::File(path) => format!("file path ({})", path.display()),
            TokenSource::Inline(json) => {
                format!("inline JSON ({} chars)", json.chars().count())
            }
        }
    }

    /// The backing file path, when this source is file-based.
    pub fn path(&self) -> Option<&Path> {
        match self {
            TokenSource::File(path) => Some(path.as_path()),
            TokenSource::Inline(_) => None,
        }
    }
}

/// File-backed persistence for the token artifact.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store backed by the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an artifact currently exists at the backing path.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Size of the stored artifact in bytes, if present.
    pub fn size(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }

    /// Load the stored artifact.
    pub fn load(&self) -> Result<TokenArtifact> {
        TokenSource::File(self.path.clone()).load()
    }

    /// Write the artifact, creating parent directories as needed.
    pub fn save(&self, artifact: &TokenArtifact) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, artifact.to_json()?)?;
        tracing::info!("Token saved to {}", self.path.display());
        Ok(())
    }

    /// Delete the stored artifact.
    ///
    /// This is the remediation for an artifact granted an insufficient
    /// scope: delete, then run the consent flow again.
    pub fn delete(&self) -> Result<()> {
        if self.exists() {
            std::fs::remove_file(&self.path)?;
            tracing::info!("Token deleted: {}", self.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipdrive_common::AccessScope;

    /// JSON as written by the provider's own tooling.
    const PROVIDER_TOKEN_JSON: &str = r#"{
        "token": "ya29.a0AfH6SMB-example",
        "refresh_token": "1//0example-refresh",
        "token_uri": "https://oauth2.googleapis.com/token",
        "client_id": "123-abc.apps.googleusercontent.com",
        "client_secret": "GOCSPX-example",
        "scopes": ["https://www.googleapis.com/auth/drive"],
        "expiry": "2024-01-01T00:00:00Z"
    }"#;

    fn sample_artifact() -> TokenArtifact {
        TokenArtifact::from_json(PROVIDER_TOKEN_JSON).unwrap()
    }

    #[test]
    fn test_parse_provider_format() {
        let artifact = sample_artifact();
        assert_eq!(artifact.access_token, "ya29.a0AfH6SMB-example");
        assert_eq!(
            artifact.refresh_token.as_deref(),
            Some("1//0example-refresh")
        );
        assert_eq!(artifact.scopes.len(), 1);
        assert!(artifact.grants(AccessScope::FullDrive));
    }

    #[test]
    fn test_round_trip_keeps_field_names() {
        let artifact = sample_artifact();
        let json = artifact.to_json().unwrap();
        // "token", not "access_token", on disk
        assert!(json.contains("\"token\""));
        assert!(!json.contains("\"access_token\""));
        let reparsed = TokenArtifact::from_json(&json).unwrap();
        assert_eq!(reparsed.access_token, artifact.access_token);
        assert_eq!(reparsed.scopes, artifact.scopes);
    }

    #[test]
    fn test_minimal_artifact_defaults() {
        let artifact = TokenArtifact::from_json(r#"{"token": "abc"}"#).unwrap();
        assert_eq!(artifact.token_uri, GOOGLE_TOKEN_URI);
        assert!(artifact.refresh_token.is_none());
        assert!(artifact.scopes.is_empty());
        assert!(artifact.is_expired());
    }

    #[test]
    fn test_expiry_skew() {
        let mut artifact = sample_artifact();

        artifact.expiry = Some(Utc::now() + Duration::hours(1));
        assert!(!artifact.is_expired());

        // 4 minutes remaining falls inside the 5 minute window
        artifact.expiry = Some(Utc::now() + Duration::minutes(4));
        assert!(artifact.is_expired());

        artifact.expiry = Some(Utc::now() - Duration::hours(1));
        assert!(artifact.is_expired());
    }

    #[test]
    fn test_restricted_grant_does_not_cover_full() {
        let mut artifact = sample_artifact();
        artifact.scopes = vec!["https://www.googleapis.com/auth/drive.file".to_string()];
        assert!(artifact.grants(AccessScope::AppFiles));
        assert!(!artifact.grants(AccessScope::FullDrive));
    }

    #[test]
    fn test_source_detect_inline() {
        let source = TokenSource::detect("  {\"token\": \"abc\"}  ");
        assert!(matches!(source, TokenSource::Inline(_)));
        let artifact = source.load().unwrap();
        assert_eq!(artifact.access_token, "abc");
    }

    #[test]
    fn test_source_detect_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, PROVIDER_TOKEN_JSON).unwrap();

        let source = TokenSource::detect(path.to_str().unwrap());
        assert!(matches!(source, TokenSource::File(_)));
        let artifact = source.load().unwrap();
        assert_eq!(artifact.access_token, "ya29.a0AfH6SMB-example");
    }

    #[test]
    fn test_source_missing_file_names_path() {
        let source = TokenSource::detect("credentials/no-such-token.json");
        let err = source.load().unwrap_err();
        assert!(err.to_string().contains("no-such-token.json"));
    }

    #[test]
    fn test_store_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("credentials").join("token.json"));

        assert!(!store.exists());
        assert!(store.size().is_none());

        store.save(&sample_artifact()).unwrap();
        assert!(store.exists());
        assert!(store.size().unwrap() > 0);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.access_token, sample_artifact().access_token);

        store.delete().unwrap();
        assert!(!store.exists());
        // Deleting twice is fine
        store.delete().unwrap();
    }
}
