//! Upload helpers for clipping output files.

use std::path::Path;

use clipdrive_common::{Error, FolderId, Result};

use crate::client::DriveClient;

/// Resolve the MIME type for a clipping output file.
///
/// The archive pipeline produces Markdown, PDF, and HTML renditions;
/// anything else is uploaded as an opaque binary.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        _ => "application/octet-stream",
    }
}

/// Upload a local file into the configured Drive folder.
///
/// Returns the created file's Drive ID. The Drive filename defaults to the
/// local filename; `name_override` replaces it.
///
/// # Errors
/// - Local file unreadable
/// - Upload rejected (auth, scope, folder access)
pub async fn upload_clipping(
    client: &DriveClient,
    folder_id: &FolderId,
    path: &Path,
    name_override: Option<&str>,
) -> Result<String> {
    let name = match name_override {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .ok_or_else(|| {
                Error::InvalidInput(format!("Not a file path: {}", path.display()))
            })?,
    };

    let data = tokio::fs::read(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Cannot read {}: {}", path.display(), e),
        ))
    })?;

    let mime_type = mime_type_for(path);
    let size = data.len();

    let file = client.upload(&name, folder_id, mime_type, data).await?;

    tracing::info!(
        "Uploaded {} ({} bytes, {}) as {}",
        name,
        size,
        mime_type,
        file.id
    );

    Ok(file.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mime_type_known_extensions() {
        assert_eq!(mime_type_for(Path::new("clip.pdf")), "application/pdf");
        assert_eq!(mime_type_for(Path::new("clip.md")), "text/markdown");
        assert_eq!(mime_type_for(Path::new("clip.html")), "text/html");
        assert_eq!(mime_type_for(Path::new("clip.htm")), "text/html");
    }

    #[test]
    fn test_mime_type_is_case_insensitive() {
        assert_eq!(mime_type_for(Path::new("CLIP.PDF")), "application/pdf");
        assert_eq!(mime_type_for(Path::new("Clip.Md")), "text/markdown");
    }

    #[test]
    fn test_mime_type_fallback() {
        assert_eq!(
            mime_type_for(Path::new("archive.tar.gz")),
            "application/octet-stream"
        );
        assert_eq!(
            mime_type_for(&PathBuf::from("no_extension")),
            "application/octet-stream"
        );
    }
}
