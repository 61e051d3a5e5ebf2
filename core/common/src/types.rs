//! Common types used throughout clipdrive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth scope URL granting access only to files created by this application.
const SCOPE_APP_FILES_URL: &str = "https://www.googleapis.com/auth/drive.file";
/// OAuth scope URL granting access to all files and folders of the account.
const SCOPE_FULL_DRIVE_URL: &str = "https://www.googleapis.com/auth/drive";

/// Identifier of a pre-existing Google Drive folder.
///
/// Folder IDs are opaque strings assigned by Drive; they are read from
/// configuration and never generated locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(String);

impl FolderId {
    /// Create a new FolderId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "Folder ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// OAuth permission boundary requested from (and granted by) the provider.
///
/// Scope is fixed when a token is issued. A stored token granted the
/// restrictive scope cannot be widened by reconfiguration; the artifact must
/// be deleted and regenerated through a new consent flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    /// Only files and folders created by this application (`drive.file`).
    AppFiles,
    /// All files and folders owned by the authenticated account (`drive`).
    FullDrive,
}

impl AccessScope {
    /// The scope URL sent to the authorization endpoint.
    pub fn as_url(&self) -> &'static str {
        match self {
            AccessScope::AppFiles => SCOPE_APP_FILES_URL,
            AccessScope::FullDrive => SCOPE_FULL_DRIVE_URL,
        }
    }

    /// Parse a scope URL returned by the provider.
    pub fn from_url(url: &str) -> Option<Self> {
        match url {
            SCOPE_APP_FILES_URL => Some(AccessScope::AppFiles),
            SCOPE_FULL_DRIVE_URL => Some(AccessScope::FullDrive),
            _ => None,
        }
    }

    /// Parse a user-facing scope name as used by CLI flags.
    ///
    /// # Errors
    /// - Unknown scope name
    pub fn parse_name(name: &str) -> crate::Result<Self> {
        match name {
            "app-files" | "drive.file" => Ok(AccessScope::AppFiles),
            "full" | "drive" => Ok(AccessScope::FullDrive),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown scope '{}'. Use: full or app-files",
                other
            ))),
        }
    }

    /// Check whether a list of granted scope URLs satisfies this requirement.
    ///
    /// The broad `drive` scope covers `drive.file` requirements; the reverse
    /// never holds.
    pub fn granted_by(&self, granted: &[String]) -> bool {
        if granted.iter().any(|s| s == SCOPE_FULL_DRIVE_URL) {
            return true;
        }
        granted.iter().any(|s| s == self.as_url())
    }
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessScope::AppFiles => write!(f, "app-files ({})", SCOPE_APP_FILES_URL),
            AccessScope::FullDrive => write!(f, "full ({})", SCOPE_FULL_DRIVE_URL),
        }
    }
}
