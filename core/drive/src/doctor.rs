//! Setup diagnostics.
//!
//! Encodes the manual troubleshooting procedure as inspectable checks: is
//! the environment configured, does the token artifact parse and grant a
//! usable scope, and is the configured folder actually reachable. Checks
//! never mutate state; each failure carries the remediation the user should
//! apply.

use clipdrive_common::{AccessScope, Error, FolderId};

use crate::client::{DriveClient, DriveFile};
use crate::config::{Settings, ENV_API_KEY, ENV_FOLDER_ID, ENV_TOKEN_JSON};
use crate::token::{TokenArtifact, TokenSource};

/// Remediation for a token whose granted scope is too narrow. Scope is
/// fixed at issuance; reconfiguration cannot widen it.
pub const SCOPE_REMEDIATION: &str =
    "Delete the token file and run 'clipdrive generate-token --scope full' to re-consent";

/// Outcome of a single diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Configured and usable.
    Pass,
    /// Usable, but worth attention.
    Warn,
    /// Broken; the remediation hint applies.
    Fail,
}

/// One diagnostic finding.
#[derive(Debug, Clone)]
pub struct Check {
    /// What was checked.
    pub label: String,
    /// Outcome.
    pub status: CheckStatus,
    /// What was observed.
    pub detail: String,
    /// How to fix it, when the status calls for action.
    pub hint: Option<String>,
}

impl Check {
    fn pass(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            status: CheckStatus::Pass,
            detail: detail.into(),
            hint: None,
        }
    }

    fn warn(label: &str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            status: CheckStatus::Warn,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn fail(label: &str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            status: CheckStatus::Fail,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }
}

/// Token diagnostics along with the artifact when it loaded.
#[derive(Debug)]
pub struct TokenReport {
    /// Individual findings.
    pub checks: Vec<Check>,
    /// The parsed artifact, when loading succeeded.
    pub artifact: Option<TokenArtifact>,
}

/// Result of probing the configured folder.
#[derive(Debug)]
pub enum FolderAccess {
    /// The folder answered; metadata attached.
    Accessible(DriveFile),
    /// The folder did not answer; alternatives help pick the right ID.
    Unreachable {
        /// Why the lookup failed.
        error: Error,
        /// Recent folders the account can see, for correcting the ID.
        alternatives: Vec<DriveFile>,
    },
}

/// Inspect the environment configuration.
pub fn check_environment(settings: &Settings) -> Vec<Check> {
    let mut checks = Vec::new();

    match &settings.api_key {
        Some(_) => checks.push(Check::pass(ENV_API_KEY, "set")),
        None => checks.push(Check::warn(
            ENV_API_KEY,
            "not set",
            "Only needed by the summarizer; add it to .env if you use it",
        )),
    }

    checks.push(token_env_check(settings));

    match &settings.folder_id {
        Some(id) => checks.push(Check::pass(ENV_FOLDER_ID, id.as_str())),
        None => checks.push(Check::fail(
            ENV_FOLDER_ID,
            "not set",
            "Set it to the target folder's ID in .env; 'clipdrive list-folders' shows candidates",
        )),
    }

    checks
}

fn token_env_check(settings: &Settings) -> Check {
    let source = settings.token_source();

    if settings.token_json.is_none() {
        return match &source {
            TokenSource::File(path) if path.is_file() => Check::warn(
                ENV_TOKEN_JSON,
                format!("not set, found token at default path {}", path.display()),
                format!("Add {}={} to your .env file", ENV_TOKEN_JSON, path.display()),
            ),
            _ => Check::fail(
                ENV_TOKEN_JSON,
                "not set and no token at the default path",
                "Run 'clipdrive generate-token', then point GOOGLE_TOKEN_JSON at the token file",
            ),
        };
    }

    match &source {
        TokenSource::File(path) => match std::fs::metadata(path) {
            Ok(meta) => Check::pass(
                ENV_TOKEN_JSON,
                format!("{}, {} bytes", source.describe(), meta.len()),
            ),
            Err(_) => Check::fail(
                ENV_TOKEN_JSON,
                format!("{}, but the file does not exist", source.describe()),
                "Fix the path, or run 'clipdrive generate-token' to create a token",
            ),
        },
        TokenSource::Inline(_) => Check::pass(ENV_TOKEN_JSON, source.describe()),
    }
}

/// Inspect the token artifact itself.
pub fn check_token(settings: &Settings) -> TokenReport {
    let source = settings.token_source();

    let artifact = match source.load() {
        Ok(artifact) => artifact,
        Err(e) => {
            return TokenReport {
                checks: vec![Check::fail(
                    "token artifact",
                    e.to_string(),
                    "Run 'clipdrive generate-token' to create a fresh token",
                )],
                artifact: None,
            };
        }
    };

    let mut checks = Vec::new();

    if artifact.scopes.is_empty() {
        checks.push(Check::warn(
            "granted scope",
            "artifact records no scopes",
            SCOPE_REMEDIATION,
        ));
    } else if artifact.grants(AccessScope::FullDrive) {
        checks.push(Check::pass("granted scope", AccessScope::FullDrive.to_string()));
    } else if artifact.grants(AccessScope::AppFiles) {
        // drive.file cannot see folders created outside this app
        checks.push(Check::warn(
            "granted scope",
            format!(
                "{}; pre-existing folders may be unreachable",
                AccessScope::AppFiles
            ),
            SCOPE_REMEDIATION,
        ));
    } else {
        checks.push(Check::warn(
            "granted scope",
            artifact.scopes.join(", "),
            SCOPE_REMEDIATION,
        ));
    }

    if artifact.refresh_token.is_none() {
        checks.push(Check::fail(
            "refresh token",
            "missing; the token cannot outlive its access token",
            "Run 'clipdrive generate-token' to re-consent with offline access",
        ));
    } else if artifact.is_expired() {
        checks.push(Check::warn(
            "access token",
            "expired; it will be refreshed on first use",
            "No action needed",
        ));
    } else {
        checks.push(Check::pass("access token", "valid"));
    }

    TokenReport {
        checks,
        artifact: Some(artifact),
    }
}

/// Probe the configured folder.
///
/// On failure, recent folders are listed so the user can correct
/// `GOOGLE_DRIVE_FOLDER_ID`; the listing itself failing (e.g. restrictive
/// scope) just leaves the alternatives empty.
pub async fn check_folder(client: &DriveClient, folder_id: &FolderId) -> FolderAccess {
    match client.get_file(folder_id.as_str()).await {
        Ok(file) => FolderAccess::Accessible(file),
        Err(error) => {
            let alternatives = client.list_folders(10).await.unwrap_or_default();
            FolderAccess::Unreachable {
                error,
                alternatives,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipdrive_common::FolderId;
    use std::path::PathBuf;

    fn settings_with(token_json: Option<String>, folder: Option<&str>) -> Settings {
        Settings {
            api_key: None,
            token_json,
            folder_id: folder.map(|f| FolderId::new(f).unwrap()),
            client_secret_path: PathBuf::from("credentials/client_secret.json"),
        }
    }

    fn token_json(scopes: &[&str], refresh: bool) -> String {
        let refresh_field = if refresh {
            "\"refresh_token\": \"1//r\","
        } else {
            ""
        };
        format!(
            r#"{{"token": "ya29.x", {} "scopes": [{}], "expiry": "2099-01-01T00:00:00Z"}}"#,
            refresh_field,
            scopes
                .iter()
                .map(|s| format!("\"{}\"", s))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    #[test]
    fn test_environment_all_missing() {
        let checks = check_environment(&settings_with(None, None));

        let folder = checks.iter().find(|c| c.label == ENV_FOLDER_ID).unwrap();
        assert_eq!(folder.status, CheckStatus::Fail);
        assert!(folder.hint.is_some());

        let token = checks.iter().find(|c| c.label == ENV_TOKEN_JSON).unwrap();
        assert_eq!(token.status, CheckStatus::Fail);
    }

    #[test]
    fn test_environment_token_path_missing_file() {
        let settings = settings_with(Some("credentials/ghost.json".to_string()), Some("1AbC"));
        let checks = check_environment(&settings);

        let token = checks.iter().find(|c| c.label == ENV_TOKEN_JSON).unwrap();
        assert_eq!(token.status, CheckStatus::Fail);
        assert!(token.detail.contains("does not exist"));

        let folder = checks.iter().find(|c| c.label == ENV_FOLDER_ID).unwrap();
        assert_eq!(folder.status, CheckStatus::Pass);
    }

    #[test]
    fn test_environment_inline_token_passes() {
        let settings = settings_with(Some("{\"token\": \"x\"}".to_string()), Some("1AbC"));
        let checks = check_environment(&settings);

        let token = checks.iter().find(|c| c.label == ENV_TOKEN_JSON).unwrap();
        assert_eq!(token.status, CheckStatus::Pass);
        assert!(token.detail.contains("inline JSON"));
    }

    #[test]
    fn test_environment_token_file_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, token_json(&[], true)).unwrap();

        let settings = settings_with(Some(path.to_str().unwrap().to_string()), Some("1AbC"));
        let checks = check_environment(&settings);

        let token = checks.iter().find(|c| c.label == ENV_TOKEN_JSON).unwrap();
        assert_eq!(token.status, CheckStatus::Pass);
        assert!(token.detail.contains("bytes"));
    }

    #[test]
    fn test_token_report_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();

        let settings = settings_with(Some(path.to_str().unwrap().to_string()), None);
        let report = check_token(&settings);

        assert!(report.artifact.is_none());
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks[0].status, CheckStatus::Fail);
    }

    #[test]
    fn test_token_report_full_scope() {
        let settings = settings_with(
            Some(token_json(&["https://www.googleapis.com/auth/drive"], true)),
            None,
        );
        let report = check_token(&settings);

        let scope = report
            .checks
            .iter()
            .find(|c| c.label == "granted scope")
            .unwrap();
        assert_eq!(scope.status, CheckStatus::Pass);
        assert!(report.artifact.is_some());
    }

    #[test]
    fn test_token_report_restricted_scope_warns_with_remediation() {
        let settings = settings_with(
            Some(token_json(
                &["https://www.googleapis.com/auth/drive.file"],
                true,
            )),
            None,
        );
        let report = check_token(&settings);

        let scope = report
            .checks
            .iter()
            .find(|c| c.label == "granted scope")
            .unwrap();
        assert_eq!(scope.status, CheckStatus::Warn);
        assert_eq!(scope.hint.as_deref(), Some(SCOPE_REMEDIATION));
    }

    #[test]
    fn test_token_report_missing_refresh_token_fails() {
        let settings = settings_with(
            Some(token_json(&["https://www.googleapis.com/auth/drive"], false)),
            None,
        );
        let report = check_token(&settings);

        let refresh = report
            .checks
            .iter()
            .find(|c| c.label == "refresh token")
            .unwrap();
        assert_eq!(refresh.status, CheckStatus::Fail);
    }
}
