//! Environment-based configuration.
//!
//! Settings are read from process environment variables, typically seeded
//! from a `.env` file loaded at program start. The variable names form the
//! external configuration contract and must not change.

use std::path::PathBuf;

use clipdrive_common::{Error, FolderId, Result};

use crate::token::TokenSource;

/// API key for unauthenticated Google API calls (used by sibling tooling).
pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
/// Token artifact: path to a token file, or the token JSON itself.
pub const ENV_TOKEN_JSON: &str = "GOOGLE_TOKEN_JSON";
/// Identifier of the pre-existing Drive folder clippings are uploaded into.
pub const ENV_FOLDER_ID: &str = "GOOGLE_DRIVE_FOLDER_ID";
/// Path to the OAuth client secret file used for token generation.
pub const ENV_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET_JSON";

/// Token path assumed when `GOOGLE_TOKEN_JSON` is not set.
pub const DEFAULT_TOKEN_PATH: &str = "credentials/token.json";
/// Client secret path assumed when `GOOGLE_CLIENT_SECRET_JSON` is not set.
pub const DEFAULT_CLIENT_SECRET_PATH: &str = "credentials/client_secret.json";

/// Snapshot of the environment configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Raw `GOOGLE_API_KEY` value, if set.
    pub api_key: Option<String>,
    /// Raw `GOOGLE_TOKEN_JSON` value, if set. May be a path or inline JSON.
    pub token_json: Option<String>,
    /// Target folder identifier, if set.
    pub folder_id: Option<FolderId>,
    /// Path to the OAuth client secret file.
    pub client_secret_path: PathBuf,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// Empty values are treated as unset.
    pub fn from_env() -> Self {
        let folder_id = read_var(ENV_FOLDER_ID).and_then(|v| FolderId::new(v).ok());
        let client_secret_path = read_var(ENV_CLIENT_SECRET)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_SECRET_PATH));

        Self {
            api_key: read_var(ENV_API_KEY),
            token_json: read_var(ENV_TOKEN_JSON),
            folder_id,
            client_secret_path,
        }
    }

    /// Resolve where the token artifact lives.
    ///
    /// Falls back to the default token path when `GOOGLE_TOKEN_JSON` is
    /// unset, so a freshly generated token is found without configuration.
    pub fn token_source(&self) -> TokenSource {
        match &self.token_json {
            Some(raw) => TokenSource::detect(raw),
            None => TokenSource::File(PathBuf::from(DEFAULT_TOKEN_PATH)),
        }
    }

    /// The configured folder, or a config error naming the variable.
    pub fn require_folder_id(&self) -> Result<&FolderId> {
        self.folder_id.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "{} is not set. Add it to your .env file",
                ENV_FOLDER_ID
            ))
        })
    }
}

fn read_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_settings() -> Settings {
        Settings {
            api_key: None,
            token_json: None,
            folder_id: None,
            client_secret_path: PathBuf::from(DEFAULT_CLIENT_SECRET_PATH),
        }
    }

    #[test]
    fn test_token_source_defaults_to_token_file() {
        let settings = empty_settings();
        match settings.token_source() {
            TokenSource::File(path) => {
                assert_eq!(path, PathBuf::from(DEFAULT_TOKEN_PATH));
            }
            TokenSource::Inline(_) => panic!("expected file source"),
        }
    }

    #[test]
    fn test_token_source_inline_json() {
        let settings = Settings {
            token_json: Some("{\"token\": \"abc\"}".to_string()),
            ..empty_settings()
        };
        assert!(matches!(settings.token_source(), TokenSource::Inline(_)));
    }

    #[test]
    fn test_require_folder_id_missing() {
        let settings = empty_settings();
        let err = settings.require_folder_id().unwrap_err();
        assert!(err.to_string().contains(ENV_FOLDER_ID));
    }

    #[test]
    fn test_require_folder_id_present() {
        let settings = Settings {
            folder_id: Some(FolderId::new("1AbC").unwrap()),
            ..empty_settings()
        };
        assert_eq!(settings.require_folder_id().unwrap().as_str(), "1AbC");
    }
}
