//! OAuth2 authentication and token refresh for Google Drive.

use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, ClientSecret, RedirectUrl, Scope, TokenResponse,
    TokenUrl,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::path::Path;

use clipdrive_common::{AccessScope, Error, Result};

use crate::token::{TokenArtifact, TokenStore, GOOGLE_TOKEN_URI};

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Redirect URL used until the consent flow binds its loopback port.
const DEFAULT_REDIRECT_URL: &str = "http://127.0.0.1:8080/";

/// Configuration for OAuth2 authentication.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URL for the OAuth2 callback.
    pub redirect_url: String,
}

/// One OAuth client entry inside a client secret file.
#[derive(Debug, Deserialize)]
struct ClientSecretEntry {
    client_id: String,
    client_secret: String,
}

/// Layout of Google's `client_secret.json` download.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    #[serde(default)]
    installed: Option<ClientSecretEntry>,
    #[serde(default)]
    web: Option<ClientSecretEntry>,
}

impl AuthConfig {
    /// Load client credentials from a `client_secret.json` file.
    ///
    /// Accepts both the `installed` (desktop) and `web` layouts.
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Neither an `installed` nor a `web` section present
    pub fn from_client_secret_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Cannot read client secret file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: ClientSecretFile = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("Invalid client secret file: {}", e)))?;

        let entry = file.installed.or(file.web).ok_or_else(|| {
            Error::Config(
                "Client secret file has no 'installed' or 'web' section".to_string(),
            )
        })?;

        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
        })
    }

    /// Reconstruct client credentials from a stored token artifact.
    ///
    /// Artifacts carry the client id and secret they were issued to, so
    /// refresh works without the secret file being present.
    pub fn from_artifact(artifact: &TokenArtifact) -> Result<Self> {
        let client_id = artifact.client_id.clone().ok_or_else(|| {
            Error::Token("Token artifact has no client_id; cannot refresh".to_string())
        })?;
        let client_secret = artifact.client_secret.clone().ok_or_else(|| {
            Error::Token("Token artifact has no client_secret; cannot refresh".to_string())
        })?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
        })
    }
}

/// OAuth2 authentication manager for Google Drive.
pub struct AuthManager {
    client: BasicClient,
    config: AuthConfig,
}

impl AuthManager {
    /// Create a new authentication manager.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            Some(
                TokenUrl::new(GOOGLE_TOKEN_URI.to_string())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone())
                .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
        );

        Ok(Self { client, config })
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Requests offline access and forces the consent screen so a refresh
    /// token is issued even when the user authorized before. Returns the URL
    /// and the CSRF state that must match on callback.
    pub fn authorization_url(&self, scope: AccessScope) -> (String, String) {
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(oauth2::CsrfToken::new_random)
            .add_scope(Scope::new(scope.as_url().to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchange an authorization code for a token artifact.
    ///
    /// # Errors
    /// - Invalid authorization code
    /// - Provider did not issue a refresh token
    /// - Network errors
    pub async fn exchange_code(
        &self,
        code: &str,
        requested: AccessScope,
    ) -> Result<TokenArtifact> {
        use oauth2::reqwest::async_http_client;
        use oauth2::AuthorizationCode;

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {}", e)))?;

        let refresh_token = token_result
            .refresh_token()
            .ok_or_else(|| {
                Error::Authentication(
                    "No refresh token received. Ensure 'offline' access and 'consent' prompt were requested.".to_string(),
                )
            })?
            .secret()
            .clone();

        // The provider echoes the granted scopes; fall back to what we asked
        // for if it omits them.
        let scopes = token_result
            .scopes()
            .map(|s| s.iter().map(|scope| scope.to_string()).collect())
            .unwrap_or_else(|| vec![requested.as_url().to_string()]);

        let expires_in = token_result
            .expires_in()
            .unwrap_or_else(|| std::time::Duration::from_secs(3600));
        let expiry = Utc::now()
            + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

        Ok(TokenArtifact {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: Some(refresh_token),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            client_id: Some(self.config.client_id.clone()),
            client_secret: Some(self.config.client_secret.clone()),
            scopes,
            expiry: Some(expiry),
        })
    }

    /// Refresh an expired artifact.
    ///
    /// The granted scope list is carried over unchanged: refresh never
    /// widens access. The provider may omit a new refresh token, in which
    /// case the old one is retained.
    ///
    /// # Errors
    /// - Artifact has no refresh token
    /// - Refresh token invalid or revoked
    /// - Network errors
    pub async fn refresh(&self, artifact: &TokenArtifact) -> Result<TokenArtifact> {
        use oauth2::reqwest::async_http_client;
        use oauth2::RefreshToken;

        let refresh_token = artifact.refresh_token.clone().ok_or_else(|| {
            Error::Token(
                "Token artifact has no refresh token; delete it and generate a new one"
                    .to_string(),
            )
        })?;

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        let new_refresh_token = token_result
            .refresh_token()
            .map(|t| t.secret().clone())
            .unwrap_or(refresh_token);

        let expires_in = token_result
            .expires_in()
            .unwrap_or_else(|| std::time::Duration::from_secs(3600));
        let expiry = Utc::now()
            + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

        Ok(TokenArtifact {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: Some(new_refresh_token),
            expiry: Some(expiry),
            ..artifact.clone()
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

/// Token manager that refreshes expired artifacts on demand.
///
/// When constructed with a store, refreshed artifacts are written back so
/// the on-disk token stays usable across runs. Inline-sourced tokens have no
/// store; their refreshes live only in memory.
pub struct TokenManager {
    auth_manager: AuthManager,
    store: Option<TokenStore>,
    artifact: tokio::sync::RwLock<TokenArtifact>,
}

impl TokenManager {
    /// Create a new token manager.
    pub fn new(
        auth_manager: AuthManager,
        artifact: TokenArtifact,
        store: Option<TokenStore>,
    ) -> Self {
        Self {
            auth_manager,
            store,
            artifact: tokio::sync::RwLock::new(artifact),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// # Errors
    /// - Token refresh failed
    pub async fn access_token(&self) -> Result<String> {
        let artifact = self.artifact.read().await;

        if !artifact.is_expired() {
            return Ok(artifact.access_token.clone());
        }

        drop(artifact);

        let mut artifact = self.artifact.write().await;

        // Double-check after acquiring write lock
        if !artifact.is_expired() {
            return Ok(artifact.access_token.clone());
        }

        tracing::info!("Refreshing expired access token");

        let refreshed = self.auth_manager.refresh(&artifact).await?;

        match &self.store {
            Some(store) => store.save(&refreshed)?,
            None => {
                tracing::warn!("Refreshed token cannot be persisted (inline token source)");
            }
        }

        *artifact = refreshed;

        Ok(artifact.access_token.clone())
    }

    /// Get a copy of the current artifact.
    pub async fn artifact(&self) -> TokenArtifact {
        self.artifact.read().await.clone()
    }
}
