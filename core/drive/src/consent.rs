//! Interactive browser consent flow.
//!
//! Token generation is the one human-in-the-loop step: the user authorizes
//! the application in a browser, and the provider redirects back to a
//! loopback address with an authorization code. This module binds an
//! ephemeral localhost port, waits for exactly one redirect, verifies the
//! CSRF state, and exchanges the code for a token artifact.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use url::Url;

use clipdrive_common::{AccessScope, Error, Result};

use crate::auth::{AuthConfig, AuthManager};
use crate::token::TokenArtifact;

/// How long to wait for the user to complete authorization in the browser.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on the redirect request we are willing to read.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
<p>You can close this tab and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h3>Authorization failed.</h3>\
<p>Return to the terminal for details.</p></body></html>";

/// A consent flow waiting for its browser redirect.
pub struct ConsentFlow {
    listener: TcpListener,
    auth: AuthManager,
    auth_url: String,
    csrf_state: String,
    scope: AccessScope,
}

impl ConsentFlow {
    /// Bind the loopback listener and build the authorization URL.
    ///
    /// The redirect URL in `config` is replaced with the bound address, so
    /// the port registered with the provider's client must allow loopback
    /// redirects on any port (Google desktop clients do).
    pub async fn start(mut config: AuthConfig, scope: AccessScope) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        config.redirect_url = format!("http://127.0.0.1:{}/", port);

        let auth = AuthManager::new(config)?;
        let (auth_url, csrf_state) = auth.authorization_url(scope);

        tracing::debug!("Consent flow listening on 127.0.0.1:{}", port);

        Ok(Self {
            listener,
            auth,
            auth_url,
            csrf_state,
            scope,
        })
    }

    /// The URL the user must open in a browser.
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Wait for the redirect, then exchange the code for a token artifact.
    ///
    /// # Errors
    /// - Timeout waiting for the browser
    /// - Provider redirected with an error (e.g. the user denied access)
    /// - CSRF state mismatch
    /// - Code exchange failed
    pub async fn finish(self) -> Result<TokenArtifact> {
        let (mut stream, _) = timeout(CONSENT_TIMEOUT, self.listener.accept())
            .await
            .map_err(|_| {
                Error::Authentication(
                    "Timed out waiting for browser authorization".to_string(),
                )
            })??;

        let request_line = read_request_line(&mut stream).await?;
        let parsed = parse_redirect(&request_line);

        // Always answer the browser before surfacing the outcome.
        let page = if parsed.is_ok() {
            SUCCESS_PAGE
        } else {
            FAILURE_PAGE
        };
        respond(&mut stream, page).await?;

        let (code, state) = parsed?;

        if state != self.csrf_state {
            return Err(Error::Authentication(
                "CSRF state mismatch in OAuth redirect".to_string(),
            ));
        }

        self.auth.exchange_code(&code, self.scope).await
    }
}

/// Read the first line of the HTTP request from the redirect.
async fn read_request_line(stream: &mut TcpStream) -> Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    text.lines()
        .next()
        .map(|line| line.to_string())
        .ok_or_else(|| Error::Authentication("Empty OAuth redirect request".to_string()))
}

/// Extract `code` and `state` from the redirect request line.
fn parse_redirect(request_line: &str) -> Result<(String, String)> {
    let path = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| Error::Authentication("Malformed OAuth redirect request".to_string()))?;

    let url = Url::parse(&format!("http://127.0.0.1{}", path))
        .map_err(|e| Error::Authentication(format!("Malformed redirect URL: {}", e)))?;

    let mut code = None;
    let mut state = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(Error::Authentication(format!(
                    "Authorization refused by provider: {}",
                    value
                )));
            }
            _ => {}
        }
    }

    match (code, state) {
        (Some(code), Some(state)) => Ok((code, state)),
        _ => Err(Error::Authentication(
            "Redirect missing code or state parameter".to_string(),
        )),
    }
}

async fn respond(stream: &mut TcpStream, page: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        page.len(),
        page
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_redirect_success() {
        let (code, state) =
            parse_redirect("GET /?state=xyz&code=4%2FabcDEF HTTP/1.1").unwrap();
        assert_eq!(code, "4/abcDEF");
        assert_eq!(state, "xyz");
    }

    #[test]
    fn test_parse_redirect_provider_error() {
        let err = parse_redirect("GET /?error=access_denied&state=xyz HTTP/1.1").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_parse_redirect_missing_params() {
        assert!(parse_redirect("GET /?code=abc HTTP/1.1").is_err());
        assert!(parse_redirect("GET / HTTP/1.1").is_err());
        assert!(parse_redirect("").is_err());
    }

    #[test]
    fn test_parse_redirect_ignores_extra_params() {
        let (code, state) =
            parse_redirect("GET /?code=c&state=s&scope=https%3A%2F%2Fexample HTTP/1.1").unwrap();
        assert_eq!(code, "c");
        assert_eq!(state, "s");
    }

    #[tokio::test]
    async fn test_start_binds_loopback_redirect() {
        let config = AuthConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: "http://127.0.0.1:8080/".to_string(),
        };

        let flow = ConsentFlow::start(config, AccessScope::FullDrive)
            .await
            .unwrap();

        // The authorization URL must point back at the bound port, not the
        // placeholder from the config.
        let port = flow.listener.local_addr().unwrap().port();
        assert!(flow
            .auth_url()
            .contains(&format!("127.0.0.1%3A{}", port)));
    }
}
