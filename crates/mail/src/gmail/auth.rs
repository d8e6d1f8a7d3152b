//! Gmail OAuth2 authentication
//!
//! Serving a request only ever reads or refreshes a stored credential;
//! the interactive authorization-code flow lives behind
//! [`GmailAuth::provision`] and is run by an operator ahead of time,
//! never from a request handler.

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use super::token_store::{StoredToken, TokenStore};

/// Error for requests against an address that has never been
/// provisioned (or whose stored credential has no refresh capability).
#[derive(Debug, thiserror::Error)]
#[error("no stored credential for {address}; run `vigia provision {address}` first")]
pub struct NotProvisionedError {
    pub address: String,
}

/// OAuth2 configuration and per-address token management for the Gmail API
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    tokens: TokenStore,
}

/// Token response from Google's token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Read-only scope; this service never mutates the mailbox
    const GMAIL_READONLY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.readonly";

    /// Port range to try for the local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Create a new auth instance storing tokens in the config directory
    ///
    /// # Arguments
    /// * `client_id` - OAuth2 client ID from Google Cloud Console
    /// * `client_secret` - OAuth2 client secret from Google Cloud Console
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let tokens = TokenStore::open_default()?;
        Ok(Self::with_token_store(client_id, client_secret, tokens))
    }

    /// Create an auth instance with an explicit token store
    pub fn with_token_store(client_id: String, client_secret: String, tokens: TokenStore) -> Self {
        Self {
            client_id,
            client_secret,
            tokens,
        }
    }

    /// Get a valid access token for `address`, refreshing as needed.
    ///
    /// This is the serving path: if no stored credential exists, or the
    /// stored one is expired with no refresh token, it fails with
    /// [`NotProvisionedError`] instead of opening a consent flow.
    pub fn access_token_for(&self, address: &str) -> Result<String> {
        if let Some(token) = self.tokens.load(address) {
            if token.is_valid_now() {
                return Ok(token.access_token);
            }

            if let Some(refresh_token) = token.refresh_token {
                let refreshed = self.refresh_access_token(&refresh_token)?;
                self.store_token(address, &refreshed)?;
                info!("Refreshed access token for {}", address);
                return Ok(refreshed.access_token);
            }
        }

        Err(NotProvisionedError {
            address: address.to_string(),
        }
        .into())
    }

    /// Run the interactive authorization-code flow for `address` and
    /// persist the resulting credential.
    ///
    /// Operator-run: opens a browser for consent and waits for the
    /// OAuth callback on a local port.
    pub fn provision(&self, address: &str) -> Result<()> {
        // Step 1: Start local server to receive the callback
        let (listener, port) = Self::start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        // Step 2: Build authorization URL
        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::GMAIL_READONLY_SCOPE),
        );

        println!("\n=== Gmail Authorization for {} ===", address);
        println!("Opening browser for authorization...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            eprintln!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        // Step 3: Wait for callback with the authorization code
        println!("Waiting for authorization...");
        let code = Self::wait_for_callback(listener)?;

        // Step 4: Exchange code for tokens
        println!("Exchanging authorization code for tokens...");
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        self.store_token(address, &token)?;
        println!("Authorization complete for {}\n", address);
        Ok(())
    }

    /// Start a local TCP server on an available port
    fn start_local_server() -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for the OAuth callback and extract the authorization code
    fn wait_for_callback(listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        // Format: GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let code = query_param(&request_line, "code");
        let error = query_param(&request_line, "error");

        // Send response to the browser
        let (status, body) = if code.is_some() {
            ("200 OK", "Authorization complete. You can close this window.")
        } else {
            ("400 Bad Request", "Authorization failed. Please try again.")
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            anyhow::bail!("OAuth error: {}", err);
        }

        code.context("No authorization code received")
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Preserve the refresh token if not returned
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    /// Persist a token response for `address`
    fn store_token(&self, address: &str, token: &TokenResponse) -> Result<()> {
        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };
        self.tokens.save(address, &stored)
    }
}

/// Extract a query parameter from an HTTP request line
fn query_param(request_line: &str, name: &str) -> Option<String> {
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split('?').nth(1)?;
    query.split('&').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
