//! OAuth 2.0 authentication for the Drive API
//!
//! Token acquisition, caching in `token.json` and refresh are handled by
//! `yup-oauth2`'s installed-app flow with a loopback redirect. The resulting
//! [`Authenticator`] is the thin handle the Drive service asks for bearer
//! tokens, so one instance can serve a whole run.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use log::{debug, info};
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::core::error::{Error, Result};

/// Read-only access to file content and metadata
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Where credentials live on disk and which scope to request
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Client secrets downloaded from the cloud console
    pub credentials_path: PathBuf,
    /// Token cache, written after the first consent and on every refresh
    pub token_path: PathBuf,
    pub scope: String,
    /// Pre-issued bearer token; skips the OAuth flow entirely
    pub access_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            scope: DRIVE_READONLY_SCOPE.to_string(),
            access_token: None,
        }
    }
}

enum TokenSource {
    Installed(DefaultAuthenticator),
    Fixed(String),
}

/// Authenticated handle that supplies bearer tokens for API requests
pub struct Authenticator {
    source: TokenSource,
    scopes: Vec<String>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source {
            TokenSource::Installed(_) => "installed",
            TokenSource::Fixed(_) => "fixed",
        };
        f.debug_struct("Authenticator")
            .field("source", &kind)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl Authenticator {
    /// Use a bearer token obtained elsewhere; it is never refreshed
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Fixed(token.into()),
            scopes: Vec::new(),
        }
    }

    /// Current access token, refreshed by the OAuth library when it expires
    pub async fn access_token(&self) -> Result<String> {
        match &self.source {
            TokenSource::Fixed(token) => Ok(token.clone()),
            TokenSource::Installed(auth) => {
                let token = auth
                    .token(self.scopes.as_slice())
                    .await
                    .map_err(|e| Error::Authentication(e.to_string()))?;
                token
                    .token()
                    .map(str::to_string)
                    .ok_or_else(|| Error::Authentication("token endpoint returned no access token".to_string()))
            }
        }
    }
}

/// Authenticate using the token cache, falling back to interactive consent.
///
/// Fails with [`Error::Authentication`] when the client secrets cannot be
/// read or the consent flow does not complete.
pub async fn authenticate(config: &AuthConfig) -> Result<Authenticator> {
    if let Some(token) = &config.access_token {
        info!("Using pre-issued access token");
        return Ok(Authenticator::with_access_token(token.clone()));
    }

    let secret = yup_oauth2::read_application_secret(&config.credentials_path)
        .await
        .map_err(|e| {
            Error::Authentication(format!(
                "cannot read client secrets {}: {e}",
                config.credentials_path.display()
            ))
        })?;

    let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
        .persist_tokens_to_disk(config.token_path.clone())
        .flow_delegate(Box::new(ConsoleFlowDelegate))
        .build()
        .await
        .map_err(|e| Error::Authentication(format!("cannot start OAuth flow: {e}")))?;

    let authenticator = Authenticator {
        source: TokenSource::Installed(auth),
        scopes: vec![config.scope.clone()],
    };

    // Obtain a token now so a missing consent fails the run before any download
    authenticator.access_token().await?;
    debug!("Token cache at {}", config.token_path.display());
    Ok(authenticator)
}

/// Prints the consent URL on stderr alongside the other console messages
struct ConsoleFlowDelegate;

impl InstalledFlowDelegate for ConsoleFlowDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            eprintln!("🔑 Authorize drive-dl by opening this URL in your browser:\n\n{url}\n");
            Ok(String::new())
        })
    }
}
