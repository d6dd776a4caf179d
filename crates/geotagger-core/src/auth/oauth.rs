//! Identity-provider redirect handling.
//!
//! The backend finishes the provider dance and redirects back with the
//! bearer credential in the `access_token` query parameter. The token is
//! trusted as delivered; nothing is exchanged or verified here.

use std::fmt;

use anyhow::{Context, Result};
use reqwest::Url;
use tracing::{debug, warn};

use super::SessionStore;
use crate::routes;

/// Query parameter carrying the credential.
const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Base used to resolve callback paths that arrive without scheme and host.
const RELATIVE_BASE: &str = "http://localhost/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn slug(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            other => Err(anyhow::anyhow!("Unknown OAuth provider: {}", other)),
        }
    }
}

/// Where the user should be sent after the callback was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A credential was captured into the session.
    TokenAccepted,
    /// The callback carried no usable credential.
    MissingToken,
}

impl CallbackOutcome {
    pub fn redirect(&self) -> &'static str {
        match self {
            CallbackOutcome::TokenAccepted => routes::PROFILE,
            CallbackOutcome::MissingToken => routes::LOGIN,
        }
    }
}

/// URL that starts sign-in with `provider` on the backend.
pub fn provider_login_url(api_base: &Url, provider: OAuthProvider) -> Result<Url> {
    api_base
        .join(&format!("auth/{}", provider.slug()))
        .context("Failed to build provider login URL")
}

/// Pull the credential out of a callback URL, absolute or relative.
pub fn extract_token(callback: &str) -> Option<String> {
    let url = Url::parse(callback)
        .or_else(|_| Url::parse(RELATIVE_BASE).and_then(|base| base.join(callback)))
        .ok()?;
    url.query_pairs()
        .find(|(key, _)| key == ACCESS_TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// Capture the credential from `callback` into `session`.
pub fn handle_callback(callback: &str, session: &mut SessionStore) -> CallbackOutcome {
    match extract_token(callback) {
        Some(token) => {
            debug!("OAuth callback carried a token");
            session.set_token(token);
            CallbackOutcome::TokenAccepted
        }
        None => {
            warn!("OAuth callback without access token");
            CallbackOutcome::MissingToken
        }
    }
}
