//! API client for communicating with the Geotagger REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for users, locations, guesses and the activity log.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionStore;
use crate::models::response::{MaybeEnveloped, MaybePaged};
use crate::models::{
    ActivityEntry, Guess, Location, LoginRequest, LoginResponse, NewGuess, NewLocation, Page,
    PasswordUpdate, PointsAward, ProfileUpdate, RegisterRequest, User, UserAction,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

mod paths {
    pub const LOGIN: &str = "api/login";
    pub const SIGNUP: &str = "api/register";
    pub const SIGNOUT: &str = "api/logout";
    pub const FETCH_USER: &str = "api/auth";
    pub const USERS_PREFIX: &str = "api/users";
    pub const UPDATE_PROFILE: &str = "api/update";
    pub const UPDATE_PASSWORD: &str = "api/update-password";
    pub const LOCATIONS_PREFIX: &str = "api/locations";
    pub const GUESSES_PREFIX: &str = "api/guesses";
    pub const USER_ACTIONS: &str = "api/user-actions";
    pub const ADMIN_USER_ACTIONS: &str = "api/admin/user-actions";
}

/// Result of a sign-in attempt the server answered.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Success(crate::models::AuthData),
    /// Credentials rejected; carries the server's message.
    Rejected(String),
}

/// Laravel reads multipart/form PUTs as POST with `_method`.
#[derive(Serialize)]
struct MethodSpoof<'a, T: Serialize> {
    #[serde(flatten)]
    fields: &'a T,
    #[serde(rename = "_method")]
    method: &'static str,
}

/// API client for Geotagger.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    auth_header: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the backend at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Self::normalize_base(base_url)?,
            auth_header: None,
        })
    }

    /// A client carrying the session's current authorization header,
    /// sharing this client's connection pool.
    pub fn with_session(&self, session: &SessionStore) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            auth_header: session.auth_header(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_authorized(&self) -> bool {
        self.auth_header.is_some()
    }

    /// Parse the base URL, making sure it ends in `/` so joins keep its path.
    fn normalize_base(base_url: &str) -> Result<Url> {
        let mut raw = base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("Invalid API base URL: {}", base_url))
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid API path: {}", path))
    }

    fn headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref value) = self.auth_header {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(value).context("Invalid authorization header")?,
            );
        }
        Ok(headers)
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let request = build().headers(self.headers()?).build()?;
            let method = request.method().clone();
            let url = request.url().clone();

            let response = self
                .client
                .execute(request)
                .await
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                debug!(%method, %url, status = %response.status(), "API response");
                return Ok(response);
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited.into());
            }
            warn!(%url, retry = retries, backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let url = response.url().clone();
        let text = Self::check_response(response)
            .await?
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        let parsed: MaybeEnveloped<T> = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))?;
        Ok(parsed.into_inner())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self.send(|| self.client.get(url.clone())).await?;
        Self::decode(response).await
    }

    async fn get_page<T: DeserializeOwned>(&self, path: &str) -> Result<Page<T>> {
        let paged: MaybePaged<T> = self.get(path).await?;
        Ok(paged.into())
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        let response = self.send(|| self.client.post(url.clone()).json(body)).await?;
        Self::decode(response).await
    }

    /// Send a request whose response body is not needed.
    async fn execute(&self, build: impl Fn() -> RequestBuilder) -> Result<()> {
        let response = self.send(build).await?;
        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Authentication =====

    /// Sign in with email and password.
    /// A rejection the server explains is `Ok(LoginOutcome::Rejected)`.
    pub async fn signin(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        let url = self.url(paths::LOGIN)?;
        let response = self.send(|| self.client.post(url.clone()).json(request)).await?;

        let status = response.status();
        let body = response.text().await.context("Failed to read login response")?;

        let explained = status.is_success()
            || matches!(status.as_u16(), 400 | 401 | 422);
        if explained {
            if let Ok(parsed) = serde_json::from_str::<LoginResponse>(&body) {
                return Ok(match parsed.into_auth_data() {
                    Ok(auth) => LoginOutcome::Success(auth),
                    Err(message) => LoginOutcome::Rejected(message),
                });
            }
        }
        if status.is_success() {
            return Err(ApiError::InvalidResponse("Unexpected login response".to_string()).into());
        }
        Err(ApiError::from_status(status, &body).into())
    }

    pub async fn signup(&self, request: &RegisterRequest) -> Result<User> {
        self.post(paths::SIGNUP, request).await
    }

    /// Invalidate the token server-side.
    pub async fn signout(&self) -> Result<()> {
        let url = self.url(paths::SIGNOUT)?;
        self.execute(|| self.client.post(url.clone())).await
    }

    // ===== Users =====

    /// The user the current credential belongs to.
    pub async fn current_user(&self) -> Result<User> {
        self.get(paths::FETCH_USER).await
    }

    pub async fn get_user(&self, id: &str) -> Result<User> {
        self.get(&format!("{}/{}", paths::USERS_PREFIX, id)).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("{}/{}", paths::USERS_PREFIX, id))?;
        self.execute(|| self.client.delete(url.clone())).await
    }

    /// Award points for an upload or edit. Returns the user's new total.
    pub async fn add_points(&self, id: &str) -> Result<PointsAward> {
        self.post(&format!("{}/{}/add-points", paths::USERS_PREFIX, id), &serde_json::json!({}))
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        self.post_form_put(paths::UPDATE_PROFILE, update).await
    }

    pub async fn update_password(&self, update: &PasswordUpdate) -> Result<()> {
        self.post_form_put(paths::UPDATE_PASSWORD, update).await
    }

    async fn post_form_put<T: Serialize>(&self, path: &str, fields: &T) -> Result<()> {
        let url = self.url(path)?;
        let form = MethodSpoof {
            fields,
            method: "PUT",
        };
        self.execute(|| self.client.post(url.clone()).form(&form)).await
    }

    // ===== Locations =====

    pub async fn locations(&self, page: u32) -> Result<Page<Location>> {
        self.get_page(&format!("{}?page={}", paths::LOCATIONS_PREFIX, page))
            .await
    }

    /// Locations uploaded by the signed-in user.
    pub async fn my_locations(&self, page: u32) -> Result<Page<Location>> {
        self.get_page(&format!("{}/me?page={}", paths::LOCATIONS_PREFIX, page))
            .await
    }

    pub async fn location(&self, id: &str) -> Result<Location> {
        self.get(&format!("{}/{}", paths::LOCATIONS_PREFIX, id)).await
    }

    pub async fn random_location(&self) -> Result<Location> {
        self.get(&format!("{}/random", paths::LOCATIONS_PREFIX)).await
    }

    pub async fn create_location(&self, location: &NewLocation) -> Result<()> {
        let url = self.url(paths::LOCATIONS_PREFIX)?;
        self.execute(|| self.client.post(url.clone()).json(location)).await
    }

    pub async fn update_location(&self, id: &str, location: &NewLocation) -> Result<()> {
        let url = self.url(&format!("{}/{}", paths::LOCATIONS_PREFIX, id))?;
        self.execute(|| self.client.patch(url.clone()).json(location)).await
    }

    pub async fn delete_location(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("{}/{}", paths::LOCATIONS_PREFIX, id))?;
        self.execute(|| self.client.delete(url.clone())).await
    }

    // ===== Guesses =====

    /// Submit a guess. Returns the scored guess when the server echoes it.
    pub async fn create_guess(&self, location_id: &str, guess: &NewGuess) -> Result<Option<Guess>> {
        let url = self.url(&format!("{}/guess/{}", paths::LOCATIONS_PREFIX, location_id))?;
        let response = self.send(|| self.client.post(url.clone()).json(guess)).await?;
        let text = Self::check_response(response).await?.text().await?;

        match serde_json::from_str::<MaybeEnveloped<Guess>>(&text) {
            Ok(parsed) => Ok(Some(parsed.into_inner())),
            Err(e) => {
                debug!(error = %e, "Guess response carried no guess");
                Ok(None)
            }
        }
    }

    /// Leaderboard: the closest guesses, best first.
    pub async fn best_guesses(&self, limit: u32) -> Result<Vec<Guess>> {
        self.get(&format!("{}/best?limit={}", paths::GUESSES_PREFIX, limit))
            .await
    }

    // ===== Activity log =====

    pub async fn log_user_action(&self, action: &UserAction) -> Result<()> {
        let url = self.url(paths::USER_ACTIONS)?;
        self.execute(|| self.client.post(url.clone()).json(action)).await
    }

    /// Most recent actions across all users. Requires an admin account.
    pub async fn recent_user_actions(&self) -> Result<Vec<ActivityEntry>> {
        self.get(paths::ADMIN_USER_ACTIONS).await
    }
}
