//! "Who am I" check against the backend.

use anyhow::Result;
use tracing::info;

use super::SessionStore;
use crate::api::{ApiClient, ApiError};
use crate::models::User;

/// Ask the backend who the session belongs to.
///
/// Returns the user on success. An unauthorized answer clears the session
/// and returns `Ok(None)`; any other failure is passed through untouched.
pub async fn verify_session(client: &ApiClient, session: &mut SessionStore) -> Result<Option<User>> {
    let authed = client.with_session(session);
    match authed.current_user().await {
        Ok(user) => Ok(Some(user)),
        Err(e) if ApiError::is_unauthorized(&e) => {
            info!("Backend rejected the session credential, signing out");
            session.signout();
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::auth::{MemoryStore, SessionState};
    use crate::models::AuthData;
    use crate::test_support::serve;

    const USER_JSON: &str = r#"{"id": 1, "first_name": "A", "last_name": "B", "email": "a@b.c"}"#;

    fn signed_in(backend: MemoryStore) -> SessionStore {
        let mut session = SessionStore::open(backend);
        session.login(AuthData {
            user: serde_json::from_str(USER_JSON).unwrap(),
            token: "xyz".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: (Utc::now() + Duration::hours(1)).to_rfc3339(),
        });
        session
    }

    #[tokio::test]
    async fn test_verify_session_returns_user_and_sends_header() {
        let (base, server) = serve(vec![(200, USER_JSON)]).await;
        let client = ApiClient::new(&base).unwrap();
        let mut session = signed_in(MemoryStore::new());

        let user = verify_session(&client, &mut session).await.unwrap();
        assert_eq!(user.map(|u| u.id), Some("1".to_string()));
        assert_eq!(session.state(), SessionState::Authenticated);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/auth "));
        assert!(requests[0].to_lowercase().contains("authorization: bearer xyz"));
    }

    #[tokio::test]
    async fn test_verify_session_unauthorized_signs_out() {
        let (base, server) = serve(vec![(401, r#"{"message": "Unauthenticated."}"#)]).await;
        let client = ApiClient::new(&base).unwrap();
        let backend = MemoryStore::new();
        let mut session = signed_in(backend.clone());

        let user = verify_session(&client, &mut session).await.unwrap();
        assert!(user.is_none());
        assert_eq!(session.state(), SessionState::Empty);
        assert!(backend.is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_session_keeps_session_on_server_error() {
        let (base, server) = serve(vec![(500, "boom")]).await;
        let client = ApiClient::new(&base).unwrap();
        let mut session = signed_in(MemoryStore::new());

        let err = verify_session(&client, &mut session).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::ServerError(_))));
        assert_eq!(session.state(), SessionState::Authenticated);
        server.await.unwrap();
    }
}
