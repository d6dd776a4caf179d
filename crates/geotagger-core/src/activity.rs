//! Best-effort user activity logging.

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::models::UserAction;

/// Record `action` on the backend. Failures are logged and swallowed so
/// activity logging never interrupts the action being logged.
pub async fn log_user_action(client: &ApiClient, action: UserAction) {
    if !client.is_authorized() {
        debug!(action = %action.action, "Skipping activity log without a session");
        return;
    }
    if let Err(e) = client.log_user_action(&action).await {
        warn!(action = %action.action, error = %e, "Failed to log user action");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStore, SessionStore};
    use crate::test_support::serve;

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let (base, server) = serve(vec![(500, "down")]).await;
        let mut session = SessionStore::open(MemoryStore::new());
        session.set_token("tok");
        let client = ApiClient::new(&base).unwrap().with_session(&session);

        log_user_action(&client, UserAction::new("guess").value("46.0,14.0")).await;

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/user-actions "));
        assert!(requests[0].contains(r#""new_value":"46.0,14.0""#));
    }

    #[tokio::test]
    async fn test_skipped_without_session() {
        let session = SessionStore::open(MemoryStore::new());
        let client = ApiClient::new("http://127.0.0.1:9/").unwrap().with_session(&session);
        assert!(!client.is_authorized());
        log_user_action(&client, UserAction::new("click")).await;
    }
}
