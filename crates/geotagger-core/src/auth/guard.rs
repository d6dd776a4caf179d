//! Access control for protected routes.
//!
//! The guard is evaluated on demand, and `watch` re-evaluates it from
//! session notifications. There is no polling.

use reqwest::Url;

use super::{SessionStore, SubscriptionId};
use crate::routes;

/// Base for building the login redirect; only path and query are kept.
const REDIRECT_BASE: &str = "http://localhost/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allowed,
    /// Send the user here instead.
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(routes::LOGIN)
    }
}

impl RouteGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    /// Allow `path` only for an authenticated, unexpired session.
    pub fn check(&self, session: &SessionStore, path: &str) -> Access {
        if session.is_authenticated() {
            Access::Allowed
        } else {
            Access::Redirect(self.login_redirect(path))
        }
    }

    /// `<login>?redirect=<path>` with the path percent-encoded.
    pub fn login_redirect(&self, path: &str) -> String {
        let url = Url::parse(REDIRECT_BASE).and_then(|base| base.join(&self.login_path));
        match url {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("redirect", path);
                format!("{}?{}", url.path(), url.query().unwrap_or_default())
            }
            Err(_) => self.login_path.clone(),
        }
    }

    /// Re-check `path` after every session change and report the result.
    pub fn watch(
        &self,
        session: &mut SessionStore,
        path: impl Into<String>,
        mut on_change: impl FnMut(Access) + Send + 'static,
    ) -> SubscriptionId {
        let guard = self.clone();
        let path = path.into();
        session.subscribe(move |_, session| on_change(guard.check(session, &path)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, Utc};

    use super::*;
    use crate::auth::MemoryStore;
    use crate::models::{AuthData, User};

    fn auth_data(expires_in: Duration) -> AuthData {
        AuthData {
            user: User {
                id: "1".to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                email: String::new(),
                role: None,
                points: None,
                avatar: None,
            },
            token: "tok".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: (Utc::now() + expires_in).to_rfc3339(),
        }
    }

    #[test]
    fn test_login_redirect_encodes_path() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.login_redirect("/profile/settings"),
            "/login?redirect=%2Fprofile%2Fsettings"
        );
    }

    #[test]
    fn test_check_requires_unexpired_session() {
        let guard = RouteGuard::default();
        let mut session = SessionStore::open(MemoryStore::new());
        assert_eq!(
            guard.check(&session, routes::PROFILE),
            Access::Redirect("/login?redirect=%2Fprofile".to_string())
        );

        session.set_token("partial");
        assert!(matches!(guard.check(&session, routes::PROFILE), Access::Redirect(_)));

        session.login(auth_data(Duration::hours(1)));
        assert_eq!(guard.check(&session, routes::PROFILE), Access::Allowed);

        session.login(auth_data(-Duration::hours(1)));
        assert!(matches!(guard.check(&session, routes::PROFILE), Access::Redirect(_)));
    }

    #[test]
    fn test_watch_reports_on_every_change() {
        let guard = RouteGuard::default();
        let mut session = SessionStore::open(MemoryStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        guard.watch(&mut session, routes::ADD_LOCATION, move |access| {
            log.lock().unwrap().push(access == Access::Allowed);
        });

        session.login(auth_data(Duration::hours(1)));
        session.signout();

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }
}
