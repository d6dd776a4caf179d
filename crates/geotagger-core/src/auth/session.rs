use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::storage::{parse_expiry, KeyValueStore, SessionStorage};
use crate::models::{AuthData, User, DEFAULT_TOKEN_TYPE};

/// Where a session sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credential.
    Empty,
    /// A credential without an expiry, e.g. straight after an OAuth redirect.
    PartialCredential,
    Authenticated,
    /// Credential and expiry present, but the expiry has passed or is unreadable.
    Expired,
}

/// Emitted to subscribers after a mutation has been applied and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    TokenSet,
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(SessionEvent, &SessionStore) + Send>;

/// Plain copy of the session fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub token: Option<String>,
    pub token_type: Option<String>,
    pub expires_at: Option<String>,
}

/// Single authority on who is signed in and with which credential.
///
/// State is restored from storage once, in [`SessionStore::open`], and
/// every mutation writes through before listeners run. Expiry is checked
/// lazily by [`SessionStore::is_authenticated`]; nothing fires on its own
/// when a token expires.
pub struct SessionStore {
    storage: SessionStorage,
    user: Option<User>,
    token: Option<String>,
    token_type: Option<String>,
    expires_at: Option<String>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("user", &self.user.as_ref().map(|u| &u.id))
            .field("has_token", &self.token.is_some())
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SessionStore {
    /// Open a session over `backend`, restoring whatever it holds.
    /// Expired sessions are restored as-is.
    pub fn open(backend: impl KeyValueStore + 'static) -> Self {
        Self::from_storage(SessionStorage::new(backend))
    }

    pub fn from_storage(storage: SessionStorage) -> Self {
        let store = Self {
            user: storage.get_user(),
            token: storage.get_token(),
            token_type: storage.get_token_type(),
            expires_at: storage.get_token_expiry(),
            storage,
            listeners: Vec::new(),
            next_subscription: 0,
        };
        debug!(
            state = ?store.state(),
            persistent = store.storage.is_available(),
            "Session restored"
        );
        store
    }

    // ===== Mutations =====

    /// Replace the whole session and persist each field.
    pub fn login(&mut self, auth: AuthData) {
        let token_type = if auth.token_type.trim().is_empty() {
            DEFAULT_TOKEN_TYPE.to_string()
        } else {
            auth.token_type
        };

        self.storage.set_user(&auth.user);
        self.storage.set_token(&auth.token);
        self.storage.set_token_type(&token_type);
        self.storage.set_token_expiry(&auth.expires_at);

        info!(user_id = %auth.user.id, expires_at = %auth.expires_at, "Signed in");
        self.user = Some(auth.user);
        self.token = Some(auth.token);
        self.token_type = Some(token_type);
        self.expires_at = Some(auth.expires_at);

        self.notify(SessionEvent::LoggedIn);
    }

    /// Set only the credential. User and expiry are left untouched, so
    /// on an empty session this yields `PartialCredential`.
    pub fn set_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.storage.set_token(&token);
        self.token = Some(token);
        debug!(state = ?self.state(), "Token set");

        self.notify(SessionEvent::TokenSet);
    }

    /// Clear the session and its stored keys. Signing out an empty
    /// session is a no-op and notifies no one.
    pub fn signout(&mut self) {
        let was_signed_in = self.token.is_some()
            || self.user.is_some()
            || self.token_type.is_some()
            || self.expires_at.is_some();
        self.user = None;
        self.token = None;
        self.token_type = None;
        self.expires_at = None;
        self.storage.clear_all();

        if was_signed_in {
            info!("Signed out");
            self.notify(SessionEvent::SignedOut);
        }
    }

    // ===== Queries =====

    /// True iff a credential and an expiry are present and now is strictly
    /// before the expiry. An unparseable expiry counts as not authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_none() {
            return false;
        }
        self.expiry()
            .map(|expiry| now < expiry)
            .unwrap_or(false)
    }

    /// `"{scheme} {credential}"` whenever a credential is present.
    /// Expiry is not consulted; check `is_authenticated` first when it matters.
    pub fn auth_header(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|token| format!("{} {}", self.credential_scheme(), token))
    }

    pub fn state(&self) -> SessionState {
        self.state_at(Utc::now())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        match (&self.token, &self.expires_at) {
            (None, _) => SessionState::Empty,
            (Some(_), None) => SessionState::PartialCredential,
            (Some(_), Some(_)) if self.is_authenticated_at(now) => SessionState::Authenticated,
            (Some(_), Some(_)) => SessionState::Expired,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn credential(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The stored scheme, or `"Bearer"` when none is set.
    pub fn credential_scheme(&self) -> &str {
        self.token_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TOKEN_TYPE)
    }

    pub fn expires_at(&self) -> Option<&str> {
        self.expires_at.as_deref()
    }

    /// Parsed expiry, `None` when absent or malformed.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at.as_deref().and_then(parse_expiry)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user.clone(),
            token: self.token.clone(),
            token_type: self.token_type.clone(),
            expires_at: self.expires_at.clone(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.storage.is_available()
    }

    // ===== Observers =====

    /// Register a listener called after every `login`, `set_token` and every
    /// `signout` that clears a session.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(SessionEvent, &SessionStore) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, event: SessionEvent) {
        // Listeners get a shared view of the store, so detach them while they run.
        let mut listeners = std::mem::take(&mut self.listeners);
        for (_, listener) in listeners.iter_mut() {
            listener(event, &*self);
        }
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }
}
