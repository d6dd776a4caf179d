//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionStore`: identity, bearer credential and expiry, persisted
//!   through a `KeyValueStore` and observable through subscriptions
//! - `storage`: the durable key-value backends (file, keychain, memory)
//! - `oauth`: capture of credentials delivered by identity-provider redirects
//! - `guard`: route protection based on session validity
//! - `probe`: the backend "who am I" check
//!
//! Expiry is evaluated lazily on each check; no timer runs.

pub mod guard;
pub mod oauth;
pub mod probe;
pub mod session;
pub mod storage;

pub use guard::{Access, RouteGuard};
pub use oauth::{handle_callback, provider_login_url, CallbackOutcome, OAuthProvider};
pub use probe::verify_session;
pub use session::{SessionEvent, SessionSnapshot, SessionState, SessionStore, SubscriptionId};
pub use storage::{
    FileStore, KeyValueStore, KeyringStore, MemoryStore, SessionStorage, UnavailableStore,
};
