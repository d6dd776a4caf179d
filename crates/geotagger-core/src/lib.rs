//! Geotagger client core.
//!
//! Session state, its durable storage, and a typed client for the
//! Geotagger HTTP API. The session store is an explicit value: open it once
//! at startup with [`auth::SessionStore::open`] and pass it to whatever
//! needs it.

pub mod activity;
pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod routes;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, LoginOutcome};
pub use auth::{SessionState, SessionStore};
pub use config::{Config, StorageKind};
