//! REST API client module for the Geotagger backend.
//!
//! This module provides the `ApiClient` for signing in and out, fetching
//! the current user, managing locations and guesses, and recording user
//! activity.
//!
//! Requests are authorized with the header produced by
//! `SessionStore::auth_header`; the client never builds one itself.

pub mod client;
pub mod error;

pub use client::{ApiClient, LoginOutcome};
pub use error::ApiError;
