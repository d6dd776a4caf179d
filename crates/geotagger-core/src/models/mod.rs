//! Data models for Geotagger entities.
//!
//! This module contains the data structures exchanged with the Geotagger
//! API:
//!
//! - `User`, `AuthData`, `LoginResponse`: identity and sign-in payloads
//! - `Location`, `NewLocation`: geotagged photos
//! - `Guess`, `NewGuess`: guesses and the leaderboard
//! - `UserAction`, `ActivityEntry`: activity log records
//! - `ApiEnvelope`, `Page`: response wrappers

pub mod activity;
pub mod guess;
pub mod location;
pub mod response;
pub mod user;

mod de;

pub use activity::{ActivityEntry, UserAction};
pub use guess::{Guess, GuessLocation, NewGuess};
pub use location::{Location, LocationOwner, NewLocation};
pub use response::{ApiEnvelope, Page};
pub use user::{
    AuthData, LoginPayload, LoginRequest, LoginResponse, PasswordUpdate, PointsAward,
    ProfileUpdate, RegisterRequest, User, DEFAULT_TOKEN_TYPE,
};
