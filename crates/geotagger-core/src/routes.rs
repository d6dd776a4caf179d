//! Client-side route paths shared by the guard and the OAuth callback.

pub const LOGIN: &str = "/login";
pub const SIGNUP: &str = "/signup";
pub const HOME: &str = "/";
pub const ADD_LOCATION: &str = "/addlocation";
pub const PROFILE: &str = "/profile";
pub const LOGOUT: &str = "/logout";
pub const PROFILE_SETTINGS: &str = "/profile/settings";
pub const LOCATIONS: &str = "/locations";
