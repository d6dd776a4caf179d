//! Location guesses and leaderboard entries.

use serde::{Deserialize, Serialize};

use super::de::{opt_string_or_number, string_or_number};
use super::location::LocationOwner;

/// The location a guess was made against, as embedded in guess responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct GuessLocation {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub image: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Guess {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Distance between the guess and the real location, in meters.
    #[serde(default)]
    pub error_distance: Option<f64>,
    #[serde(default)]
    pub user: Option<LocationOwner>,
    #[serde(default)]
    pub location: Option<GuessLocation>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub location_id: Option<String>,
}

impl Guess {
    /// Human readable error distance, e.g. "850 m" or "12.4 km".
    pub fn distance_display(&self) -> String {
        match self.error_distance {
            None => "-".to_string(),
            Some(d) if d < 1000.0 => format!("{:.0} m", d),
            Some(d) => format!("{:.1} km", d / 1000.0),
        }
    }
}

/// Body of `POST /api/locations/guess/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct NewGuess {
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: String,
    pub location_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_best_guess() {
        let json = r#"{"id": 1, "latitude": 46.0, "longitude": 14.0, "error_distance": 1534.2,
            "user": {"id": 2, "first_name": "A", "last_name": "B", "avatar": "a.png"},
            "location": {"id": 3, "image": "l.jpg", "latitude": 46.01, "longitude": 14.02}}"#;
        let guess: Guess = serde_json::from_str(json).unwrap();
        assert_eq!(guess.location.as_ref().map(|l| l.id.as_str()), Some("3"));
        assert_eq!(guess.distance_display(), "1.5 km");
    }

    #[test]
    fn test_distance_display() {
        let mut guess: Guess =
            serde_json::from_str(r#"{"id": "g", "latitude": 0.0, "longitude": 0.0}"#).unwrap();
        assert_eq!(guess.distance_display(), "-");
        guess.error_distance = Some(850.4);
        assert_eq!(guess.distance_display(), "850 m");
    }
}
