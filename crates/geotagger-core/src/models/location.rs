//! Geotagged photo locations.

use serde::{Deserialize, Serialize};

use super::de::{opt_string_or_number, string_or_number};

/// Public profile of the user who uploaded a location or made a guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LocationOwner {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl LocationOwner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Location {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Image URL or storage path of the uploaded photo.
    pub image: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub user: Option<LocationOwner>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
}

impl Location {
    /// Id of the uploader, from the embedded user or the bare foreign key.
    pub fn owner_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.id.as_str())
            .or(self.user_id.as_deref())
    }
}

/// Body of `POST /api/locations` and `PATCH /api/locations/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct NewLocation {
    pub image: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_with_owner() {
        let json = r#"{"id": 3, "image": "locations/3.jpg", "latitude": 46.05, "longitude": 14.5,
            "user": {"id": 9, "first_name": "Jan", "last_name": "Novak", "avatar": null}}"#;
        let loc: Location = serde_json::from_str(json).unwrap();
        assert_eq!(loc.id, "3");
        assert_eq!(loc.owner_id(), Some("9"));
        assert_eq!(loc.user.unwrap().full_name(), "Jan Novak");
    }

    #[test]
    fn test_owner_id_falls_back_to_foreign_key() {
        let json = r#"{"id": "5", "image": "x.png", "latitude": 0.0, "longitude": 0.0, "user_id": 12}"#;
        let loc: Location = serde_json::from_str(json).unwrap();
        assert_eq!(loc.owner_id(), Some("12"));
    }
}
