//! User identity and authentication payloads.

use serde::{Deserialize, Serialize};

use super::de::{opt_string_or_number, string_or_number};

/// Default authorization scheme when the server does not send one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// A Geotagger user as returned by the API and persisted with the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub points: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Points as a number, treating missing or non-numeric values as zero.
    pub fn points_value(&self) -> i64 {
        self.points
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Response to `POST /api/users/{id}/add-points`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointsAward {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub new_points: Option<String>,
}

impl PointsAward {
    pub fn points_value(&self) -> Option<i64> {
        self.new_points.as_deref().and_then(|p| p.trim().parse().ok())
    }
}

/// A complete sign-in result, ready to hand to `SessionStore::login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthData {
    pub user: User,
    pub token: String,
    pub token_type: String,
    /// ISO-8601 expiry timestamp, kept verbatim.
    pub expires_at: String,
}

/// Body of `POST /api/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Response of `POST /api/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<LoginPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginPayload {
    pub user: User,
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_at: String,
}

impl LoginResponse {
    /// Convert a successful response into session data.
    /// Returns the server message as the error when sign-in was rejected.
    pub fn into_auth_data(self) -> Result<AuthData, String> {
        match (self.success, self.data) {
            (true, Some(payload)) => Ok(payload.into()),
            (true, None) => Err("Unexpected response from server.".to_string()),
            (false, _) => Err(self.message.unwrap_or_else(|| "Login failed.".to_string())),
        }
    }
}

impl From<LoginPayload> for AuthData {
    fn from(payload: LoginPayload) -> Self {
        let token_type = payload
            .token_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());
        Self {
            user: payload.user,
            token: payload.access_token,
            token_type,
            expires_at: payload.expires_at,
        }
    }
}

/// Form fields for `POST /api/update`. Only set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Form fields for `POST /api/update-password`.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordUpdate {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_json(token_type: &str) -> String {
        format!(
            r#"{{
                "success": true,
                "message": "ok",
                "data": {{
                    "user": {{"id": 7, "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com", "points": 10}},
                    "access_token": "abc123",
                    {}
                    "expires_at": "2030-01-01T00:00:00Z"
                }}
            }}"#,
            token_type
        )
    }

    #[test]
    fn test_login_response_into_auth_data() {
        let resp: LoginResponse = serde_json::from_str(&login_json(r#""token_type": "Bearer","#)).unwrap();
        let auth = resp.into_auth_data().unwrap();
        assert_eq!(auth.user.id, "7");
        assert_eq!(auth.user.full_name(), "Ada Lovelace");
        assert_eq!(auth.user.points_value(), 10);
        assert_eq!(auth.token, "abc123");
        assert_eq!(auth.token_type, "Bearer");
        assert_eq!(auth.expires_at, "2030-01-01T00:00:00Z");
    }

    #[test]
    fn test_login_response_defaults_token_type() {
        let resp: LoginResponse = serde_json::from_str(&login_json("")).unwrap();
        assert_eq!(resp.into_auth_data().unwrap().token_type, DEFAULT_TOKEN_TYPE);

        let resp: LoginResponse = serde_json::from_str(&login_json(r#""token_type": "","#)).unwrap();
        assert_eq!(resp.into_auth_data().unwrap().token_type, DEFAULT_TOKEN_TYPE);
    }

    #[test]
    fn test_login_response_failure_message() {
        let resp: LoginResponse =
            serde_json::from_str(r#"{"success": false, "message": "Invalid credentials"}"#).unwrap();
        assert_eq!(resp.into_auth_data().unwrap_err(), "Invalid credentials");

        let resp: LoginResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert_eq!(resp.into_auth_data().unwrap_err(), "Login failed.");
    }

    #[test]
    fn test_user_serialization_skips_empty_optionals() {
        let user = User {
            id: "1".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            email: String::new(),
            role: None,
            points: None,
            avatar: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("role"));
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
        assert_eq!(back.points_value(), 0);
    }
}
