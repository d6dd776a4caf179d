//! User activity log records.

use serde::{Deserialize, Serialize};

use super::de::opt_string_or_number;

/// An action to record via `POST /api/user-actions`.
#[derive(Debug, Clone, Serialize)]
pub struct UserAction {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl UserAction {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            component_type: None,
            new_value: None,
            url: None,
        }
    }

    pub fn component(mut self, component_type: impl Into<String>) -> Self {
        self.component_type = Some(component_type.into());
        self
    }

    pub fn value(mut self, new_value: impl Into<String>) -> Self {
        self.new_value = Some(new_value.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A recorded action as listed by `GET /api/admin/user-actions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ActivityEntry {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub component_type: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}
