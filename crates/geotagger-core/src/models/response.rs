//! Response wrappers used by the Geotagger API.

use serde::{Deserialize, Serialize};

/// Standard `{status, message, data, errors}` envelope.
/// `status` is required so a paginator body is never mistaken for one.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: T,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// Laravel-style paginated list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default = "first_page")]
    pub last_page: u32,
    #[serde(default)]
    pub total: Option<u64>,
}

fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// A list endpoint answering with either a paginator or a plain array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MaybePaged<T> {
    Paged(Page<T>),
    Plain(Vec<T>),
}

impl<T> From<MaybePaged<T>> for Page<T> {
    fn from(value: MaybePaged<T>) -> Self {
        match value {
            MaybePaged::Paged(page) => page,
            MaybePaged::Plain(data) => Page {
                data,
                current_page: 1,
                last_page: 1,
                total: None,
            },
        }
    }
}

/// Endpoints answer with either a bare body or the envelope; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MaybeEnveloped<T> {
    Enveloped(ApiEnvelope<T>),
    Bare(T),
}

impl<T> MaybeEnveloped<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            MaybeEnveloped::Enveloped(env) => env.data,
            MaybeEnveloped::Bare(data) => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_has_more() {
        let page: Page<u32> = serde_json::from_str(r#"{"data": [1, 2]}"#).unwrap();
        assert_eq!(page.current_page, 1);
        assert!(!page.has_more());

        let page: Page<u32> =
            serde_json::from_str(r#"{"data": [], "current_page": 2, "last_page": 5, "total": 40}"#).unwrap();
        assert!(page.has_more());
        assert_eq!(page.total, Some(40));
    }

    #[test]
    fn test_maybe_enveloped_accepts_both_shapes() {
        let env: MaybeEnveloped<Vec<u32>> =
            serde_json::from_str(r#"{"status": true, "message": "ok", "data": [1]}"#).unwrap();
        assert_eq!(env.into_inner(), vec![1]);

        let bare: MaybeEnveloped<Vec<u32>> = serde_json::from_str("[2, 3]").unwrap();
        assert_eq!(bare.into_inner(), vec![2, 3]);
    }

    #[test]
    fn test_paginator_is_not_taken_for_envelope() {
        let body = r#"{"data": [4, 5], "current_page": 1, "last_page": 3}"#;
        let parsed: MaybeEnveloped<MaybePaged<u32>> = serde_json::from_str(body).unwrap();
        let page: Page<u32> = parsed.into_inner().into();
        assert_eq!(page.data, vec![4, 5]);
        assert_eq!(page.last_page, 3);

        let parsed: MaybeEnveloped<MaybePaged<u32>> = serde_json::from_str("[6]").unwrap();
        let page: Page<u32> = parsed.into_inner().into();
        assert_eq!(page.data, vec![6]);
        assert!(!page.has_more());
    }
}
