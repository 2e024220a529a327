//! Response envelopes used by the backend.
//!
//! The backend is not consistent about wrapping: some endpoints return the
//! object itself, others wrap it in `data`, and list endpoints add a
//! `pagination` block. These types accept every shape seen in practice.

use serde::Deserialize;

use gemvault_core::{Gem, User};

/// A value that may arrive bare or wrapped in `{ "data": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Payload<T> {
    /// Unwrap the value.
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// A single gem, bare or wrapped in `data` or `gem`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GemPayload {
    Data { data: Gem },
    Named { gem: Gem },
    Bare(Gem),
}

impl GemPayload {
    pub fn into_gem(self) -> Gem {
        match self {
            Self::Data { data: gem } | Self::Named { gem } | Self::Bare(gem) => gem,
        }
    }
}

/// A user, bare or wrapped in `user` or `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UserPayload {
    Named { user: User },
    Data { data: User },
    Bare(User),
}

impl UserPayload {
    pub fn into_user(self) -> User {
        match self {
            Self::Named { user } | Self::Data { data: user } | Self::Bare(user) => user,
        }
    }
}

/// Pagination block of a list response.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    #[serde(alias = "totalCount", alias = "totalItems")]
    pub total: u64,
    #[serde(alias = "currentPage")]
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub total_pages: Option<u32>,
}

/// Gem list response: `{ "data": [...], "pagination": {...} }`.
#[derive(Debug, Deserialize)]
pub struct GemList {
    #[serde(alias = "gems", default)]
    pub data: Vec<Gem>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    /// Some deployments report the count at the top level.
    #[serde(default, alias = "totalCount")]
    pub total: Option<u64>,
}

impl GemList {
    /// Total number of matching gems, falling back to the rows returned.
    pub fn total_count(&self) -> u64 {
        self.pagination
            .map(|p| p.total)
            .filter(|total| *total > 0)
            .or(self.total)
            .unwrap_or(self.data.len() as u64)
    }
}

/// Successful login: the user plus an access token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    #[serde(alias = "token")]
    pub access_token: String,
}

/// Message-only acknowledgement (`register`, `logout`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Ack {
    pub message: Option<String>,
}

/// Asset upload acknowledgement.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UploadResponse {
    pub message: Option<String>,
    #[serde(alias = "fileUrls")]
    pub urls: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gem_list_reads_pagination_total() {
        let list: GemList = serde_json::from_str(
            r#"{"data":[],"pagination":{"total":130,"page":2,"limit":25,"totalPages":6}}"#,
        )
        .unwrap();
        assert_eq!(list.total_count(), 130);
    }

    #[test]
    fn test_gem_list_without_pagination_counts_rows() {
        let list: GemList = serde_json::from_str(
            r#"{"gems":[{"_id":"g1","stockId":"S1","stoneType":"Ruby","color":"Red","shape":"Oval","carat":1.0}]}"#,
        )
        .unwrap();
        assert_eq!(list.total_count(), 1);
    }

    #[test]
    fn test_login_accepts_token_alias() {
        let login: LoginResponse = serde_json::from_str(
            r#"{"user":{"_id":"u1","email":"a@b.co","role":"ADMIN","status":"ACTIVE"},"token":"t0k"}"#,
        )
        .unwrap();
        assert_eq!(login.access_token, "t0k");
        assert!(login.user.is_admin());
    }

    #[test]
    fn test_user_payload_shapes() {
        let wrapped: UserPayload =
            serde_json::from_str(r#"{"user":{"_id":"u1","email":"a@b.co"}}"#).unwrap();
        let bare: UserPayload = serde_json::from_str(r#"{"_id":"u1","email":"a@b.co"}"#).unwrap();
        assert_eq!(wrapped.into_user(), bare.into_user());
    }
}
