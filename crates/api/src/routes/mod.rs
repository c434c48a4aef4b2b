//! HTTP handlers, one module per resource.

pub mod accounts;
pub mod admin;
pub mod deliveries;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;

use axum::http::HeaderMap;
use common::CustomerId;

use crate::error::ApiError;

/// Header carrying the authenticated customer, set by the auth proxy.
pub const USER_HEADER: &str = "x-user-id";

/// Reads the requesting customer from the [`USER_HEADER`].
pub fn owner_from_headers(headers: &HeaderMap) -> Result<CustomerId, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(CustomerId::new)
        .ok_or(ApiError::Unauthorized)
}
