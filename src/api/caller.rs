//! Caller identity from request headers.
//!
//! Authentication happens upstream; this layer only trusts the tenant and
//! user headers it is given.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct Caller {
    pub tenant_id: Uuid,
    pub user: Option<String>,
}

impl Caller {
    pub fn actor(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::bad_request(format!("Missing {TENANT_HEADER} header")))?;
        let tenant_id = Uuid::parse_str(tenant.trim())
            .map_err(|_| ApiError::bad_request(format!("Invalid {TENANT_HEADER} header")))?;
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        Ok(Self { tenant_id, user })
    }
}

/// Parse a path id, answering 400 on garbage.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid {what} ID")))
}
