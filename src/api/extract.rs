use axum::{extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;

/// Header carrying the caller's identity on client-facing routes.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Extractor for the owner of a client-facing request.
///
/// Reads [`OWNER_HEADER`]. A missing, empty, or non-ASCII value is rejected
/// with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        Ok(Owner(owner.to_string()))
    }
}
