// rest/auth.rs — verified-identity extraction.
//
// Token issuance and verification live in the external Authentication
// service; by the time a request reaches this daemon the gateway has
// resolved the caller and forwards the verified identity in headers.
// A request without an identity cannot pass any membership check, so it
// is rejected up front.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::DomainError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// The verified caller identity, taken from gateway headers.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub display_name: Option<String>,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = DomainError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(DomainError::AccessDenied)?
            .to_string();

        let display_name = parts
            .headers
            .get(USER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Identity {
            user_id,
            display_name,
        })
    }
}
