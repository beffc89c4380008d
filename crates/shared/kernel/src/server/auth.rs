use crate::security::{Claims, Principal};
use crate::server::error::ApiError;
use crate::server::state::ApiState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::ops::Deref;

pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// The caller behind a verified `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub token: String,
    pub claims: Claims,
}

impl Deref for AuthUser {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.claims.principal
    }
}

impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let token = bearer(&parts.headers).ok_or_else(|| ApiError::forbidden(NOT_AUTHENTICATED))?;
        authenticate(state, token)
    }
}

/// Verifies a raw token the same way the header extractor does.
///
/// # Errors
/// 403 with the verification reason.
pub fn authenticate(state: &ApiState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = state.tokens.verify(token).map_err(|e| {
        ApiError::forbidden(format!("Invalid authentication credentials: {}", e.reason()))
    })?;
    Ok(AuthUser { token: token.to_owned(), claims })
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
