//! Bearer-token authentication.
//!
//! Tokens are compared with `subtle` so that rejection time does not depend on
//! how many leading bytes matched.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

use crate::gateway::GatewayError;

/// Equal-length check, then constant-time byte equality.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(GatewayError::MissingCredentials)?;
    let value = value
        .to_str()
        .map_err(|_| GatewayError::MalformedCredentials)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(GatewayError::MalformedCredentials)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(GatewayError::MalformedCredentials);
    }
    Ok(token)
}

/// Check the request's bearer token against the configured secret.
pub fn authenticate(headers: &HeaderMap, secret: Option<&str>) -> Result<(), GatewayError> {
    let token = bearer_token(headers)?;

    let Some(secret) = secret else {
        tracing::error!("Route requires auth but no API secret is configured");
        return Err(GatewayError::InvalidCredentials);
    };

    if constant_time_eq(token.as_bytes(), secret.as_bytes()) {
        Ok(())
    } else {
        Err(GatewayError::InvalidCredentials)
    }
}
