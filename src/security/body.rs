//! Request body guard.
//!
//! # Responsibilities
//! - Require `Content-Type: application/json`
//! - Read the body as a stream, aborting once the byte cap is crossed
//! - Parse JSON, treating an empty body as `{}`
//!
//! # Design Decisions
//! - A declared `Content-Length` is only used to reject early; it is never
//!   trusted as an upper bound
//! - Nothing is parsed until the whole (bounded) body has arrived

use axum::{
    body::Body,
    http::{header, HeaderMap},
};
use futures_util::StreamExt;
use serde_json::Value;

use crate::gateway::GatewayError;

/// Check that the media type is `application/json`, ignoring parameters.
pub fn require_json_content_type(headers: &HeaderMap) -> Result<(), GatewayError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::UnsupportedMediaType)?;

    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if media_type.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        Err(GatewayError::UnsupportedMediaType)
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Read at most `limit` bytes from `body`.
pub async fn read_capped(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<Vec<u8>, GatewayError> {
    if declared_length(headers).is_some_and(|len| len > limit as u64) {
        return Err(GatewayError::PayloadTooLarge { limit });
    }

    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GatewayError::BodyRead(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            tracing::debug!(limit, read = buf.len() + chunk.len(), "Body exceeded cap, aborting read");
            return Err(GatewayError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}

/// Parse a bounded buffer as JSON. Empty means `{}`.
pub fn parse_json(buf: &[u8]) -> Result<Value, GatewayError> {
    if buf.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(buf).map_err(|_| GatewayError::InvalidJson)
}
