//! Terminal gateway errors and their JSON rendering.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::RuntimeMode;
use crate::security::image_url::UrlViolation;

/// Error returned by wrapped handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Every way a request can be refused before or around the handler.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to read request body")]
    BodyRead(String),

    #[error("Invalid JSON payload")]
    InvalidJson,

    #[error("JSON payload must be an object")]
    NotAnObject,

    #[error("Request rejected")]
    HoneypotTriggered,

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid imageUrl: {0}")]
    InvalidImageUrl(UrlViolation),

    #[error("Missing bearer token")]
    MissingCredentials,

    #[error("Unauthorized")]
    MalformedCredentials,

    #[error("Unauthorized")]
    InvalidCredentials,

    #[error("Too many requests")]
    RateLimited { retry_after: Duration },

    #[error("Internal server error")]
    Handler(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<&'a str>,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::PayloadTooLarge { .. }
            | GatewayError::BodyRead(_)
            | GatewayError::InvalidJson
            | GatewayError::NotAnObject
            | GatewayError::MissingField(_)
            | GatewayError::InvalidImageUrl(_) => StatusCode::BAD_REQUEST,
            GatewayError::HoneypotTriggered => StatusCode::FORBIDDEN,
            GatewayError::MissingCredentials
            | GatewayError::MalformedCredentials
            | GatewayError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::UnsupportedMediaType => "unsupported_media_type",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::BodyRead(_) => "body_read",
            GatewayError::InvalidJson => "invalid_json",
            GatewayError::NotAnObject => "not_an_object",
            GatewayError::HoneypotTriggered => "honeypot",
            GatewayError::MissingField(_) => "missing_field",
            GatewayError::InvalidImageUrl(_) => "invalid_image_url",
            GatewayError::MissingCredentials => "missing_credentials",
            GatewayError::MalformedCredentials => "malformed_credentials",
            GatewayError::InvalidCredentials => "invalid_credentials",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Handler(_) => "handler_error",
        }
    }

    /// Render as `{ "ok": false, "error": ... }`. Handler detail is only
    /// included outside production.
    pub fn into_json_response(self, mode: RuntimeMode) -> Response {
        let status = self.status();
        let debug = match (&self, mode) {
            (GatewayError::Handler(detail), RuntimeMode::Development) => Some(detail.as_str()),
            _ => None,
        };
        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
            debug,
        };
        let mut response = (status, Json(body)).into_response();

        let headers = response.headers_mut();
        match &self {
            GatewayError::MissingCredentials
            | GatewayError::MalformedCredentials
            | GatewayError::InvalidCredentials => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            GatewayError::RateLimited { retry_after } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
            }
            _ => {}
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = GatewayError::MissingField("email".into()).into_json_response(RuntimeMode::Production);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "Missing required field: email");
        assert!(json.get("debug").is_none());
    }

    #[tokio::test]
    async fn test_handler_detail_only_in_development() {
        let prod = GatewayError::Handler("db down".into()).into_json_response(RuntimeMode::Production);
        let json = body_json(prod).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(json.get("debug").is_none());

        let dev = GatewayError::Handler("db down".into()).into_json_response(RuntimeMode::Development);
        assert_eq!(dev.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(dev).await;
        assert_eq!(json["debug"], "db down");
    }

    #[test]
    fn test_challenge_and_retry_after_headers() {
        let response = GatewayError::MissingCredentials.into_json_response(RuntimeMode::Production);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = GatewayError::InvalidCredentials.into_json_response(RuntimeMode::Production);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = GatewayError::RateLimited {
            retry_after: Duration::from_secs(42),
        }
        .into_json_response(RuntimeMode::Production);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
