//! Security response headers.
//!
//! # Responsibilities
//! - Overlay CORS headers and the route's CSP on every response
//! - Add nosniff, frame-deny, referrer and HSTS headers when the handler
//!   has not chosen its own values
//!
//! # Design Decisions
//! - Headers are set, never appended, so hardening twice is a no-op
//! - CORS and CSP always win; the rest defer to the handler

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::{GatewayConfig, ValidationError};
use crate::security::cors::CorsPolicy;

pub const HSTS: &str = "max-age=63072000; includeSubDomains; preload";

const DEFAULTS: [(header::HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
    (header::STRICT_TRANSPORT_SECURITY, HSTS),
];

/// Everything needed to harden a response for one route.
#[derive(Debug, Clone)]
pub struct ResponseHeaders {
    cors: CorsPolicy,
    csp: HeaderValue,
}

impl ResponseHeaders {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ValidationError> {
        let csp = HeaderValue::from_str(&config.csp).map_err(|_| ValidationError::InvalidHeaderValue {
            route: config.name.clone(),
            field: "csp",
        })?;
        Ok(Self {
            cors: CorsPolicy::from_config(&config.name, &config.cors)?,
            csp,
        })
    }

    /// CORS headers plus CSP, as sent on preflight responses.
    pub fn apply_preflight(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        self.cors.apply(origin, headers);
        headers.insert(header::CONTENT_SECURITY_POLICY, self.csp.clone());
    }

    /// Full hardening for handler and error responses.
    pub fn harden(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        self.apply_preflight(origin, headers);
        for (name, value) in DEFAULTS {
            headers
                .entry(name)
                .or_insert_with(|| HeaderValue::from_static(value));
        }
    }
}
