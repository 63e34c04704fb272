//! CORS header composition.
//!
//! Origins are matched exactly. The policy is compiled to header values once
//! per route so the hot path never re-validates configuration.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::CorsConfig;
use crate::config::ValidationError;

/// Compiled CORS policy for one route.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<HeaderValue>,
    allow_any: bool,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    allow_credentials: bool,
}

impl CorsPolicy {
    pub fn from_config(route: &str, config: &CorsConfig) -> Result<Self, ValidationError> {
        let invalid = |field: &'static str| ValidationError::InvalidHeaderValue {
            route: route.to_string(),
            field,
        };

        let allowed_origins = config
            .allowed_origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .map(|o| HeaderValue::from_str(o))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid("cors.allowed_origins"))?;

        Ok(Self {
            allowed_origins,
            allow_any: config.allowed_origins.iter().any(|o| o == "*"),
            allow_methods: HeaderValue::from_str(&config.allowed_methods.join(", "))
                .map_err(|_| invalid("cors.allowed_methods"))?,
            allow_headers: HeaderValue::from_str(&config.allowed_headers.join(", "))
                .map_err(|_| invalid("cors.allowed_headers"))?,
            allow_credentials: config.allow_credentials,
        })
    }

    /// Value for `Access-Control-Allow-Origin`, and whether the specific
    /// request origin was echoed.
    fn allow_origin(&self, origin: Option<&HeaderValue>) -> (HeaderValue, bool) {
        if let Some(origin) = origin {
            if self.allowed_origins.iter().any(|allowed| allowed == origin) {
                return (origin.clone(), true);
            }
        }
        if self.allow_any {
            (HeaderValue::from_static("*"), false)
        } else {
            (HeaderValue::from_static("null"), false)
        }
    }

    /// Set CORS headers on `headers`. Existing values are replaced.
    pub fn apply(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        let (allow_origin, echoed) = self.allow_origin(origin);

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));

        if self.allow_credentials && echoed {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        } else {
            headers.remove(header::ACCESS_CONTROL_ALLOW_CREDENTIALS);
        }
    }
}
