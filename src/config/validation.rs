//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, windows > 0)
//! - Check header values are representable on the wire
//! - Detect duplicate routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::{AppConfig, GatewayConfig};

/// Paths served outside the gateway.
pub const RESERVED_PATHS: &[&str] = &["/health"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,

    #[error("route name must not be empty")]
    EmptyRouteName,

    #[error("duplicate route name: {0}")]
    DuplicateRouteName(String),

    #[error("route {route}: path {path:?} must start with '/' and contain no captures or wildcards")]
    InvalidPath { route: String, path: String },

    #[error("route {route}: path {path:?} is reserved")]
    ReservedPath { route: String, path: String },

    #[error("duplicate route path: {0}")]
    DuplicatePath(String),

    #[error("route {0}: max_body_bytes must be greater than zero")]
    ZeroBodyLimit(String),

    #[error("route {0}: rate_limit.window_ms must be greater than zero")]
    ZeroWindow(String),

    #[error("route {0}: rate_limit.max_requests must be greater than zero")]
    ZeroMaxRequests(String),

    #[error("route {route}: required field {field:?} is listed more than once")]
    DuplicateRequiredField { route: String, field: String },

    #[error("route {0}: image_url.allowed_extensions must not be empty")]
    EmptyExtensions(String),

    #[error("route {0}: allow_credentials cannot be combined with a '*' origin")]
    CredentialsWithWildcard(String),

    #[error("route {route}: {field} is not a valid header value")]
    InvalidHeaderValue { route: String, field: &'static str },

    #[error("route {route}: stale_after_secs ({stale_after_secs}s) is shorter than the rate-limit window ({window_ms}ms)")]
    StaleAfterShorterThanWindow {
        route: String,
        stale_after_secs: u64,
        window_ms: u64,
    },
}

/// Validate the whole application configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.rate_limit_store.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    let stale_after_secs = config.rate_limit_store.stale_after_secs;

    for route in &config.routes {
        let gateway = &route.gateway;

        if !gateway.name.is_empty() && !names.insert(gateway.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName(gateway.name.clone()));
        }
        if !route.path.starts_with('/') || route.path.contains(['{', '}', '*']) {
            errors.push(ValidationError::InvalidPath {
                route: gateway.name.clone(),
                path: route.path.clone(),
            });
        } else if RESERVED_PATHS.contains(&route.path.as_str()) {
            errors.push(ValidationError::ReservedPath {
                route: gateway.name.clone(),
                path: route.path.clone(),
            });
        } else if !paths.insert(route.path.as_str()) {
            errors.push(ValidationError::DuplicatePath(route.path.clone()));
        }

        if stale_after_secs.saturating_mul(1000) < gateway.rate_limit.window_ms {
            errors.push(ValidationError::StaleAfterShorterThanWindow {
                route: gateway.name.clone(),
                stale_after_secs,
                window_ms: gateway.rate_limit.window_ms,
            });
        }

        collect_gateway_errors(gateway, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single route's gateway policy.
pub fn validate_gateway(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_gateway_errors(config, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect_gateway_errors(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let route = &config.name;

    if route.is_empty() {
        errors.push(ValidationError::EmptyRouteName);
    }
    let mut required = HashSet::new();
    for field in &config.required_fields {
        if !required.insert(field.as_str()) {
            errors.push(ValidationError::DuplicateRequiredField {
                route: route.clone(),
                field: field.clone(),
            });
        }
    }
    if config.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit(route.clone()));
    }
    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow(route.clone()));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroMaxRequests(route.clone()));
    }
    if let Some(policy) = &config.image_url {
        if policy.allowed_extensions.is_empty() {
            errors.push(ValidationError::EmptyExtensions(route.clone()));
        }
    }

    let cors = &config.cors;
    if cors.allow_credentials && cors.allowed_origins.iter().any(|o| o == "*") {
        errors.push(ValidationError::CredentialsWithWildcard(route.clone()));
    }

    let header_fields: [(&'static str, String); 3] = [
        ("csp", config.csp.clone()),
        ("cors.allowed_methods", cors.allowed_methods.join(", ")),
        ("cors.allowed_headers", cors.allowed_headers.join(", ")),
    ];
    for (field, value) in header_fields {
        if HeaderValue::from_str(&value).is_err() {
            errors.push(ValidationError::InvalidHeaderValue {
                route: route.clone(),
                field,
            });
        }
    }
    if cors
        .allowed_origins
        .iter()
        .any(|o| HeaderValue::from_str(o).is_err())
    {
        errors.push(ValidationError::InvalidHeaderValue {
            route: route.clone(),
            field: "cors.allowed_origins",
        });
    }
}
