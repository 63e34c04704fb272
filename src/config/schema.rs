//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::config::validation::{validate_gateway, ValidationError};

/// Root configuration for the gateway service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Rate-limit store maintenance.
    pub rate_limit_store: RateLimitStoreConfig,

    /// Guarded API routes.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// This is the only bound on slow request bodies.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Maintenance of the in-memory rate-limit map.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitStoreConfig {
    /// How often the sweeper runs.
    pub sweep_interval_secs: u64,

    /// Entries whose window started longer ago than this are dropped.
    /// Must be at least as long as every route's window.
    pub stale_after_secs: u64,
}

impl Default for RateLimitStoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            stale_after_secs: 600,
        }
    }
}

/// A guarded route: where it is mounted, which handler serves it,
/// and the gateway policy in front of it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Path the route is mounted on (e.g., "/api/contact").
    pub path: String,

    /// Name of the registered handler serving this route.
    pub handler: String,

    #[serde(flatten)]
    pub gateway: GatewayConfig,
}

/// How rate-limit keys are derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitPartition {
    /// Client IP from forwarding headers.
    #[default]
    ByIp,
    /// Raw `Authorization` header value.
    ByToken,
}

/// Per-route rate limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub partition: RateLimitPartition,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per key per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            partition: RateLimitPartition::ByIp,
            window_ms: 60_000,
            max_requests: 30,
        }
    }
}

/// CORS policy for a route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins allowed; `"*"` allows any.
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec!["POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            allow_credentials: false,
        }
    }
}

/// Allow-lists applied to an `imageUrl` field before a handler may fetch it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageUrlPolicy {
    /// Hostnames allowed; empty means any public host.
    pub allowed_hosts: Vec<String>,

    /// Lower-case file extensions without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for ImageUrlPolicy {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            allowed_extensions: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

pub const DEFAULT_CSP: &str =
    "default-src 'none'; frame-ancestors 'none'; base-uri 'none'; form-action 'self'";

/// Gateway policy for one route.
///
/// Built once at registration and shared read-only afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Route identifier for logging, metrics and rate-limit namespacing.
    pub name: String,

    /// Fields that must be present as non-empty strings, checked in order.
    pub required_fields: Vec<String>,

    pub require_auth: bool,

    pub rate_limit: RateLimitConfig,

    pub max_body_bytes: usize,

    pub honeypot_field: String,

    /// Content-Security-Policy value set on every response.
    pub csp: String,

    pub cors: CorsConfig,

    pub image_url: Option<ImageUrlPolicy>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            required_fields: Vec::new(),
            require_auth: false,
            rate_limit: RateLimitConfig::default(),
            max_body_bytes: 1024 * 1024, // 1MB
            honeypot_field: "honeypot".to_string(),
            csp: DEFAULT_CSP.to_string(),
            cors: CorsConfig::default(),
            image_url: None,
        }
    }
}

impl GatewayConfig {
    /// Start a builder with named defaults for the given route name.
    pub fn builder(name: impl Into<String>) -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            config: GatewayConfig {
                name: name.into(),
                ..Default::default()
            },
        }
    }
}

/// Builder for [`GatewayConfig`]. `build` runs the same semantic checks as
/// file-loaded configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn require_auth(mut self, required: bool) -> Self {
        self.config.require_auth = required;
        self
    }

    pub fn rate_limit(mut self, partition: RateLimitPartition, window_ms: u64, max_requests: u32) -> Self {
        self.config.rate_limit = RateLimitConfig {
            partition,
            window_ms,
            max_requests,
        };
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    pub fn honeypot_field(mut self, field: impl Into<String>) -> Self {
        self.config.honeypot_field = field.into();
        self
    }

    pub fn csp(mut self, policy: impl Into<String>) -> Self {
        self.config.csp = policy.into();
        self
    }

    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.config.cors = cors;
        self
    }

    pub fn image_url_policy(mut self, policy: ImageUrlPolicy) -> Self {
        self.config.image_url = Some(policy);
        self
    }

    pub fn build(self) -> Result<GatewayConfig, Vec<ValidationError>> {
        validate_gateway(&self.config)?;
        Ok(self.config)
    }
}
