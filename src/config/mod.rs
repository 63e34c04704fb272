//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → one GatewayConfig per route, shared via Arc
//!
//! process environment
//!     → env.rs (secret + runtime mode, read once)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::{RuntimeEnv, RuntimeMode};
pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, CorsConfig, GatewayConfig, ImageUrlPolicy, ListenerConfig, RateLimitConfig,
    RateLimitPartition, RouteConfig,
};
pub use validation::ValidationError;
