//! Request-security gateway for a small site API.
//!
//! Every guarded route runs through the same chain before its handler sees
//! anything: preflight, body guard, input validation, optional bearer
//! authentication and a fixed-window rate limit, with CORS and security
//! headers applied to whatever comes back.

pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::{AppConfig, GatewayConfig, RuntimeEnv, RuntimeMode};
pub use gateway::{Gateway, GatewayError, GuardedHandler, HandlerError, SanitizedBody};
pub use http::{HandlerRegistry, HttpServer};
pub use lifecycle::Shutdown;
pub use security::rate_limit::{InMemoryRateLimiter, RateLimiter};
