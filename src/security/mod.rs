//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → body.rs (content type, capped read, JSON)
//!     → validator.rs (honeypot, required fields, trimming)
//!         → image_url.rs (SSRF-safe imageUrl policy)
//!     → auth.rs (constant-time bearer check)
//!     → rate_limit.rs (fixed window per key, clock.rs for time)
//! Outgoing response:
//!     → headers.rs (CSP, HSTS, nosniff, frame-deny, referrer)
//!         → cors.rs (origin allow-list)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod auth;
pub mod body;
pub mod clock;
pub mod cors;
pub mod headers;
pub mod image_url;
pub mod rate_limit;
pub mod validator;
