//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → request.rs (assign or keep x-request-id)
//!     → server.rs (tracing, timeout, route lookup)
//!     → Gateway for the route (see crate::gateway)
//!     → handlers.rs (site handlers)
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use handlers::{site_handlers, HandlerRegistry};
pub use request::X_REQUEST_ID;
pub use server::{HttpServer, ServerError};
