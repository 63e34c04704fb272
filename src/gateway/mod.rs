//! Request-security gateway.
//!
//! # Data Flow
//! ```text
//! Request
//!     → stages.rs Preflight      (OPTIONS → 204, handler never runs)
//!     → stages.rs Harden         (post-processing of everything below)
//!     → stages.rs BodyGuard      (content type, capped read, JSON)
//!     → stages.rs InputValidation (honeypot, required fields, imageUrl)
//!     → stages.rs Authentication (only when the route requires it)
//!     → stages.rs RateLimit      (fixed window per key)
//!     → handler.rs               (wrapped handler, errors and panics caught)
//! ```
//!
//! # Design Decisions
//! - Every stage failure is terminal; nothing is retried
//! - Stages are independent values so each can be tested alone
//! - Configuration is compiled once per route; the request path only reads it

pub mod context;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod stages;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::Request,
    response::Response,
    routing::{any, MethodRouter},
};
use tracing::Instrument;

pub use context::{RequestContext, SanitizedBody};
pub use error::{GatewayError, HandlerError};
pub use handler::GuardedHandler;
pub use pipeline::{Endpoint, Next, Pipeline, Stage, StageResult};

use crate::config::{GatewayConfig, RuntimeEnv, RuntimeMode, ValidationError};
use crate::observability::metrics;
use crate::security::headers::ResponseHeaders;
use crate::security::rate_limit::RateLimiter;
use crate::security::validator::InputRules;
use handler::HandlerEndpoint;
use stages::{Authentication, BodyGuard, Harden, InputValidation, Preflight, RateLimit};

/// A handler wrapped in the full stage chain for one route.
pub struct Gateway {
    name: Arc<str>,
    pipeline: Pipeline,
    mode: RuntimeMode,
}

impl Gateway {
    /// Compile `config` into a stage chain around `handler`.
    pub fn new(
        config: &GatewayConfig,
        env: &RuntimeEnv,
        limiter: Arc<dyn RateLimiter>,
        handler: Arc<dyn GuardedHandler>,
    ) -> Result<Self, ValidationError> {
        let headers = Arc::new(ResponseHeaders::from_config(config)?);

        let mut pipeline = Pipeline::new(Arc::new(HandlerEndpoint::new(handler)))
            .stage(Preflight::new(headers.clone()))
            .stage(Harden::new(headers, env.mode()))
            .stage(BodyGuard::new(config.max_body_bytes))
            .stage(InputValidation::new(InputRules {
                honeypot_field: config.honeypot_field.clone(),
                required_fields: config.required_fields.clone(),
                image_url: config.image_url.clone(),
            }));

        if config.require_auth {
            if env.auth_secret().is_none() {
                tracing::warn!(route = %config.name, "Route requires auth but no API secret is set; all requests will be rejected");
            }
            pipeline = pipeline.stage(Authentication::new(env.auth_secret()));
        }

        pipeline = pipeline.stage(RateLimit::new(
            limiter,
            config.rate_limit.partition,
            Duration::from_millis(config.rate_limit.window_ms),
            config.rate_limit.max_requests,
        ));

        tracing::debug!(route = %config.name, stages = ?pipeline.stage_names(), "Gateway compiled");

        Ok(Self {
            name: Arc::from(config.name.as_str()),
            pipeline,
            mode: env.mode(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    /// Run one request through the chain.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let span = tracing::info_span!(
            "gateway",
            route = %self.name,
            method = %request.method(),
            request_id = %request_id,
        );

        async move {
            let (parts, body) = request.into_parts();
            let ctx = RequestContext::new(self.name.clone(), parts, body);

            // Harden renders downstream errors; this arm only covers
            // stages ahead of it.
            let response = match self.pipeline.run(ctx).await {
                Ok(response) => response,
                Err(e) => e.into_json_response(self.mode),
            };

            metrics::record_request(&self.name, response.status().as_u16(), start);
            tracing::debug!(status = response.status().as_u16(), elapsed = ?start.elapsed(), "Request complete");
            response
        }
        .instrument(span)
        .await
    }

    /// Mount as an axum route that accepts every method; the gateway
    /// decides what to do with each.
    pub fn into_method_router(self) -> MethodRouter {
        let gateway = Arc::new(self);
        any(move |request: Request| {
            let gateway = gateway.clone();
            async move { gateway.handle(request).await }
        })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish()
    }
}
