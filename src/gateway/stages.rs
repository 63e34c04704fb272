//! The gateway's stages, in the order [`Gateway`](crate::gateway::Gateway)
//! chains them:
//!
//! ```text
//! Preflight → Harden → BodyGuard → InputValidation → [Authentication] → RateLimit → handler
//! ```
//!
//! `Harden` sits second so that it wraps both handler responses and every
//! error produced further down, while preflight answers stay minimal.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, StatusCode},
    response::Response,
};
use futures_util::future::{BoxFuture, FutureExt};

use crate::config::{RateLimitPartition, RuntimeMode};
use crate::gateway::context::RequestContext;
use crate::gateway::error::GatewayError;
use crate::gateway::pipeline::{Next, Stage, StageResult};
use crate::observability::metrics;
use crate::security::auth;
use crate::security::body;
use crate::security::headers::ResponseHeaders;
use crate::security::rate_limit::{partition_key, RateLimitDecision, RateLimitPolicy, RateLimiter};
use crate::security::validator::{self, InputRules};

/// Answers `OPTIONS` with 204 and CORS + CSP headers.
pub struct Preflight {
    headers: Arc<ResponseHeaders>,
}

impl Preflight {
    pub fn new(headers: Arc<ResponseHeaders>) -> Self {
        Self { headers }
    }
}

impl Stage for Preflight {
    fn name(&self) -> &'static str {
        "preflight"
    }

    fn call<'a>(&'a self, ctx: RequestContext, next: Next<'a>) -> BoxFuture<'a, StageResult> {
        if ctx.method() != Method::OPTIONS {
            return next.run(ctx);
        }

        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        self.headers
            .apply_preflight(ctx.headers().get(header::ORIGIN), response.headers_mut());
        futures_util::future::ready(Ok(response)).boxed()
    }
}

/// Renders errors as JSON and overlays CORS and security headers on
/// whatever comes back.
pub struct Harden {
    headers: Arc<ResponseHeaders>,
    mode: RuntimeMode,
}

impl Harden {
    pub fn new(headers: Arc<ResponseHeaders>, mode: RuntimeMode) -> Self {
        Self { headers, mode }
    }
}

impl Stage for Harden {
    fn name(&self) -> &'static str {
        "harden"
    }

    fn call<'a>(&'a self, ctx: RequestContext, next: Next<'a>) -> BoxFuture<'a, StageResult> {
        async move {
            let origin = ctx.headers().get(header::ORIGIN).cloned();
            let route = ctx.route().to_string();

            let mut response = match next.run(ctx).await {
                Ok(response) => response,
                Err(e) => {
                    metrics::record_rejection(&route, e.kind());
                    if e.status().is_server_error() {
                        tracing::error!(reason = e.kind(), "Request failed");
                    } else {
                        tracing::debug!(reason = e.kind(), error = %e, "Request rejected");
                    }
                    e.into_json_response(self.mode)
                }
            };

            self.headers.harden(origin.as_ref(), response.headers_mut());
            Ok(response)
        }
        .boxed()
    }
}

/// Content-type check, capped streaming read and JSON parse.
pub struct BodyGuard {
    max_body_bytes: usize,
}

impl BodyGuard {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }
}

impl Stage for BodyGuard {
    fn name(&self) -> &'static str {
        "body_guard"
    }

    fn call<'a>(&'a self, mut ctx: RequestContext, next: Next<'a>) -> BoxFuture<'a, StageResult> {
        async move {
            body::require_json_content_type(ctx.headers())?;

            let raw = ctx.take_body().unwrap_or_default();
            let buf = body::read_capped(ctx.headers(), raw, self.max_body_bytes).await?;
            let payload = body::parse_json(&buf)?;
            ctx.set_payload(payload);

            next.run(ctx).await
        }
        .boxed()
    }
}

/// Honeypot, required fields, trimming and image URL policy.
pub struct InputValidation {
    rules: InputRules,
}

impl InputValidation {
    pub fn new(rules: InputRules) -> Self {
        Self { rules }
    }
}

impl Stage for InputValidation {
    fn name(&self) -> &'static str {
        "input_validation"
    }

    fn call<'a>(&'a self, mut ctx: RequestContext, next: Next<'a>) -> BoxFuture<'a, StageResult> {
        let payload = ctx
            .take_payload()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

        match validator::validate(payload, &self.rules) {
            Ok(fields) => {
                ctx.set_fields(fields);
                next.run(ctx)
            }
            Err(e) => futures_util::future::ready(Err(e)).boxed(),
        }
    }
}

/// Bearer-token check against the process secret.
pub struct Authentication {
    secret: Option<Arc<str>>,
}

impl Authentication {
    pub fn new(secret: Option<Arc<str>>) -> Self {
        Self { secret }
    }
}

impl Stage for Authentication {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn call<'a>(&'a self, ctx: RequestContext, next: Next<'a>) -> BoxFuture<'a, StageResult> {
        match auth::authenticate(ctx.headers(), self.secret.as_deref()) {
            Ok(()) => next.run(ctx),
            Err(e) => {
                tracing::warn!(reason = e.kind(), "Authentication failed");
                futures_util::future::ready(Err(e)).boxed()
            }
        }
    }
}

/// Fixed-window limit keyed by client IP or token, namespaced by route.
pub struct RateLimit {
    limiter: Arc<dyn RateLimiter>,
    partition: RateLimitPartition,
    policy: RateLimitPolicy,
}

impl RateLimit {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        partition: RateLimitPartition,
        window: Duration,
        max_requests: u32,
    ) -> Self {
        Self {
            limiter,
            partition,
            policy: RateLimitPolicy {
                window,
                max_requests,
            },
        }
    }
}

impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn call<'a>(&'a self, ctx: RequestContext, next: Next<'a>) -> BoxFuture<'a, StageResult> {
        async move {
            let key = format!("{}:{}", ctx.route(), partition_key(self.partition, ctx.headers()));

            match self.limiter.check(&key, self.policy).await {
                RateLimitDecision::Allowed { .. } => next.run(ctx).await,
                RateLimitDecision::Limited { retry_after } => {
                    // Never log the key itself; by-token keys hold credentials.
                    tracing::warn!(
                        partition = ?self.partition,
                        retry_after_secs = retry_after.as_secs(),
                        "Rate limit exceeded"
                    );
                    Err(GatewayError::RateLimited { retry_after })
                }
            }
        }
        .boxed()
    }
}
