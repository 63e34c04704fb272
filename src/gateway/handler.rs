//! Wrapped handlers and the endpoint that invokes them.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{http::request::Parts, response::Response};
use futures_util::future::{BoxFuture, FutureExt};

use crate::gateway::context::{RequestContext, SanitizedBody};
use crate::gateway::error::{GatewayError, HandlerError};
use crate::gateway::pipeline::{Endpoint, StageResult};

/// A handler guarded by the gateway. It receives the original request
/// parts and the sanitized JSON body.
pub trait GuardedHandler: Send + Sync + 'static {
    fn call(&self, parts: Parts, body: SanitizedBody) -> BoxFuture<'static, Result<Response, HandlerError>>;
}

impl<F, Fut> GuardedHandler for F
where
    F: Fn(Parts, SanitizedBody) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    fn call(&self, parts: Parts, body: SanitizedBody) -> BoxFuture<'static, Result<Response, HandlerError>> {
        (self)(parts, body).boxed()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Final link of the chain: runs the handler, turning errors and panics
/// into [`GatewayError::Handler`].
pub struct HandlerEndpoint {
    handler: Arc<dyn GuardedHandler>,
}

impl HandlerEndpoint {
    pub fn new(handler: Arc<dyn GuardedHandler>) -> Self {
        Self { handler }
    }
}

impl Endpoint for HandlerEndpoint {
    fn call(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        async move {
            let route = ctx.route().to_string();
            let (parts, body) = ctx.into_handler_input();

            let outcome = AssertUnwindSafe(async { self.handler.call(parts, body).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => {
                    tracing::error!(route = %route, error = %e, "Handler failed");
                    Err(GatewayError::Handler(e.to_string()))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(route = %route, panic = %message, "Handler panicked");
                    Err(GatewayError::Handler(message))
                }
            }
        }
        .boxed()
    }
}
