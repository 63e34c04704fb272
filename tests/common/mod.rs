//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, request::Parts, Method, Request},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};

use secure_gateway::config::{GatewayConfig, RuntimeEnv, RuntimeMode};
use secure_gateway::gateway::{Gateway, GuardedHandler, HandlerError, SanitizedBody};
use secure_gateway::security::rate_limit::InMemoryRateLimiter;

pub const PATH: &str = "/api/test";
pub const SECRET: &str = "s3cret-token";

pub fn dev_env() -> RuntimeEnv {
    RuntimeEnv::new(Some(SECRET), RuntimeMode::Development)
}

pub fn prod_env() -> RuntimeEnv {
    RuntimeEnv::new(Some(SECRET), RuntimeMode::Production)
}

/// Handler that counts calls and echoes the sanitized body back.
pub fn echo_handler(calls: Arc<AtomicUsize>) -> impl GuardedHandler {
    move |_parts: Parts, body: SanitizedBody| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<Response, HandlerError>(Json(json!({ "ok": true, "received": body })).into_response())
        }
    }
}

/// Handler that always fails with `message`.
pub fn failing_handler(message: &'static str) -> impl GuardedHandler {
    move |_parts: Parts, _body: SanitizedBody| async move {
        Err::<Response, HandlerError>(message.into())
    }
}

/// Mount `handler` behind a gateway built from `config` at [`PATH`].
pub fn gateway_router(config: &GatewayConfig, env: &RuntimeEnv, handler: impl GuardedHandler) -> Router {
    let gateway = Gateway::new(
        config,
        env,
        Arc::new(InMemoryRateLimiter::new()),
        Arc::new(handler),
    )
    .unwrap();
    Router::new().route(PATH, gateway.into_method_router())
}

pub fn json_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .body(body.into())
        .unwrap()
}

pub fn json_request_from(ip: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
