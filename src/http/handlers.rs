//! Site API handlers and the registry routes refer to them by.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::gateway::{GuardedHandler, HandlerError, SanitizedBody};

/// Handlers by the name used in route configuration.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn GuardedHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, handler: impl GuardedHandler) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GuardedHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// The site's built-in handlers.
pub fn site_handlers() -> HandlerRegistry {
    HandlerRegistry::new()
        .register("contact", contact)
        .register("try-on", try_on)
}

/// Liveness probe; not behind the gateway.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// Contact form submission. Field contents are never logged.
pub async fn contact(_parts: Parts, body: SanitizedBody) -> Result<Response, HandlerError> {
    tracing::info!(
        fields = body.len(),
        has_phone = body.get_str("phone").is_some_and(|p| !p.is_empty()),
        "Contact form received"
    );
    Ok(Json(json!({ "ok": true })).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TryOnAccepted<'a> {
    ok: bool,
    preview_id: Uuid,
    image_url: &'a str,
    style: &'a str,
}

/// Virtual try-on request. The image has already passed the gateway's URL
/// policy; rendering happens at an external provider keyed by `previewId`.
pub async fn try_on(_parts: Parts, body: SanitizedBody) -> Result<Response, HandlerError> {
    let image_url = body.get_str("imageUrl").ok_or("imageUrl is missing")?;
    let style = body.get_str("style").filter(|s| !s.is_empty()).unwrap_or("natural");
    let preview_id = Uuid::new_v4();

    tracing::info!(%preview_id, style, "Try-on preview accepted");

    let accepted = TryOnAccepted {
        ok: true,
        preview_id,
        image_url,
        style,
    };
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}
