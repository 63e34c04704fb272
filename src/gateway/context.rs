//! Per-request state threaded through the stage chain.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{request::Parts, HeaderMap, Method},
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Validated JSON fields handed to the wrapped handler.
///
/// Required fields are trimmed, non-empty strings; every other string is
/// trimmed; non-string values are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SanitizedBody(Map<String, Value>);

impl SanitizedBody {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String value of `field`, if it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// What each stage sees. Stages take what they consume (the raw body,
/// the parsed payload) and leave what later stages need.
#[derive(Debug)]
pub struct RequestContext {
    route: Arc<str>,
    parts: Parts,
    body: Option<Body>,
    payload: Option<Value>,
    fields: Option<SanitizedBody>,
}

impl RequestContext {
    pub fn new(route: Arc<str>, parts: Parts, body: Body) -> Self {
        Self {
            route,
            parts,
            body: Some(body),
            payload: None,
            fields: None,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    pub fn set_payload(&mut self, payload: Value) {
        self.payload = Some(payload);
    }

    pub fn take_payload(&mut self) -> Option<Value> {
        self.payload.take()
    }

    pub fn set_fields(&mut self, fields: SanitizedBody) {
        self.fields = Some(fields);
    }

    pub fn fields(&self) -> Option<&SanitizedBody> {
        self.fields.as_ref()
    }

    /// Split into what the handler receives.
    pub fn into_handler_input(self) -> (Parts, SanitizedBody) {
        (self.parts, self.fields.unwrap_or_default())
    }
}
