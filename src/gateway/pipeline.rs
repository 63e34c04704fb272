//! Ordered stage chain with explicit continuations.
//!
//! Each stage receives the request context and a [`Next`]. Calling
//! `next.run(ctx)` hands control to the following stage (or, after the last
//! stage, to the endpoint). Returning without calling it short-circuits.

use std::sync::Arc;

use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::gateway::context::RequestContext;
use crate::gateway::error::GatewayError;

pub type StageResult = Result<Response, GatewayError>;

/// One step of the gateway.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn call<'a>(&'a self, ctx: RequestContext, next: Next<'a>) -> BoxFuture<'a, StageResult>;
}

/// What runs after every stage has passed.
pub trait Endpoint: Send + Sync {
    fn call(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult>;
}

/// Continuation into the rest of the chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn Stage>], endpoint: &'a dyn Endpoint) -> Self {
        Self { stages, endpoint }
    }

    pub fn run(self, ctx: RequestContext) -> BoxFuture<'a, StageResult> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.call(ctx, Next::new(rest, self.endpoint)),
            None => self.endpoint.call(ctx),
        }
    }
}

/// Stages plus the endpoint they guard.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    endpoint: Arc<dyn Endpoint>,
}

impl Pipeline {
    pub fn new(endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            stages: Vec::new(),
            endpoint,
        }
    }

    /// Append a stage; stages run in the order they were added.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: RequestContext) -> StageResult {
        Next::new(&self.stages, self.endpoint.as_ref()).run(ctx).await
    }
}
