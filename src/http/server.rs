//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile every configured route into a [`Gateway`] around its handler
//! - Mount the health probe outside the gateway
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve plain TCP or TLS until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, RuntimeEnv, ValidationError};
use crate::gateway::Gateway;
use crate::http::handlers::{health, HandlerRegistry};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::net::load_tls_config;
use crate::security::rate_limit::{InMemoryRateLimiter, RateLimiter};

/// Grace period for in-flight TLS connections after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("route {route}: no handler registered as {handler:?}")]
    UnknownHandler { route: String, handler: String },

    #[error("route {route}: {source}")]
    InvalidRoute {
        route: String,
        #[source]
        source: ValidationError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the guarded site API.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    rate_limiter: Arc<InMemoryRateLimiter>,
}

impl HttpServer {
    /// Create a server with a fresh in-memory rate limiter.
    pub fn new(
        config: AppConfig,
        env: RuntimeEnv,
        handlers: &HandlerRegistry,
    ) -> Result<Self, ServerError> {
        Self::with_rate_limiter(config, env, handlers, Arc::new(InMemoryRateLimiter::new()))
    }

    /// Create a server whose routes share `rate_limiter`.
    pub fn with_rate_limiter(
        config: AppConfig,
        env: RuntimeEnv,
        handlers: &HandlerRegistry,
        rate_limiter: Arc<InMemoryRateLimiter>,
    ) -> Result<Self, ServerError> {
        let router = Self::build_router(&config, &env, handlers, rate_limiter.clone())?;
        Ok(Self {
            router,
            config,
            rate_limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &AppConfig,
        env: &RuntimeEnv,
        handlers: &HandlerRegistry,
        rate_limiter: Arc<InMemoryRateLimiter>,
    ) -> Result<Router, ServerError> {
        let mut router = Router::new().route("/health", get(health));

        for route in &config.routes {
            let name = &route.gateway.name;
            let handler = handlers
                .get(&route.handler)
                .ok_or_else(|| ServerError::UnknownHandler {
                    route: name.clone(),
                    handler: route.handler.clone(),
                })?;

            let limiter: Arc<dyn RateLimiter> = rate_limiter.clone();
            let gateway = Gateway::new(&route.gateway, env, limiter, handler).map_err(|source| {
                ServerError::InvalidRoute {
                    route: name.clone(),
                    source,
                }
            })?;

            tracing::info!(
                route = %name,
                path = %route.path,
                handler = %route.handler,
                stages = ?gateway.stage_names(),
                "Route mounted"
            );
            router = router.route(&route.path, gateway.into_method_router());
        }

        // Outermost last: the request ID is set before tracing and the
        // gateway see the request.
        Ok(router
            .layer(propagate_request_id_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer()))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn rate_limiter(&self) -> Arc<InMemoryRateLimiter> {
        self.rate_limiter.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve plain HTTP on `listener` until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` with the configured certificate until
    /// `shutdown` is triggered.
    pub async fn run_tls(self, addr: SocketAddr, shutdown: Shutdown) -> Result<(), ServerError> {
        let tls = match &self.config.listener.tls {
            Some(tls) => tls,
            None => {
                return Err(ServerError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "TLS listener requested without [listener.tls]",
                )))
            }
        };
        let rustls = load_tls_config(tls).await?;

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        let signalled = shutdown.signalled();
        tokio::spawn(async move {
            signalled.await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
