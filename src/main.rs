//! Secure site gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net (TLS?) ─▶ http server ─▶ Gateway(route) ─▶ handler
//!                                   request id      preflight
//!                                   tracing         body guard
//!                                   timeout         validation
//!                                                   auth?
//!                                                   rate limit
//!     ◀────────────── hardened response (CORS, CSP, HSTS, ...)
//!
//!     Background: rate-limit sweeper, signal listener, metrics exporter
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use secure_gateway::config::{load_config, AppConfig, RuntimeEnv};
use secure_gateway::http::{site_handlers, HttpServer};
use secure_gateway::lifecycle::{spawn_signal_listener, Shutdown};
use secure_gateway::observability::{logging::init_logging, metrics::init_metrics};
use secure_gateway::security::rate_limit::spawn_sweeper;

#[derive(Parser, Debug)]
#[command(name = "secure-gateway", version, about = "Request-security gateway for the site API")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let env = RuntimeEnv::from_env();

    let config: AppConfig = load_config(&args.config)?;
    init_logging(&config.observability, env.mode());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        mode = ?env.mode(),
        routes = config.routes.len(),
        "secure-gateway starting"
    );

    if args.check {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config.clone(), env, &site_handlers())?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());
    let sweeper = spawn_sweeper(
        server.rate_limiter(),
        Duration::from_secs(config.rate_limit_store.sweep_interval_secs),
        Duration::from_secs(config.rate_limit_store.stale_after_secs),
        shutdown.subscribe(),
    );

    let result = if config.listener.tls.is_some() {
        let addr: SocketAddr = config.listener.bind_address.parse()?;
        server.run_tls(addr, shutdown.clone()).await
    } else {
        let listener = TcpListener::bind(&config.listener.bind_address).await?;
        server.run(listener, shutdown.clone()).await
    };

    // Stop background tasks even if the server exited on its own.
    shutdown.trigger();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Rate-limit sweeper ended abnormally");
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
