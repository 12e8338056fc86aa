//! waysnap HTTP service.
//!
//! Normalizes and validates routing requests, resolves their costing, rejects
//! infeasible legs early and correlates every location with the road network.
//! Route requests are handed off to the next pipeline stage; lookups are
//! answered directly.
//!
//! # Endpoints
//!
//! - `GET|POST /route` - Correlate locations and hand off for routing
//! - `GET|POST /viaroute` - Same, with `loc=lat,lon` parameters
//! - `GET|POST /locate` - Report the ways each location snaps to
//! - `GET|POST /nearest` - Reserved; answers 501
//! - `GET /metrics` - Prometheus metrics endpoint
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//!
//! # Configuration
//!
//! - `WAYSNAP_CONFIG` - Path to the JSON configuration file (default: /etc/waysnap/waysnap.json)
//! - `WAYSNAP_WORKERS` - Overrides `service.workers`
//! - `SERVICE_PORT` - HTTP port (default: 8080)
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text

use std::env;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use waysnap_lib::Config;
use waysnap_service_shared::{
    build_router, init_logging, init_metrics, AppState, LoggingConfig, MetricsConfig,
};

const DEFAULT_CONFIG_PATH: &str = "/etc/waysnap/waysnap.json";

#[tokio::main]
async fn main() -> Result<()> {
    let logging_config = LoggingConfig::from_env().with_service("waysnap");
    init_logging(&logging_config);

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config_path =
        env::var("WAYSNAP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let port: u16 = match env::var("SERVICE_PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("SERVICE_PORT must be a port number, got '{value}'"))?,
        Err(_) => 8080,
    };

    info!(config = %config_path, port = port, "starting waysnap service");

    let config = load_config(Path::new(&config_path))?;
    let state = AppState::from_config(config).context("failed to start service")?;
    let app = build_router(state, &metrics_config.path);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening on");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("waysnap service stopped");
    Ok(())
}

/// Load the configuration file and apply environment overrides.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::from_path(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    if let Ok(value) = env::var("WAYSNAP_WORKERS") {
        config.service.workers = value
            .parse()
            .with_context(|| format!("WAYSNAP_WORKERS must be a positive integer, got '{value}'"))?;
        config.validate().context("invalid WAYSNAP_WORKERS override")?;
    }
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
