//! Prometheus metrics for the waysnap service.
//!
//! This module provides:
//! - [`MetricsConfig`]: Configuration for the metrics system
//! - [`init_metrics`]: Install the Prometheus recorder
//! - [`metrics_handler`]: Axum handler for the `/metrics` endpoint
//! - Business metric helpers for correlation, rejection and cache behaviour
//!
//! HTTP-level counters and latencies are recorded by
//! [`MetricsLayer`](crate::middleware::MetricsLayer).
//!
//! # Example
//!
//! ```no_run
//! use waysnap_service_shared::metrics::{MetricsConfig, init_metrics, metrics_handler};
//! use axum::{Router, routing::get};
//!
//! let config = MetricsConfig::default();
//! init_metrics(&config).expect("failed to initialize metrics");
//!
//! let app: Router = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Path for the metrics endpoint (e.g., "/metrics").
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Create configuration from environment variables.
    ///
    /// - `METRICS_ENABLED`: "true" or "false" (default: true)
    /// - `METRICS_PATH`: Path for metrics endpoint (default: "/metrics")
    pub fn from_env() -> Self {
        let enabled = std::env::var("METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let path = std::env::var("METRICS_PATH").unwrap_or_else(|_| "/metrics".to_string());

        Self { enabled, path }
    }
}

/// Install the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded.
///
/// # Errors
///
/// Returns an error if metrics are disabled, the recorder is already
/// installed, or the Prometheus builder fails.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    Ok(())
}

/// Returns `None` if [`init_metrics`] has not been called.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Axum handler for the `/metrics` endpoint (Prometheus exposition format).
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

#[derive(Debug, Clone)]
pub enum MetricsError {
    Disabled,
    AlreadyInitialized,
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Disabled => write!(f, "metrics are disabled"),
            MetricsError::AlreadyInitialized => write!(f, "metrics recorder already initialized"),
            MetricsError::InstallFailed(e) => {
                write!(f, "failed to install metrics recorder: {}", e)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// =============================================================================
// Business Metrics Helpers
// =============================================================================

/// Record a request that made it through the pipeline.
///
/// Increments `waysnap_requests_completed_total` by one and
/// `waysnap_locations_correlated_total` by the location count, and records the
/// count to the `waysnap_locations_per_request` histogram.
///
/// # Arguments
///
/// * `action` - The action name (e.g., "route", "locate")
/// * `locations` - Locations carried by the request
pub fn record_correlations(action: &str, locations: usize) {
    metrics::counter!(
        "waysnap_requests_completed_total",
        "action" => action.to_string()
    )
    .increment(1);
    metrics::counter!(
        "waysnap_locations_correlated_total",
        "action" => action.to_string()
    )
    .increment(locations as u64);
    metrics::histogram!(
        "waysnap_locations_per_request",
        "action" => action.to_string()
    )
    .record(locations as f64);
}

/// Record a rejected request.
///
/// Increments `waysnap_rejections_total`.
///
/// # Arguments
///
/// * `action` - The action name, or "other" for unknown paths
/// * `kind` - The error kind label (e.g., "unreachable_region")
pub fn record_rejection(action: &str, kind: &str) {
    metrics::counter!(
        "waysnap_rejections_total",
        "action" => action.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a worker clearing its over-committed tile cache.
pub fn record_cache_cleared(worker: usize) {
    metrics::counter!(
        "waysnap_tile_cache_clears_total",
        "worker" => worker.to_string()
    )
    .increment(1);
}

/// Record a handoff sent to the next pipeline stage.
///
/// # Arguments
///
/// * `target` - "loopback" or "http"
/// * `outcome` - "ok" or "error"
pub fn record_downstream_forward(target: &str, outcome: &str) {
    metrics::counter!(
        "waysnap_downstream_forwards_total",
        "target" => target.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
