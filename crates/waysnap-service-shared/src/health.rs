//! Health check handlers for liveness and readiness probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" or "not_ready: <reason>".
    pub status: String,

    pub service: String,

    pub version: String,

    /// Worker threads serving requests (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Tiles in the store that hold edges (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles_loaded: Option<usize>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            workers: None,
            tiles_loaded: None,
        }
    }

    pub fn ready(service: &str, version: &str, workers: usize, tiles: usize) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            workers: Some(workers),
            tiles_loaded: Some(tiles),
        }
    }

    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            service: service.to_string(),
            version: version.to_string(),
            workers: None,
            tiles_loaded: None,
        }
    }
}

/// Liveness probe handler.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"waysnap-service-shared","version":"0.1.0"}
/// ```
pub async fn health_live() -> impl IntoResponse {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler.
///
/// Not ready when every worker has exited or the store holds no edges.
///
/// ```text
/// GET /health/ready
/// {"status":"ok","service":"waysnap-service-shared","version":"0.1.0","workers":4,"tiles_loaded":812}
/// ```
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let service = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    if state.pool().is_closed() {
        let status = HealthStatus::not_ready(service, version, "worker pool stopped");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }
    if state.tiles_with_data() == 0 {
        let status = HealthStatus::not_ready(service, version, "tile store is empty");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    let status = HealthStatus::ready(
        service,
        version,
        state.pool().workers(),
        state.tiles_with_data(),
    );
    (StatusCode::OK, Json(status)).into_response()
}
