//! Shared HTTP infrastructure for the waysnap service.
//!
//! This crate provides the glue between axum and the request pipeline in
//! `waysnap-lib`:
//!
//! - [`AppState`]: Loaded configuration, worker pool and downstream target
//! - [`WorkerPool`]: Dedicated worker threads, each owning a graph reader
//! - [`Downstream`]: Where route handoff documents go (loopback or HTTP)
//! - [`health`]: Health check handlers for liveness/readiness probes
//! - [`ProblemDetails`]: RFC 9457 Problem Details for error responses
//! - [`ServiceResponse`]: Pre-rendered JSON/JSONP success bodies
//! - [`metrics`]: Prometheus metrics infrastructure
//! - [`logging`]: Structured JSON logging setup
//! - [`middleware`]: Request id and metrics middleware
//!
//! # Architecture
//!
//! Handlers stay thin. Every request stage lives in `waysnap-lib`; this crate
//! only moves bytes between the socket and a worker thread:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum fallback handler                                      │
//! │  - Pick the action from the path, reject other methods      │
//! │  - Convert method, query and body into a RawRequest         │
//! │  - Queue it on the WorkerPool and await the reply           │
//! │  - Respond directly, or forward the handoff downstream      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module builds a tile store from the fixture network
//! and a ready [`AppState`]. Enable the `test-utils` feature to access it
//! from dependent crates.

pub mod downstream;
mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod pool;
mod problem;
mod request;
mod response;
mod router;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use downstream::{Downstream, DownstreamError, Relayed};
pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_cache_cleared, record_correlations,
    record_downstream_forward, record_rejection, MetricsConfig, MetricsError,
};
pub use middleware::{extract_or_generate_request_id, path_label, MetricsLayer, RequestId};
pub use pool::{DispatchError, WorkerPool};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_DOWNSTREAM_FAILED, PROBLEM_INTERNAL_ERROR,
    PROBLEM_INVALID_REQUEST, PROBLEM_METHOD_NOT_ALLOWED, PROBLEM_SERVICE_UNAVAILABLE,
};
pub use request::{raw_request, MAX_BODY_BYTES};
pub use response::{ServiceResponse, JSON_CONTENT_TYPE};
pub use router::build_router;
pub use state::{AppState, AppStateError};
