//! Application state for the HTTP service.
//!
//! Handlers reach the worker pool and the downstream target through the
//! shared [`AppState`].

use std::path::Path;
use std::sync::Arc;

use waysnap_lib::{Config, Error as LibError, TileStore};

use crate::downstream::{Downstream, DownstreamError};
use crate::pool::WorkerPool;

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// The configuration file is missing or invalid.
    Config(LibError),

    /// The tile store could not be opened.
    GraphStore(LibError),

    /// The worker pool could not be started.
    Workers(LibError),

    /// The downstream target is misconfigured.
    Downstream(DownstreamError),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "failed to load configuration: {}", e),
            Self::GraphStore(e) => write!(f, "failed to open tile store: {}", e),
            Self::Workers(e) => write!(f, "failed to start workers: {}", e),
            Self::Downstream(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) | Self::GraphStore(e) | Self::Workers(e) => Some(e),
            Self::Downstream(e) => Some(e),
        }
    }
}

/// Shared application state for all axum handlers.
///
/// Cheap to clone; share it through axum's `State` extractor.
///
/// # Example
///
/// ```ignore
/// use waysnap_service_shared::{build_router, AppState};
///
/// let state = AppState::load("waysnap.json").unwrap();
/// let app = build_router(state, "/metrics");
/// ```
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pool: WorkerPool,
    downstream: Downstream,
    tiles_with_data: usize,
}

impl AppState {
    /// Load the configuration file and start the service from it.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self, AppStateError> {
        let config_path = config_path.as_ref();
        tracing::info!(path = %config_path.display(), "loading configuration");
        let config = Config::from_path(config_path).map_err(AppStateError::Config)?;
        Self::from_config(config)
    }

    /// Open the tile store, start the workers and resolve the downstream target.
    pub fn from_config(config: Config) -> Result<Self, AppStateError> {
        let store = TileStore::open(&config.graph).map_err(AppStateError::GraphStore)?;
        let tiles_with_data = store.connectivity().tile_count();

        let pool = WorkerPool::spawn(&config, &store).map_err(AppStateError::Workers)?;
        let downstream =
            Downstream::from_settings(&config.service).map_err(AppStateError::Downstream)?;

        tracing::info!(
            workers = pool.workers(),
            tiles = tiles_with_data,
            downstream = downstream.target(),
            "application state loaded"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                downstream,
                tiles_with_data,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }

    pub fn downstream(&self) -> &Downstream {
        &self.inner.downstream
    }

    /// Number of tiles in the store that hold at least one edge.
    pub fn tiles_with_data(&self) -> usize {
        self.inner.tiles_with_data
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("workers", &self.inner.pool.workers())
            .field("tiles_with_data", &self.inner.tiles_with_data)
            .field("downstream", &self.inner.downstream.target())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestNetwork;

    #[test]
    fn test_app_state_from_fixture() {
        let network = TestNetwork::new();
        let state = network.state();

        assert_eq!(state.pool().workers(), 2);
        assert!(state.tiles_with_data() > 0);
        assert_eq!(state.downstream().target(), "loopback");
    }

    #[test]
    fn test_app_state_debug() {
        let network = TestNetwork::new();
        let debug = format!("{:?}", network.state());

        assert!(debug.contains("AppState"));
        assert!(debug.contains("workers"));
        assert!(debug.contains("loopback"));
    }

    #[test]
    fn test_app_state_load_nonexistent() {
        let result = AppState::load("/nonexistent/path/to/waysnap.json");
        match result.unwrap_err() {
            AppStateError::Config(err) => assert!(matches!(err, LibError::Io(_))),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_store_is_reported() {
        let network = TestNetwork::new();
        let mut config = network.config().clone();
        config.graph.path = network.dir().join("missing.db");
        let err = AppState::from_config(config).unwrap_err();
        assert!(matches!(err, AppStateError::GraphStore(_)));
        assert!(err.to_string().starts_with("failed to open tile store"));
    }

    #[test]
    fn test_bad_downstream_url_is_reported() {
        let network = TestNetwork::new();
        let mut config = network.config().clone();
        config.service.downstream_url = Some("thor.local:8002".to_string());
        let err = AppState::from_config(config).unwrap_err();
        assert!(matches!(err, AppStateError::Downstream(_)));
    }
}
