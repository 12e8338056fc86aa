//! Process-wide configuration and the read-only service limits derived from it.
//!
//! The configuration is a JSON document loaded once at startup:
//!
//! ```json
//! {
//!   "graph": { "path": "network.db", "tile_size": 0.25, "max_cache_tiles": 1024 },
//!   "service": { "workers": 4, "queue_depth": 64, "downstream_url": null },
//!   "service_limits": {
//!     "max_locations": { "route": 20, "viaroute": 20 },
//!     "max_distance": { "auto": 5000000.0, "pedestrian": 250000.0 }
//!   },
//!   "costing_options": { "auto": {}, "pedestrian": {} }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::Action;
use crate::costing::CostFactory;
use crate::error::{Error, Result};
use crate::graph::TileGrid;

/// Default edge length of a tile in degrees.
pub const DEFAULT_TILE_SIZE: f64 = 0.25;

/// Default number of tiles a reader caches before it is considered over-committed.
pub const DEFAULT_MAX_CACHE_TILES: usize = 1024;

/// Default maximum location count for route-type actions.
pub const DEFAULT_MAX_ROUTE_LOCATIONS: usize = 20;

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub graph: GraphConfig,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub service_limits: LimitsConfig,
    /// Default costing options per travel mode. A mode must appear here to be usable.
    #[serde(default)]
    pub costing_options: Map<String, Value>,
}

/// Tile store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Path to the SQLite tile store.
    pub path: PathBuf,
    /// Edge length of a tile in degrees. Must match the store.
    #[serde(default = "default_tile_size")]
    pub tile_size: f64,
    /// Tiles a single reader may cache before the post-request budget clears it.
    #[serde(default = "default_max_cache_tiles")]
    pub max_cache_tiles: usize,
}

/// Worker and transport settings for the HTTP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Number of worker threads, each with its own graph reader.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Requests that may wait for a free worker.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Next pipeline stage. When unset, handoff documents are returned to the caller.
    #[serde(default)]
    pub downstream_url: Option<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_depth: default_queue_depth(),
            downstream_url: None,
        }
    }
}

/// Per-action and per-mode limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub max_locations: MaxLocations,
    /// Maximum straight-line distance between consecutive locations, in metres.
    #[serde(default)]
    pub max_distance: BTreeMap<String, f64>,
}

/// Maximum location counts for route-type actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxLocations {
    #[serde(default = "default_max_route_locations")]
    pub route: usize,
    #[serde(default = "default_max_route_locations")]
    pub viaroute: usize,
}

impl Default for MaxLocations {
    fn default() -> Self {
        Self {
            route: DEFAULT_MAX_ROUTE_LOCATIONS,
            viaroute: DEFAULT_MAX_ROUTE_LOCATIONS,
        }
    }
}

fn default_tile_size() -> f64 {
    DEFAULT_TILE_SIZE
}

fn default_max_cache_tiles() -> usize {
    DEFAULT_MAX_CACHE_TILES
}

fn default_workers() -> usize {
    4
}

fn default_queue_depth() -> usize {
    64
}

fn default_max_route_locations() -> usize {
    DEFAULT_MAX_ROUTE_LOCATIONS
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// A relative `graph.path` is resolved against the configuration file's directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&text)?;
        if config.graph.path.is_relative() {
            if let Some(parent) = path.parent() {
                config.graph.path = parent.join(&config.graph.path);
            }
        }
        Ok(config)
    }

    /// Parse and validate a configuration document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text).map_err(|err| Error::InvalidConfig {
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let tile_size = self.graph.tile_size;
        if !(tile_size > 0.0 && tile_size <= 180.0) || !divides_evenly(180.0, tile_size) {
            return Err(invalid(format!(
                "graph.tile_size must be positive and divide 180 evenly, got {tile_size}"
            )));
        }
        TileGrid::new(tile_size).map_err(|err| invalid(format!("graph.tile_size: {err}")))?;
        if self.graph.max_cache_tiles == 0 {
            return Err(invalid("graph.max_cache_tiles must be at least 1"));
        }
        if self.service.workers == 0 {
            return Err(invalid("service.workers must be at least 1"));
        }
        if self.service.queue_depth == 0 {
            return Err(invalid("service.queue_depth must be at least 1"));
        }

        let max_locations = &self.service_limits.max_locations;
        if max_locations.route == 0 || max_locations.viaroute == 0 {
            return Err(invalid("service_limits.max_locations must be at least 1"));
        }

        let factory = CostFactory::standard();
        for (mode, options) in &self.costing_options {
            if !options.is_object() {
                return Err(invalid(format!(
                    "costing_options.{mode} must be an object"
                )));
            }
            // Modes without a built-in model are rejected per request instead.
            if factory.contains(mode) {
                factory
                    .create(mode, options)
                    .map_err(|err| invalid(format!("costing_options.{mode}: {err}")))?;
            }
            match self.service_limits.max_distance.get(mode) {
                Some(distance) if *distance > 0.0 => {}
                Some(distance) => {
                    return Err(invalid(format!(
                        "service_limits.max_distance.{mode} must be positive, got {distance}"
                    )))
                }
                None => {
                    return Err(invalid(format!(
                        "service_limits.max_distance.{mode} is required for costing mode '{mode}'"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Build the read-only limits shared by every worker.
    pub fn limits(&self) -> ServiceLimits {
        ServiceLimits {
            max_route_locations: self.service_limits.max_locations.route,
            max_viaroute_locations: self.service_limits.max_locations.viaroute,
            max_distance: self.service_limits.max_distance.clone(),
            costing_options: self.costing_options.clone(),
        }
    }
}

fn divides_evenly(whole: f64, part: f64) -> bool {
    let count = whole / part;
    (count - count.round()).abs() < 1e-9
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        message: message.into(),
    }
}

/// Read-only limits consulted on every request.
#[derive(Debug, Clone)]
pub struct ServiceLimits {
    max_route_locations: usize,
    max_viaroute_locations: usize,
    max_distance: BTreeMap<String, f64>,
    costing_options: Map<String, Value>,
}

impl ServiceLimits {
    /// Maximum number of locations for an action; `None` when unbounded.
    pub fn max_locations(&self, action: Action) -> Option<usize> {
        match action {
            Action::Route => Some(self.max_route_locations),
            Action::ViaRoute => Some(self.max_viaroute_locations),
            Action::Locate | Action::Nearest => None,
        }
    }

    /// Maximum pairwise distance in metres for a travel mode.
    pub fn max_distance(&self, mode: &str) -> Option<f64> {
        self.max_distance.get(mode).copied()
    }

    /// Default costing options for a travel mode.
    pub fn default_costing(&self, mode: &str) -> Option<&Value> {
        self.costing_options.get(mode)
    }

    /// Travel modes with default costing options.
    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.costing_options.keys().map(String::as_str)
    }
}
