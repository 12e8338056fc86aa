//! Test utilities for handler and pool testing.
//!
//! [`TestNetwork`] builds a tile store from `docs/fixtures/network.json` into
//! a temporary directory and loads `docs/fixtures/waysnap.json` pointing at
//! it. The directory lives as long as the `TestNetwork`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tempfile::TempDir;
use waysnap_lib::graph::NetworkFile;
use waysnap_lib::{Config, GraphBuilder, TileStore};

use crate::state::AppState;

/// Directory holding the fixture network and configuration.
pub const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../docs/fixtures");

/// Points on (or deliberately off) the fixture network, as `(lat, lon)`.
pub mod fixture_points {
    /// Western end of residential way 100.
    pub const RESIDENTIAL_WEST: (f64, f64) = (50.85, 4.35);
    /// Node shared by residential way 100 and footway 200.
    pub const SHARED_NODE: (f64, f64) = (50.85, 4.352);
    /// Node shared by way 100 and the long primary way 500.
    pub const PRIMARY_SOUTH: (f64, f64) = (50.85, 4.354);
    /// Northern end of primary way 500, ~295 km from `PRIMARY_SOUTH`.
    pub const PRIMARY_NORTH: (f64, f64) = (53.5, 4.354);
    /// Just south of oneway motorway 300.
    pub const MOTORWAY: (f64, f64) = (50.8599, 4.355);
    /// On way 400, which is not connected to anything else.
    pub const ISLAND: (f64, f64) = (10.0, 10.001);
    /// No edges anywhere near.
    pub const NORTH_POLE: (f64, f64) = (90.0, 0.0);
}

/// A tile store built from the fixture network plus its configuration.
pub struct TestNetwork {
    dir: TempDir,
    config: Config,
}

impl TestNetwork {
    /// # Panics
    ///
    /// Panics if the fixtures cannot be read or the store cannot be written.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Build the store, letting the caller adjust the configuration first.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let fixtures = PathBuf::from(FIXTURES_DIR);

        let text = fs::read_to_string(fixtures.join("waysnap.json")).expect("read config");
        let mut config = Config::from_json_str(&text).expect("fixture config is valid");
        config.graph.path = dir.path().join("network.db");
        adjust(&mut config);

        let network: NetworkFile = serde_json::from_str(
            &fs::read_to_string(fixtures.join("network.json")).expect("read network"),
        )
        .expect("fixture network parses");
        let mut builder = GraphBuilder::new(config.graph.tile_size).expect("tile size");
        builder
            .add_network(&network)
            .expect("fixture network is valid");
        builder
            .write(&config.graph.path)
            .expect("write tile store");

        Self { dir, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> TileStore {
        TileStore::open(&self.config.graph).expect("open fixture store")
    }

    /// A fresh application state with its own worker pool.
    pub fn state(&self) -> AppState {
        AppState::from_config(self.config.clone())
            .unwrap_or_else(|e| panic!("failed to start fixture state: {}", e))
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED: OnceLock<(TestNetwork, AppState)> = OnceLock::new();

/// An application state over the default fixture, shared by every caller.
pub fn test_state() -> AppState {
    SHARED
        .get_or_init(|| {
            let network = TestNetwork::new();
            let state = network.state();
            (network, state)
        })
        .1
        .clone()
}

/// Encode a JSON payload for the `json=` query parameter.
pub fn json_query(payload: &serde_json::Value) -> String {
    let mut encoded = String::new();
    for byte in payload.to_string().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    format!("json={encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_exist() {
        let fixtures = PathBuf::from(FIXTURES_DIR);
        assert!(fixtures.join("network.json").exists());
        assert!(fixtures.join("waysnap.json").exists());
    }

    #[test]
    fn test_network_builds_a_store() {
        let network = TestNetwork::new();
        let store = network.store();
        assert!(store.connectivity().tile_count() > 0);
        assert!(network.config().graph.path.starts_with(network.dir()));
    }

    #[test]
    fn test_json_query_encodes_reserved_characters() {
        let query = json_query(&serde_json::json!({"a": [1]}));
        assert_eq!(query, "json=%7B%22a%22%3A%5B1%5D%7D");
    }
}
