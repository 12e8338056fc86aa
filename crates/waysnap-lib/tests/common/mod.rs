//! Shared fixtures for integration tests.
//!
//! Every test builds its own tile store from `docs/fixtures/network.json` in a
//! temporary directory, so tests never share a database file.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use waysnap_lib::graph::NetworkFile;
use waysnap_lib::{Config, GraphBuilder, TileReader, TileStore, Worker, WorkerContext};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// A tile store built from the fixture network plus the fixture configuration.
pub struct Fixture {
    _dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Build the fixture, letting the caller adjust the configuration first.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let text = fs::read_to_string(fixtures_dir().join("waysnap.json")).expect("read config");
        let mut config = Config::from_json_str(&text).expect("fixture config is valid");
        config.graph.path = dir.path().join("network.db");
        adjust(&mut config);

        let network: NetworkFile = serde_json::from_str(
            &fs::read_to_string(fixtures_dir().join("network.json")).expect("read network"),
        )
        .expect("fixture network parses");
        let mut builder = GraphBuilder::new(config.graph.tile_size).expect("tile size");
        builder.add_network(&network).expect("fixture network is valid");
        builder.write(&config.graph.path).expect("write tile store");

        Self { _dir: dir, config }
    }

    pub fn store(&self) -> TileStore {
        TileStore::open(&self.config.graph).expect("open fixture store")
    }

    pub fn worker(&self) -> Worker<TileReader> {
        let reader = self.store().reader().expect("open reader");
        Worker::new(WorkerContext::new(&self.config), reader)
    }
}
