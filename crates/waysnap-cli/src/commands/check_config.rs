//! `check-config`: validate a service configuration before deploying it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use waysnap_lib::TileStore;

use super::load_config;
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub store: PathBuf,
    pub tile_size: f64,
    pub workers: usize,
    pub queue_depth: usize,
    pub modes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downstream_url: Option<String>,
    /// Tiles holding at least one edge; absent when the store was not opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles_with_data: Option<usize>,
}

impl ConfigReport {
    fn to_text(&self) -> String {
        let mut lines = vec![
            "Configuration OK".to_string(),
            format!("  store:       {}", self.store.display()),
            format!("  tile size:   {}", self.tile_size),
            format!("  workers:     {} (queue {})", self.workers, self.queue_depth),
            format!("  modes:       {}", self.modes.join(", ")),
            format!(
                "  downstream:  {}",
                self.downstream_url.as_deref().unwrap_or("loopback")
            ),
        ];
        if let Some(tiles) = self.tiles_with_data {
            lines.push(format!("  tiles:       {tiles}"));
        }
        lines.join("\n")
    }
}

pub fn inspect(path: &Path, open_store: bool) -> Result<ConfigReport> {
    let config = load_config(path)?;
    let tiles_with_data = if open_store {
        let store = TileStore::open(&config.graph).with_context(|| {
            format!("failed to open tile store {}", config.graph.path.display())
        })?;
        Some(store.connectivity().tile_count())
    } else {
        None
    };

    Ok(ConfigReport {
        store: config.graph.path.clone(),
        tile_size: config.graph.tile_size,
        workers: config.service.workers,
        queue_depth: config.service.queue_depth,
        modes: config.costing_options.keys().cloned().collect(),
        downstream_url: config.service.downstream_url.clone(),
        tiles_with_data,
    })
}

pub fn run(path: &Path, skip_store: bool, format: OutputFormat) -> Result<()> {
    let report = inspect(path, !skip_store)?;
    println!("{}", format.render(&report, ConfigReport::to_text)?);
    Ok(())
}
