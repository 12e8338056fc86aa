//! `import`: build a SQLite tile store from a JSON road network.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use waysnap_lib::graph::{BuildSummary, NetworkFile};
use waysnap_lib::GraphBuilder;

use super::load_config;
use crate::output::OutputFormat;

/// Where the store goes and how it is tiled.
#[derive(Debug, Clone)]
pub struct ImportArgs {
    pub network: PathBuf,
    pub output: Option<PathBuf>,
    pub tile_size: Option<f64>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub store: PathBuf,
    pub tile_size: f64,
    #[serde(flatten)]
    pub summary: BuildSummary,
}

/// Resolve the target path and tile size: explicit flags first, then the
/// configuration file.
fn resolve_target(args: &ImportArgs) -> Result<(PathBuf, f64)> {
    let config = match (&args.output, args.tile_size) {
        (Some(_), Some(_)) => None,
        _ => match &args.config {
            Some(path) => Some(load_config(path)?),
            None => None,
        },
    };

    let output = match (&args.output, &config) {
        (Some(output), _) => output.clone(),
        (None, Some(config)) => config.graph.path.clone(),
        (None, None) => bail!("no output path: pass --output or --config"),
    };
    let tile_size = args
        .tile_size
        .or_else(|| config.as_ref().map(|c| c.graph.tile_size))
        .unwrap_or(waysnap_lib::config::DEFAULT_TILE_SIZE);
    Ok((output, tile_size))
}

pub fn build_store(network_path: &Path, output: &Path, tile_size: f64) -> Result<BuildSummary> {
    let text = fs::read_to_string(network_path)
        .with_context(|| format!("failed to read network {}", network_path.display()))?;
    let network: NetworkFile = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse network {}", network_path.display()))?;

    let mut builder = GraphBuilder::new(tile_size)?;
    builder
        .add_network(&network)
        .with_context(|| format!("invalid network {}", network_path.display()))?;
    builder
        .write(output)
        .with_context(|| format!("failed to write tile store {}", output.display()))
}

pub fn run(args: &ImportArgs, format: OutputFormat) -> Result<()> {
    let (store, tile_size) = resolve_target(args)?;
    let summary = build_store(&args.network, &store, tile_size)?;
    let report = ImportReport {
        store,
        tile_size,
        summary,
    };
    let rendered = format.render(&report, |r| {
        format!(
            "Imported {} ways as {} edges in {} tiles ({} connected regions) into {}",
            r.summary.ways,
            r.summary.edges,
            r.summary.tiles,
            r.summary.components,
            r.store.display()
        )
    })?;
    println!("{rendered}");
    Ok(())
}
