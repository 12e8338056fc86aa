//! `request`: run one request through a worker without the HTTP service.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use waysnap_lib::{Outcome, RawRequest, TileStore, Worker, WorkerContext};

use super::load_config;

#[derive(Debug, Clone)]
pub struct RequestArgs {
    pub config: PathBuf,
    /// Path plus optional query string, e.g. `/locate?json=...`.
    pub target: String,
    pub method: String,
    pub body: Option<String>,
    pub body_file: Option<PathBuf>,
}

fn read_body(args: &RequestArgs) -> Result<Option<String>> {
    match (&args.body, &args.body_file) {
        (Some(body), _) => Ok(Some(body.clone())),
        (None, Some(path)) => fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("failed to read body from {}", path.display())),
        (None, None) => Ok(None),
    }
}

/// Process the request and return what the service would send back.
pub fn execute(config_path: &Path, raw: &RawRequest) -> Result<String> {
    let config = load_config(config_path)?;
    let store = TileStore::open(&config.graph).context("failed to open tile store")?;
    let mut worker = Worker::new(WorkerContext::new(&config), store.reader()?);

    match worker.handle(raw) {
        Ok(Outcome::Respond { body, .. }) => Ok(body),
        Ok(Outcome::Forward { document, .. }) => Ok(serde_json::to_string_pretty(&document)?),
        Err(err) => Err(anyhow!(
            "request rejected ({} {}): {}",
            err.status_code(),
            err.kind(),
            err
        )),
    }
}

pub fn run(args: &RequestArgs) -> Result<()> {
    let mut raw = RawRequest::from_target(args.method.to_uppercase(), &args.target);
    if let Some(body) = read_body(args)? {
        raw = raw.with_body(body);
    }
    let output = execute(&args.config, &raw)?;
    println!("{output}");
    Ok(())
}
