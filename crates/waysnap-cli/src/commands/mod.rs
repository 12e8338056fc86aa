pub mod check_config;
pub mod import;
pub mod request;

use std::path::Path;

use anyhow::{Context, Result};
use waysnap_lib::Config;

/// Load a configuration file, naming the file in any error.
pub fn load_config(path: &Path) -> Result<Config> {
    Config::from_path(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}
