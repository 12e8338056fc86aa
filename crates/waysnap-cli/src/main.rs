use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use waysnap_cli::commands::{check_config, import, request};
use waysnap_cli::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "waysnap tile store and request utilities")]
struct Cli {
    /// Service configuration file.
    #[arg(long, global = true, env = "WAYSNAP_CONFIG")]
    config: Option<PathBuf>,

    /// Output format for command summaries.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a tile store from a JSON road network.
    Import {
        /// Road network document.
        network: PathBuf,
        /// Store to write. Defaults to `graph.path` from the configuration.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Tile edge length in degrees. Defaults to `graph.tile_size`.
        #[arg(long)]
        tile_size: Option<f64>,
    },
    /// Run a single request against the tile store and print the result.
    Request {
        /// Request target, e.g. `/locate?json={...}`.
        target: String,
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
        /// Request body.
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,
        /// Read the request body from a file.
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
    /// Validate the configuration and open its tile store.
    CheckConfig {
        /// Only validate the configuration document.
        #[arg(long)]
        skip_store: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Import {
            network,
            output,
            tile_size,
        } => import::run(
            &import::ImportArgs {
                network,
                output,
                tile_size,
                config: cli.config,
            },
            cli.format,
        ),
        Command::Request {
            target,
            method,
            body,
            body_file,
        } => request::run(&request::RequestArgs {
            config: cli.config.context("--config or WAYSNAP_CONFIG is required")?,
            target,
            method,
            body,
            body_file,
        }),
        Command::CheckConfig { skip_store } => check_config::run(
            &cli.config.context("--config or WAYSNAP_CONFIG is required")?,
            skip_store,
            cli.format,
        ),
    }
}

/// Diagnostics go to stderr so command output stays parseable.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
