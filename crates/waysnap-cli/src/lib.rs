//! waysnap CLI library.
//!
//! Subcommand implementations and output formatting for `waysnap-cli`. The
//! binary only parses arguments and dispatches here.

pub mod commands;
pub mod output;
