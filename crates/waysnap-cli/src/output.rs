//! Output formats for command results.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary lines.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Render `value` as pretty JSON, or with `text` for the text format.
    pub fn render<T: Serialize>(
        self,
        value: &T,
        text: impl FnOnce(&T) -> String,
    ) -> serde_json::Result<String> {
        match self {
            OutputFormat::Text => Ok(text(value)),
            OutputFormat::Json => serde_json::to_string_pretty(value),
        }
    }
}
