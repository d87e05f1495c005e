use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use kstreams::StreamsConfig;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "kstreams", about = "Inspect stream and table views built by the stream factory")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the configured views, print statistics and tear everything down
    Inspect(InspectArgs),
}

#[derive(Args, Clone, Debug)]
pub struct InspectArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "kstreams.toml", env = "KSTREAMS_CONFIG")]
    pub config: String,

    /// Skip probing the storage implementation
    #[arg(long)]
    pub skip_storage_check: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub streams: StreamsConfig,
    /// Options handed to every storage instance.
    #[serde(default)]
    pub storage: Option<serde_json::Value>,
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Stream,
    Table,
}

#[derive(Debug, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    #[serde(default = "default_view")]
    pub view: ViewKind,
    /// Value field used as table key; the record key is used when absent.
    #[serde(default)]
    pub key_field: Option<String>,
    /// Records produced to the topic before the views are opened.
    #[serde(default)]
    pub records: Vec<SeedRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRecord {
    #[serde(default)]
    pub key: Option<String>,
    pub value: serde_json::Value,
}

fn default_view() -> ViewKind {
    ViewKind::Stream
}

impl FileConfig {
    pub fn load(path: &str) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|detail| CliError::Config { context: "parse", detail: format!("'{path}': {detail}") })
    }

    pub fn parse(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| e.to_string())
    }
}
