//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: we looked everywhere. Under the couch. Behind the fridge." 🦆
//!
//! 🏗️ Powered by Figment: `TIRAX_*` environment variables first, then an optional
//! TOML file layered on top. The file wins on conflicts.
//!
//! ```toml
//! [[reports]]
//! vendor = "diebold"
//! [reports.source.File]
//! file_name = "pull-tira/sbmdebst10_auth_tira_die031725.rpt"
//!
//! [[reports]]
//! vendor = "ncr"
//! [reports.source.File]
//! file_name = "pull-tira/sbmdebst10_auth_tira_ncr031725.rpt"
//!
//! [sink_config.File]
//! directory = "store"
//! ```

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{ElasticsearchSinkConfig, FileSinkConfig, FileSourceConfig};
use crate::common::Vendor;

/// 📦 Everything a run needs to know about itself.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// one entry per tape; usually one Diebold and one NCR
    #[serde(default)]
    pub reports: Vec<ReportConfig>,
    pub sink_config: SinkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 📼 One tape to process: who printed it, and where to read it from.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub vendor: Vendor,
    pub source: SourceConfig,
}

/// 🚰 Where lines come from.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    File(FileSourceConfig),
    /// lines inline in the config; handy for smoke tests
    InMemory { lines: Vec<String> },
}

/// 🕳️ Where transcripts go.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    InMemory(()),
    File(FileSinkConfig),
    Elasticsearch(ElasticsearchSinkConfig),
}

/// 🎛️ Knobs that don't belong to any one backend.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// draw a progress bar per file tape
    #[serde(default = "default_show_progress", alias = "progress")]
    pub show_progress: bool,
}

fn default_show_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_progress: default_show_progress(),
        }
    }
}

impl AppConfig {
    /// 🔁 Replace the configured tape for `vendor` with a file path, or add one.
    /// This is how positional CLI paths win over whatever the TOML said.
    pub fn override_report_file(&mut self, vendor: Vendor, file_name: String) {
        let source = SourceConfig::File(FileSourceConfig { file_name });
        match self.reports.iter_mut().find(|r| r.vendor == vendor) {
            Some(report) => report.source = source,
            None => self.reports.push(ReportConfig { vendor, source }),
        }
    }
}

/// 🚀 Load the config from `TIRAX_*` env vars plus an optional TOML file.
///
/// - `None` → env vars only.
/// - `Some(path)` → env vars + TOML, merged. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("TIRAX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (TIRAX_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (TIRAX_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}
