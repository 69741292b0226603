use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::backends::{UpsertOutcome, UpsertSink};
use crate::common::{ReportResult, TerminalId, TerminalRecord};

// -- 🚰 FileSinkConfig: cousin of FileSourceConfig, equally traumatized by disk-full errors.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    /// where the `<collection>.json` files live; created when missing
    pub directory: String,
    /// human-friendly JSON; turn off for very large tapes
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

type Collection = BTreeMap<TerminalId, TerminalRecord>;

/// 🗄️ FileSink: a JSON document store with exactly one trick: upsert.
///
/// Each collection is a single file, `<directory>/<collection>.json`, holding an
/// object keyed by terminal id. An upsert reads the file, replaces or inserts
/// the report's records, writes the whole thing to a temp file and renames it
/// over the original. A crash mid-write leaves the previous file intact.
///
/// ⚠️ Clones share one lock, so two reports writing the same collection from
/// this process take turns instead of clobbering each other's read-modify-write.
#[derive(Debug, Clone)]
pub struct FileSink {
    sink_config: FileSinkConfig,
    write_lock: Arc<Mutex<()>>,
}

impl FileSink {
    pub fn new(sink_config: FileSinkConfig) -> Self {
        Self {
            sink_config,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn collection_path(&self, collection: &str) -> PathBuf {
        Path::new(&self.sink_config.directory).join(format!("{collection}.json"))
    }

    async fn load(path: &Path) -> Result<Collection> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Collection::new()),
            Ok(contents) => serde_json::from_str(&contents).context(format!(
                "💀 '{}' exists but is not a tira collection we can read. \
                 Someone edited it by hand, or something much worse happened.",
                path.display()
            )),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Collection::new()),
            Err(err) => Err(err).context(format!("💀 could not read collection '{}'", path.display())),
        }
    }

    async fn store(&self, path: &Path, collection: &Collection) -> Result<()> {
        let payload = if self.sink_config.pretty {
            serde_json::to_vec_pretty(collection)
        } else {
            serde_json::to_vec(collection)
        }
        .context("💀 the collection refused to become JSON")?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &payload).await.context(format!(
            "💀 writing '{}' failed. The previous collection file is untouched.",
            temp_path.display()
        ))?;
        tokio::fs::rename(&temp_path, path).await.context(format!(
            "💀 could not move '{}' into place at '{}'",
            temp_path.display(),
            path.display()
        ))?;
        trace!(path = %path.display(), bytes = payload.len(), "💾 collection written");
        Ok(())
    }
}

#[async_trait]
impl UpsertSink for FileSink {
    async fn upsert(&mut self, report: &ReportResult) -> Result<UpsertOutcome> {
        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.sink_config.directory)
            .await
            .context(format!(
                "💀 the store directory '{}' could not be created",
                self.sink_config.directory
            ))?;

        let path = self.collection_path(report.vendor.collection_name());
        let mut collection = Self::load(&path).await?;

        let mut outcome = UpsertOutcome::default();
        for record in report.records() {
            match collection.insert(record.terminal_id.clone(), record) {
                Some(_) => outcome.updated += 1,
                None => outcome.created += 1,
            }
        }

        self.store(&path, &collection).await?;
        debug!(
            path = %path.display(),
            created = outcome.created,
            updated = outcome.updated,
            "🗄️ file collection upserted"
        );
        Ok(outcome)
    }

    async fn close(&mut self) -> Result<()> {
        // -- every upsert already landed on disk with its rename
        Ok(())
    }
}
