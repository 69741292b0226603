use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::app_config::SinkConfig;
use crate::backends::{elasticsearch, file, in_mem};
use crate::common::ReportResult;

/// 📊 What one report's upsert did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    /// terminals the collection had never seen
    pub created: u64,
    /// terminals whose transcript was replaced
    pub updated: u64,
}

/// 🕳️ A store that takes a finished report and insert-or-replaces one record per terminal.
///
/// # Contract 📜
/// - `upsert` writes every group of the report, keyed by terminal id inside the
///   vendor's collection, stamped with the report's `processed_at`.
/// - Writing the same report twice is harmless: the second pass only updates.
/// - No retries in here. A failure goes straight back to the caller.
/// - `close` releases whatever the backend holds. Call it. Always.
#[async_trait]
pub trait UpsertSink: std::fmt::Debug + Send {
    async fn upsert(&mut self, report: &ReportResult) -> Result<UpsertOutcome>;
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Sink.
///
/// Clone-able so every report in a run can hold its own handle to the same
/// configured store. Serializing concurrent writes to one key is the store's job.
#[derive(Debug, Clone)]
pub enum SinkBackend {
    InMemory(in_mem::InMemorySink),
    File(file::FileSink),
    Elasticsearch(elasticsearch::ElasticsearchSink),
}

impl SinkBackend {
    pub async fn from_config(config: &SinkConfig) -> Result<Self> {
        match config {
            SinkConfig::InMemory(()) => Ok(SinkBackend::InMemory(in_mem::InMemorySink::new())),
            SinkConfig::File(file_config) => {
                Ok(SinkBackend::File(file::FileSink::new(file_config.clone())))
            }
            SinkConfig::Elasticsearch(es_config) => Ok(SinkBackend::Elasticsearch(
                elasticsearch::ElasticsearchSink::new(es_config.clone()).await?,
            )),
        }
    }
}

#[async_trait]
impl UpsertSink for SinkBackend {
    async fn upsert(&mut self, report: &ReportResult) -> Result<UpsertOutcome> {
        match self {
            SinkBackend::InMemory(sink) => sink.upsert(report).await,
            SinkBackend::File(sink) => sink.upsert(report).await,
            SinkBackend::Elasticsearch(sink) => sink.upsert(report).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::File(sink) => sink.close().await,
            SinkBackend::Elasticsearch(sink) => sink.close().await,
        }
    }
}
