//! # Previously, on tirax...
//!
//! 🎬 Somewhere, a test needed a tape that wasn't on disk and a store that
//! wasn't a database. This module is both. It lives entirely in RAM and is
//! gone the moment you blink.
//!
//! [`InMemorySource`] vends a fixed list of lines, once. [`InMemorySink`] keeps
//! upserted records behind an `Arc<Mutex<..>>` so callers can inspect what
//! arrived after handing the sink off to the processor.
//!
//! ⚠️ This is for tests and dry runs. Not for production. Not for feelings.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{Source, UpsertOutcome, UpsertSink};
use crate::common::{ReportResult, TerminalId, TerminalRecord};

/// 📦 A tape that only exists in memory. Hands out its lines once, in order.
#[derive(Debug, Default)]
pub struct InMemorySource {
    lines: VecDeque<String>,
}

impl InMemorySource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// collection name → terminal → record
pub type InMemoryStore = BTreeMap<String, BTreeMap<TerminalId, TerminalRecord>>;

/// 📦 A store that never forgets, until the process exits.
///
/// Clone-able on purpose: every clone shares the same store, so the test that
/// built the sink can peek inside after the processor is done with it.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    store: Arc<Mutex<InMemoryStore>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔍 A snapshot of one collection.
    pub async fn collection(&self, name: &str) -> BTreeMap<TerminalId, TerminalRecord> {
        self.store.lock().await.get(name).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl UpsertSink for InMemorySink {
    async fn upsert(&mut self, report: &ReportResult) -> Result<UpsertOutcome> {
        let mut store = self.store.lock().await;
        let collection = store
            .entry(report.vendor.collection_name().to_string())
            .or_default();

        let mut outcome = UpsertOutcome::default();
        for record in report.records() {
            match collection.insert(record.terminal_id.clone(), record) {
                Some(_) => outcome.updated += 1,
                None => outcome.created += 1,
            }
        }
        Ok(outcome)
    }

    async fn close(&mut self) -> Result<()> {
        // 🗑️ nothing to flush. we live in RAM.
        Ok(())
    }
}
