//! 🎬 The Report Processor: one tape in, one upsert out.
//!
//! ```text
//!   SourceConfig ──open──▶ Source ──next_line()──▶ GroupingAggregator ──finish()──▶ ReportResult
//!                                                                                     │
//!                                                            UpsertSink::upsert ◀─────┘
//! ```
//!
//! Every failure is labelled with the step that produced it, so the run summary
//! can tell "the file wasn't there" from "the disk hiccuped at line 40,000" from
//! "the store said no". Anything that fails before the upsert leaves the store
//! untouched: the partial groups live only in this future and die with it.

use std::fmt;

use anyhow::Result;
use indicatif::MultiProgress;
use tracing::{info, warn};

use crate::aggregate::GroupingAggregator;
use crate::app_config::{ReportConfig, RuntimeConfig};
use crate::backends::{Source, SourceBackend, UpsertOutcome, UpsertSink};
use crate::common::{ReportResult, ReportStats, Vendor};

/// 🏁 How a report ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// groups were found and written
    Stored {
        terminals: usize,
        upsert: UpsertOutcome,
        stats: ReportStats,
    },
    /// the tape named no terminal at all; nothing was written, and that's fine
    NoGroups { stats: ReportStats },
}

impl ReportOutcome {
    pub fn stats(&self) -> &ReportStats {
        match self {
            ReportOutcome::Stored { stats, .. } | ReportOutcome::NoGroups { stats } => stats,
        }
    }
}

/// 🏷️ Which step broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// the tape could not be opened
    SourceUnavailable,
    /// reading failed part-way; the partial groups were discarded
    ReadFailed,
    /// the store rejected the write (or could not be reached)
    SinkFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::SourceUnavailable => "source unavailable",
            FailureKind::ReadFailed => "read failed",
            FailureKind::SinkFailed => "sink failed",
        })
    }
}

/// 💀 A report that did not make it, with the full anyhow chain attached.
#[derive(Debug)]
pub struct ReportFailure {
    pub vendor: Vendor,
    pub kind: FailureKind,
    pub error: anyhow::Error,
}

impl ReportFailure {
    pub fn new(vendor: Vendor, kind: FailureKind, error: anyhow::Error) -> Self {
        Self {
            vendor,
            kind,
            error,
        }
    }
}

impl fmt::Display for ReportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} report failed ({}): {:#}", self.vendor, self.kind, self.error)
    }
}

impl std::error::Error for ReportFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.error)
    }
}

/// 📼 Drive a source through a fresh aggregator, start to end of stream.
///
/// A read error aborts the pass and the aggregator is dropped with it.
pub async fn process_report<S>(source: &mut S, vendor: Vendor) -> Result<ReportResult>
where
    S: Source + ?Sized,
{
    let mut aggregator = GroupingAggregator::new(vendor);
    while let Some(line) = source.next_line().await? {
        aggregator.push_line(line);
    }
    source.finish();

    let report = aggregator.finish();
    info!(
        %vendor,
        lines = report.stats.total_lines,
        terminals = report.groups.len(),
        deferred = report.stats.deferred_lines,
        "📼 tape grouped"
    );
    if report.stats.deferred_lines > 0 {
        warn!(
            %vendor,
            deferred = report.stats.deferred_lines,
            "⏸️ some headers carried a one-digit terminal code and stayed with the previous terminal"
        );
    }
    Ok(report)
}

/// 🗄️ Write a finished report, unless it has nothing in it.
pub async fn store_report<K>(report: &ReportResult, sink: &mut K) -> Result<ReportOutcome>
where
    K: UpsertSink + ?Sized,
{
    if report.is_empty() {
        info!(vendor = %report.vendor, "🤷 no terminal transcripts found in the {} tape", report.vendor);
        return Ok(ReportOutcome::NoGroups {
            stats: report.stats,
        });
    }

    let upsert = sink.upsert(report).await?;
    info!(
        vendor = %report.vendor,
        created = upsert.created,
        updated = upsert.updated,
        "✅ {}: {} transcripts created, {} updated",
        report.vendor,
        upsert.created,
        upsert.updated
    );
    Ok(ReportOutcome::Stored {
        terminals: report.groups.len(),
        upsert,
        stats: report.stats,
    })
}

/// 🔄 An already-open source, all the way to the store.
pub async fn process_and_store_source<S, K>(
    source: &mut S,
    vendor: Vendor,
    sink: &mut K,
) -> Result<ReportOutcome, ReportFailure>
where
    S: Source + ?Sized,
    K: UpsertSink + ?Sized,
{
    let report = process_report(source, vendor)
        .await
        .map_err(|err| ReportFailure::new(vendor, FailureKind::ReadFailed, err))?;
    store_report(&report, sink)
        .await
        .map_err(|err| ReportFailure::new(vendor, FailureKind::SinkFailed, err))
}

/// 🚀 The whole thing for one configured report: open, group, store.
///
/// `bars` is shared by every report of a run; each file tape adds its own row.
pub async fn process_and_store<K>(
    report_config: &ReportConfig,
    runtime: &RuntimeConfig,
    bars: &MultiProgress,
    sink: &mut K,
) -> Result<ReportOutcome, ReportFailure>
where
    K: UpsertSink + ?Sized,
{
    let vendor = report_config.vendor;
    info!(%vendor, "📼 processing {} tape", vendor);

    let mut source = SourceBackend::from_config(&report_config.source, vendor, runtime, bars)
        .await
        .map_err(|err| ReportFailure::new(vendor, FailureKind::SourceUnavailable, err))?;

    process_and_store_source(&mut source, vendor, sink).await
}
