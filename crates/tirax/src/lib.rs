//! 🏧 tirax: splits ATM journal tapes ("tiras") into one transcript per terminal.
//!
//! A Diebold tape and an NCR tape go in. For each one, every line is attributed
//! to the terminal whose header last appeared, the runs are collected per
//! terminal, and the result is upserted into a store keyed by terminal id.
//! Reconciliation against the books happens elsewhere. We just sort the paper.

pub mod aggregate;
pub mod app_config;
pub mod backends;
pub mod common;
pub mod extract;
pub mod processor;
pub mod summary;

mod progress;

use anyhow::{Result, anyhow};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressDrawTarget};
use tracing::{info, warn};

use crate::app_config::AppConfig;
use crate::backends::{SinkBackend, UpsertSink};
use crate::processor::{FailureKind, ReportFailure, process_and_store};
use crate::summary::{ReportSummary, RunSummary};

/// 🚀 Process every configured tape against the configured store.
///
/// Tapes run concurrently and independently: one failing never stops another.
/// Only "there is nothing to do" is an error for the run as a whole.
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    if app_config.reports.is_empty() {
        anyhow::bail!(
            "💀 No tapes to process. Pass the Diebold and NCR report paths, \
             or add [[reports]] entries to the config."
        );
    }

    match SinkBackend::from_config(&app_config.sink_config).await {
        Ok(sink) => Ok(run_with_sink(&app_config, sink).await),
        Err(err) => {
            // -- no store, no writes: every tape gets the same bad news
            warn!("💀 the store could not be reached: {err:#}");
            let reports = app_config
                .reports
                .iter()
                .map(|report| ReportSummary {
                    vendor: report.vendor,
                    result: Err(ReportFailure::new(
                        report.vendor,
                        FailureKind::SinkFailed,
                        anyhow!("{err:#}"),
                    )),
                })
                .collect();
            Ok(RunSummary { reports })
        }
    }
}

/// 🔄 Same as [`run`], with a store you built yourself.
pub async fn run_with_sink(app_config: &AppConfig, sink: SinkBackend) -> RunSummary {
    let runtime = &app_config.runtime;
    // -- 📊 one screen for the whole run: concurrent tapes each get a row in it
    let bars = if runtime.show_progress {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    };
    let bars = &bars;
    let pending = app_config.reports.iter().map(|report| {
        let mut sink = sink.clone();
        async move {
            let result = process_and_store(report, runtime, bars, &mut sink).await;
            if let Err(err) = sink.close().await {
                warn!(vendor = %report.vendor, "⚠️ closing the store handle failed: {err:#}");
            }
            ReportSummary {
                vendor: report.vendor,
                result,
            }
        }
    });

    let reports = join_all(pending).await;
    info!(
        reports = reports.len(),
        failed = reports.iter().filter(|r| r.result.is_err()).count(),
        "🏁 run complete"
    );
    RunSummary { reports }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{ReportConfig, RuntimeConfig, SinkConfig, SourceConfig};
    use crate::backends::FileSourceConfig;
    use crate::backends::in_mem::InMemorySink;
    use crate::common::Vendor;
    use crate::processor::ReportOutcome;

    fn in_memory_report(vendor: Vendor, lines: &[&str]) -> ReportConfig {
        ReportConfig {
            vendor,
            source: SourceConfig::InMemory {
                lines: lines.iter().map(|l| l.to_string()).collect(),
            },
        }
    }

    #[tokio::test]
    async fn the_one_where_one_broken_tape_does_not_sink_the_other() {
        let the_config = AppConfig {
            reports: vec![
                ReportConfig {
                    vendor: Vendor::Diebold,
                    source: SourceConfig::File(FileSourceConfig {
                        file_name: "/definitely/not/here/die.rpt".into(),
                    }),
                },
                in_memory_report(
                    Vendor::Ncr,
                    &["SUC_PTARIO5 03/17/25 05:41 7218 6334", "RETIRO"],
                ),
            ],
            sink_config: SinkConfig::InMemory(()),
            runtime: RuntimeConfig {
                show_progress: false,
            },
        };
        let the_store = InMemorySink::new();

        let the_run = run_with_sink(&the_config, SinkBackend::InMemory(the_store.clone())).await;

        assert!(the_run.has_failures());
        assert!(matches!(
            &the_run.reports[0].result,
            Err(failure) if failure.kind == FailureKind::SourceUnavailable
        ));
        assert!(matches!(
            &the_run.reports[1].result,
            Ok(ReportOutcome::Stored { terminals: 1, .. })
        ));
        assert_eq!(the_store.collection("tira_ncr").await.len(), 1);
        assert!(the_store.collection("tira_diebold").await.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_both_file_tapes_run_together_with_bars_on() {
        let the_dir = tempfile::tempdir().expect("💀 tempdir");
        let die_path = the_dir.path().join("die.rpt");
        let ncr_path = the_dir.path().join("ncr.rpt");
        std::fs::write(&die_path, "MF_PLZESPAN 03/17/25 11:04 7915 7341\nRETIRO\n")
            .expect("💀 write diebold tape");
        std::fs::write(&ncr_path, "SUC_PTARIO5 03/17/25 05:41 7218 6334\nCONSULTA\n")
            .expect("💀 write ncr tape");

        let mut the_config = AppConfig {
            reports: vec![],
            sink_config: SinkConfig::InMemory(()),
            runtime: RuntimeConfig {
                show_progress: true,
            },
        };
        the_config.override_report_file(Vendor::Diebold, die_path.to_string_lossy().into_owned());
        the_config.override_report_file(Vendor::Ncr, ncr_path.to_string_lossy().into_owned());
        let the_store = InMemorySink::new();

        let the_run = run_with_sink(&the_config, SinkBackend::InMemory(the_store.clone())).await;

        assert!(!the_run.has_failures());
        assert_eq!(the_store.collection("tira_diebold").await.len(), 1);
        assert_eq!(the_store.collection("tira_ncr").await.len(), 1);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_config_is_told_so() {
        let the_config = AppConfig {
            reports: vec![],
            sink_config: SinkConfig::InMemory(()),
            runtime: RuntimeConfig::default(),
        };
        assert!(run(the_config).await.is_err());
    }

    #[tokio::test]
    async fn the_one_where_a_tape_without_terminals_is_still_a_success() {
        let the_config = AppConfig {
            reports: vec![in_memory_report(Vendor::Diebold, &["nothing", "to", "see"])],
            sink_config: SinkConfig::InMemory(()),
            runtime: RuntimeConfig {
                show_progress: false,
            },
        };
        let the_run = run(the_config).await.expect("💀 run should complete");
        assert!(!the_run.has_failures());
        assert!(matches!(
            the_run.reports[0].result,
            Ok(ReportOutcome::NoGroups { .. })
        ));
    }
}
