//! 🍽️ The end-of-run table: one row per tape, so nobody has to grep the logs
//! to find out whether the NCR file made it.

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};

use crate::common::Vendor;
use crate::processor::{ReportFailure, ReportOutcome};

/// 🧾 How one report went.
#[derive(Debug)]
pub struct ReportSummary {
    pub vendor: Vendor,
    pub result: Result<ReportOutcome, ReportFailure>,
}

/// 📋 Every report of one run, in configuration order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<ReportSummary>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| r.result.is_err())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportFailure> {
        self.reports.iter().filter_map(|r| r.result.as_ref().err())
    }

    /// 🎨 vendor | outcome | lines | terminals | created | updated
    pub fn render_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["vendor", "outcome", "lines", "terminals", "created", "updated"]);

        for report in &self.reports {
            let numbers = |values: [String; 4]| {
                values.map(|v| Cell::new(v).set_alignment(CellAlignment::Right))
            };
            let row = match &report.result {
                Ok(ReportOutcome::Stored {
                    terminals,
                    upsert,
                    stats,
                }) => {
                    let [lines, terminals, created, updated] = numbers([
                        stats.total_lines.to_string(),
                        terminals.to_string(),
                        upsert.created.to_string(),
                        upsert.updated.to_string(),
                    ]);
                    vec![Cell::new(report.vendor), Cell::new("✅ stored"), lines, terminals, created, updated]
                }
                Ok(ReportOutcome::NoGroups { stats }) => {
                    let [lines, terminals, created, updated] = numbers([
                        stats.total_lines.to_string(),
                        "0".into(),
                        "0".into(),
                        "0".into(),
                    ]);
                    vec![Cell::new(report.vendor), Cell::new("🤷 no terminals"), lines, terminals, created, updated]
                }
                Err(failure) => vec![
                    Cell::new(report.vendor),
                    Cell::new(format!("💀 {}", failure.kind)),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                ],
            };
            table.add_row(row);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::UpsertOutcome;
    use crate::common::ReportStats;
    use crate::processor::FailureKind;

    fn a_mixed_run() -> RunSummary {
        RunSummary {
            reports: vec![
                ReportSummary {
                    vendor: Vendor::Diebold,
                    result: Ok(ReportOutcome::Stored {
                        terminals: 12,
                        upsert: UpsertOutcome {
                            created: 5,
                            updated: 7,
                        },
                        stats: ReportStats {
                            total_lines: 4321,
                            ..ReportStats::default()
                        },
                    }),
                },
                ReportSummary {
                    vendor: Vendor::Ncr,
                    result: Err(ReportFailure::new(
                        Vendor::Ncr,
                        FailureKind::SourceUnavailable,
                        anyhow::anyhow!("no such file"),
                    )),
                },
            ],
        }
    }

    #[test]
    fn the_one_where_the_table_tells_the_whole_story() {
        let the_run = a_mixed_run();
        let the_rendered = the_run.render_table().to_string();

        assert!(the_rendered.contains("diebold"));
        assert!(the_rendered.contains("4321"));
        assert!(the_rendered.contains("ncr"));
        assert!(the_rendered.contains("source unavailable"));
    }

    #[test]
    fn the_one_where_one_failure_is_enough_to_notice() {
        let the_run = a_mixed_run();
        assert!(the_run.has_failures());
        assert_eq!(the_run.failures().count(), 1);
        assert!(!RunSummary::default().has_failures());
    }
}
