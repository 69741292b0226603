//! 🧺 The Grouping Aggregator: a reducer that sorts a tape into per-terminal piles.
//!
//! Lines arrive in order. Each one is classified; a newly recognized terminal
//! closes the current run and files it under the previous terminal. Everything
//! else (headers included) joins the open run. At end of stream the last run is
//! filed too. Same terminal showing up again later? Its runs are concatenated.
//!
//! ```text
//!   A-hdr  x  x  x  B-hdr  y  A-hdr  z  <eof>
//!   └──── run(A) ──┘└─run(B)┘└─run(A)─┘
//!   groups = { A: [A-hdr x x x A-hdr z], B: [B-hdr y] }
//! ```
//!
//! ⚠️ All state lives in the value. No statics, no globals, no closures capturing
//! accumulators. Two aggregators never know about each other.

use chrono::Utc;
use tracing::{debug, warn};

use crate::common::{ReportResult, ReportStats, TerminalGroups, TerminalId, Vendor};
use crate::extract::{Extraction, ExtractionRule, classify_line};

/// 🧺 Per-report grouping state. Feed it with [`push_line`], seal it with [`finish`].
///
/// [`push_line`]: GroupingAggregator::push_line
/// [`finish`]: GroupingAggregator::finish
#[derive(Debug)]
pub struct GroupingAggregator {
    vendor: Vendor,
    current_terminal: Option<TerminalId>,
    current_run: Vec<String>,
    groups: TerminalGroups,
    stats: ReportStats,
}

impl GroupingAggregator {
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            current_terminal: None,
            current_run: Vec::new(),
            groups: TerminalGroups::new(),
            stats: ReportStats::default(),
        }
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// The terminal the open run currently belongs to, if one has been seen.
    pub fn current_terminal(&self) -> Option<&TerminalId> {
        self.current_terminal.as_ref()
    }

    /// 📥 Consume one line in arrival order.
    pub fn push_line(&mut self, line: String) {
        self.stats.total_lines += 1;

        match classify_line(&line, self.vendor) {
            Extraction::Found(terminal_id, _) => {
                self.stats.identifier_lines += 1;
                self.switch_to(terminal_id);
            }
            Extraction::Withheld(ExtractionRule::SecondTokenIncomplete) => {
                // -- 🐛 the code was cut to one digit. Nothing resolves it from neighbours
                // -- yet, so the line simply stays with whatever terminal is current.
                self.stats.deferred_lines += 1;
                debug!(
                    vendor = %self.vendor,
                    current = ?self.current_terminal,
                    line = %line,
                    "⏸️ incomplete terminal code, keeping the current terminal"
                );
            }
            Extraction::Withheld(_) => {
                self.stats.banner_lines += 1;
            }
            Extraction::Unrecognized => {}
        }

        self.current_run.push(line);
    }

    /// 🔀 A terminal was recognized. Different from the current one? File the run.
    fn switch_to(&mut self, terminal_id: TerminalId) {
        match self.current_terminal.take() {
            Some(previous) if previous != terminal_id => {
                self.flush_run(previous);
            }
            Some(_) | None => {
                // -- same terminal continues, or the very first terminal claims any
                // -- lines that were waiting in the open run
            }
        }
        self.current_terminal = Some(terminal_id);
    }

    fn flush_run(&mut self, terminal_id: TerminalId) {
        let run = std::mem::take(&mut self.current_run);
        debug!(
            vendor = %self.vendor,
            terminal = %terminal_id,
            lines = run.len(),
            "📦 filing run"
        );
        self.groups.entry(terminal_id).or_default().extend(run);
    }

    /// 🏁 End of stream: file the last run and hand over the finished result.
    ///
    /// Consumes the aggregator, so a sealed report cannot be fed again.
    pub fn finish(mut self) -> ReportResult {
        match self.current_terminal.take() {
            Some(terminal_id) if !self.current_run.is_empty() => self.flush_run(terminal_id),
            Some(_) => {}
            None => {
                // -- never saw a terminal: whatever is in the open run has nowhere to go
                let dropped = self.current_run.len() as u64;
                if dropped > 0 {
                    warn!(
                        vendor = %self.vendor,
                        dropped,
                        "🗑️ no terminal code ever appeared, discarding unattributed lines"
                    );
                }
                self.stats.unattributed_lines = dropped;
                self.current_run.clear();
            }
        }

        ReportResult {
            vendor: self.vendor,
            processed_at: Utc::now(),
            groups: self.groups,
            stats: self.stats,
        }
    }
}

/// 🧪 Convenience: aggregate an in-memory sequence of lines in one call.
pub fn group_lines<I, S>(vendor: Vendor, lines: I) -> ReportResult
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut aggregator = GroupingAggregator::new(vendor);
    for line in lines {
        aggregator.push_line(line.into());
    }
    aggregator.finish()
}
