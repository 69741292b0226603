//! 📊 progress.rs: "how far into the tape are we?"
//!
//! A journal file can run to hundreds of megabytes of near-identical receipts.
//! This module draws a progress bar over the bytes read and keeps a running
//! line count in the message, so the operator can tell "slow" from "stuck".
//!
//! ⚠️ Watching the bar will not make it go faster. We checked.

use std::time::Instant;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

// -- 📏 one mebibyte. not a megabyte. there is a difference and we will die on this hill.
const MIB: u64 = 1024 * 1024;

/// 📦 Bytes scaled to something a human can read at a glance.
fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// 📊 Progress over one report: bytes consumed, lines consumed, time spent.
pub(crate) struct ReadProgress {
    /// 🏷️ shown in front of the bar, usually `vendor:path`
    label: String,
    total_bytes: u64,
    total_lines: u64,
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl std::fmt::Debug for ReadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and does not derive Debug
        f.debug_struct("ReadProgress")
            .field("label", &self.label)
            .field("total_bytes", &self.total_bytes)
            .field("total_lines", &self.total_lines)
            .finish()
    }
}

impl ReadProgress {
    /// 🚀 A visible bar sized to `expected_bytes` (0 = unknown), drawn as one row of `bars`.
    ///
    /// Both tapes are read at once, so every bar of a run must live in the same
    /// [`MultiProgress`] or they scribble over each other's lines.
    pub(crate) fn new(label: String, expected_bytes: u64, bars: &MultiProgress) -> Self {
        let progress_bar = bars.add(ProgressBar::new(expected_bytes));
        // -- the template is a literal; with_template only fails on malformed templates
        if let Ok(style) = ProgressStyle::with_template("{msg}\n| [{bar:40.cyan/blue}] {percent}%") {
            progress_bar.set_style(style.progress_chars("=>-"));
        }
        Self::with_bar(label, progress_bar)
    }

    /// 🙈 Same bookkeeping, nothing drawn. For tests, CI, and people who hate bars.
    pub(crate) fn hidden(label: String) -> Self {
        Self::with_bar(label, ProgressBar::hidden())
    }

    fn with_bar(label: String, progress_bar: ProgressBar) -> Self {
        Self {
            label,
            total_bytes: 0,
            total_lines: 0,
            progress_bar,
            start_time: Instant::now(),
        }
    }

    /// 🔄 Account for one more line of `bytes_read` bytes.
    pub(crate) fn record_line(&mut self, bytes_read: u64) {
        self.total_bytes += bytes_read;
        self.total_lines += 1;
        // -- redrawing per line is wasteful; every 4096 lines is plenty for a human
        if self.total_lines % 4096 == 0 {
            self.redraw();
        }
    }

    fn redraw(&self) {
        self.progress_bar.set_position(self.total_bytes);
        self.progress_bar.set_message(format!(
            "📼 {} | {} | {} lines",
            self.label,
            format_bytes(self.total_bytes),
            format_number(self.total_lines)
        ));
    }

    /// ✅ Final redraw, then leave the bar on screen with the elapsed time.
    pub(crate) fn finish(&self) {
        self.redraw();
        let elapsed = self.start_time.elapsed();
        self.progress_bar.finish_with_message(format!(
            "✅ {} | {} | {} lines | {:.1}s",
            self.label,
            format_bytes(self.total_bytes),
            format_number(self.total_lines),
            elapsed.as_secs_f64()
        ));
    }

    /// 💀 The read broke part-way. Leave the bar where it stopped, marked as such.
    pub(crate) fn abandon(&self) {
        self.progress_bar.set_position(self.total_bytes);
        self.progress_bar.abandon_with_message(format!(
            "💀 {} | stopped after {} | {} lines",
            self.label,
            format_bytes(self.total_bytes),
            format_number(self.total_lines)
        ));
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.progress_bar.is_finished()
    }
}
