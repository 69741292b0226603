//! 📦 Common data structures: the vocabulary every other module in tirax speaks.
//!
//! 🏧 A tira is a paper-tape-turned-text-file. It mumbles. It repeats itself.
//! It prints the terminal code in three different places depending on its mood.
//! These types are what we carry once the mumbling has been sorted out:
//! which vendor produced the tape, which terminal a line belongs to, and the
//! per-terminal transcript that eventually lands in the store.
//!
//! 🦆

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 🏭 Which ATM vendor printed the tape.
///
/// The vendor never changes how lines are classified. It is a label that rides
/// along for bookkeeping and picks the collection the transcripts are written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Diebold,
    Ncr,
}

impl Vendor {
    /// 🏷️ The lowercase tag, as it appears in configs and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Diebold => "diebold",
            Vendor::Ncr => "ncr",
        }
    }

    /// 🗄️ The logical collection this vendor's transcripts live in.
    pub fn collection_name(&self) -> &'static str {
        match self {
            Vendor::Diebold => "tira_diebold",
            Vendor::Ncr => "tira_ncr",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 🔢 A normalized terminal code: exactly four ASCII digits. No more, no less.
///
/// The only way in is [`TerminalId::parse`], so a `TerminalId` in hand is
/// always well-formed. Partial codes ("9") and fused counters ("01968") are
/// dealt with by the extractor before anything reaches this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TerminalId(String);

impl TerminalId {
    /// Number of digits in a terminal code.
    pub const LEN: usize = 4;

    /// ✅ Accepts exactly four ASCII digits, rejects everything else.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TerminalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        TerminalId::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "💀 '{raw}' is not a terminal code. Terminal codes are exactly four digits."
            ))
        })
    }
}

/// 📜 Terminal → ordered transcript. BTreeMap so output order is stable across runs.
pub type TerminalGroups = BTreeMap<TerminalId, Vec<String>>;

/// 📊 Counters gathered during one streaming pass.
///
/// Nothing here changes the grouping. It exists so a run over a 200MB tape can
/// say more than "done" when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    /// every line read, in or out of a group
    pub total_lines: u64,
    /// lines that named a terminal
    pub identifier_lines: u64,
    /// structural lines whose trailing code was a single digit
    pub deferred_lines: u64,
    /// `**** 1234 ****` style banners
    pub banner_lines: u64,
    /// lines dropped because no terminal was ever recognized after them
    pub unattributed_lines: u64,
}

/// 🧾 The product of processing one report: groups, vendor, and when it happened.
///
/// Built once by the aggregator at end of stream and never mutated afterwards.
/// The sink borrows it; nobody gets `&mut`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportResult {
    pub vendor: Vendor,
    pub processed_at: DateTime<Utc>,
    pub groups: TerminalGroups,
    pub stats: ReportStats,
}

impl ReportResult {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 🗂️ One persisted record per terminal, all sharing the report's timestamp.
    pub fn records(&self) -> impl Iterator<Item = TerminalRecord> + '_ {
        self.groups.iter().map(|(terminal_id, transcript)| TerminalRecord {
            terminal_id: terminal_id.clone(),
            transcript: transcript.clone(),
            processed_at: self.processed_at,
        })
    }
}

/// 🗄️ What a stored transcript looks like.
///
/// Field names follow the documents already living in the `tira_*` collections,
/// so the reconciliation side keeps reading them without a migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalRecord {
    #[serde(rename = "numeroCajero")]
    pub terminal_id: TerminalId,
    #[serde(rename = "tira")]
    pub transcript: Vec<String>,
    #[serde(rename = "fechaProcesamiento")]
    pub processed_at: DateTime<Utc>,
}
