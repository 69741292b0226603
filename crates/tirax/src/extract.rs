//! 🔍 Terminal-ID extraction: squinting at one line of tape and deciding whose it is.
//!
//! 🎬 *[a single line scrolls past: `MF_PLZESPAN 03/17/25 11:04 7915 7341`]*
//! *["which of those numbers is the ATM?" asks the intern. "the second one," says the tape.]*
//! *["usually," adds the tape, under its breath.]*
//!
//! The tapes print a header line per transaction: an uppercase location token,
//! a date, a time, and then one or two numbers. Sometimes the second number is
//! the terminal. Sometimes it got chopped to one digit. Sometimes the counter and
//! the terminal code were printed with no space between them. This module turns
//! that folklore into an ordered table of named rules. First rule with an opinion wins.
//!
//! ```text
//!  line ──▶ LineShape ──▶ [SecondTokenIsTerminal]
//!                         [SecondTokenIncomplete]   first Some(..) wins
//!                         [FusedCounterSuffix   ]──────────────────────▶ Extraction
//!                         [FirstTokenIsTerminal ]
//!                         [BannerSuppressed     ]
//! ```
//!
//! Pure. Total. No state, no I/O, no panics on weird input.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::common::{TerminalId, Vendor};

lazy_static! {
    // -- 🏧 `<TOKEN[digits]> MM/DD/YY HH:MM <n> [<n>]`, anywhere in the line.
    // -- ASCII digits only: the printers never learned about unicode and neither shall we.
    // -- 🐛 expect is fine here: the pattern is a literal and covered by every test below.
    static ref STRUCTURAL_LINE: Regex = Regex::new(
        r"[A-Z_]+[0-9]*\s+[0-9]{2}/[0-9]{2}/[0-9]{2}\s+[0-9]{2}:[0-9]{2}\s+([0-9]+)\s*([0-9]*)"
    )
    .expect("💀 structural tira pattern failed to compile");

    // -- ⭐ `**** 1234 ****` is a banner, not a terminal, no matter how numeric it looks.
    static ref BANNER_LINE: Regex =
        Regex::new(r"\*+\s+[0-9]+\s+\*+").expect("💀 banner tira pattern failed to compile");
}

/// 📐 The parsed shape of a line, before any rule has had its say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineShape<'a> {
    /// header line; `second` is `None` when nothing followed the first number
    Structural { first: &'a str, second: Option<&'a str> },
    Banner,
    Other,
}

impl<'a> LineShape<'a> {
    pub(crate) fn of(line: &'a str) -> Self {
        if let Some(captures) = STRUCTURAL_LINE.captures(line) {
            // -- group 1 is `[0-9]+`, so it always participates. Group 2 may be empty.
            let first = captures.get(1).map_or("", |m| m.as_str());
            let second = captures
                .get(2)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty());
            return LineShape::Structural { first, second };
        }
        if BANNER_LINE.is_match(line) {
            return LineShape::Banner;
        }
        LineShape::Other
    }
}

/// 📜 The named rules, in the order they are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionRule {
    /// `... 7915 7341` → the second four-digit number is the terminal
    SecondTokenIsTerminal,
    /// `... 7218 6` → the code got cut to one digit; say nothing, let context decide
    SecondTokenIncomplete,
    /// `... 01968` → counter and code fused; the last four digits are the terminal
    FusedCounterSuffix,
    /// `... 7218` → the lone four-digit number is the terminal
    FirstTokenIsTerminal,
    /// `**** 1234 ****` → never a terminal
    BannerSuppressed,
}

/// What a rule decided, when it decided anything.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleVerdict {
    Terminal(TerminalId),
    NoTerminal,
}

impl ExtractionRule {
    /// Precedence order. Reorder this and the tests will have words with you.
    pub const ORDERED: [ExtractionRule; 5] = [
        ExtractionRule::SecondTokenIsTerminal,
        ExtractionRule::SecondTokenIncomplete,
        ExtractionRule::FusedCounterSuffix,
        ExtractionRule::FirstTokenIsTerminal,
        ExtractionRule::BannerSuppressed,
    ];

    /// `None` means "no opinion, ask the next rule".
    fn apply(self, shape: &LineShape<'_>) -> Option<RuleVerdict> {
        match (self, shape) {
            (ExtractionRule::SecondTokenIsTerminal, LineShape::Structural { second: Some(second), .. })
                if second.len() == TerminalId::LEN =>
            {
                TerminalId::parse(second).map(RuleVerdict::Terminal)
            }
            (ExtractionRule::SecondTokenIncomplete, LineShape::Structural { second: Some(second), .. })
                if second.len() == 1 =>
            {
                Some(RuleVerdict::NoTerminal)
            }
            (ExtractionRule::FusedCounterSuffix, LineShape::Structural { first, .. })
                if first.len() > TerminalId::LEN =>
            {
                // -- all ASCII digits, so slicing on bytes is slicing on chars
                first
                    .get(first.len() - TerminalId::LEN..)
                    .and_then(TerminalId::parse)
                    .map(RuleVerdict::Terminal)
            }
            (ExtractionRule::FirstTokenIsTerminal, LineShape::Structural { first, .. })
                if first.len() == TerminalId::LEN =>
            {
                TerminalId::parse(first).map(RuleVerdict::Terminal)
            }
            (ExtractionRule::BannerSuppressed, LineShape::Banner) => Some(RuleVerdict::NoTerminal),
            _ => None,
        }
    }
}

/// 🎯 The full story of one line: which rule spoke, and what it said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// a rule named the terminal
    Found(TerminalId, ExtractionRule),
    /// a rule matched and explicitly declined to name one
    Withheld(ExtractionRule),
    /// nothing recognized the line at all
    Unrecognized,
}

impl Extraction {
    pub fn terminal_id(&self) -> Option<&TerminalId> {
        match self {
            Extraction::Found(terminal_id, _) => Some(terminal_id),
            _ => None,
        }
    }

    pub fn into_terminal_id(self) -> Option<TerminalId> {
        match self {
            Extraction::Found(terminal_id, _) => Some(terminal_id),
            _ => None,
        }
    }
}

/// 🔍 Classify one line. The vendor is carried for the logs; both vendors share the rules.
pub fn classify_line(line: &str, vendor: Vendor) -> Extraction {
    let shape = LineShape::of(line);
    let extraction = ExtractionRule::ORDERED
        .iter()
        .find_map(|rule| {
            rule.apply(&shape).map(|verdict| match verdict {
                RuleVerdict::Terminal(terminal_id) => Extraction::Found(terminal_id, *rule),
                RuleVerdict::NoTerminal => Extraction::Withheld(*rule),
            })
        })
        .unwrap_or(Extraction::Unrecognized);

    trace!(%vendor, ?extraction, "🔍 classified tape line");
    extraction
}

/// 🏧 Line in, terminal code out (maybe). The `Option` view of [`classify_line`].
pub fn extract_terminal_id(line: &str, vendor: Vendor) -> Option<TerminalId> {
    classify_line(line, vendor).into_terminal_id()
}
