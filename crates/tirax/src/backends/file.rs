//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The tape arrives as a `.rpt` file. The transcripts leave as a JSON document
//! store, one file per collection. Both halves live here, each next to its config.

mod file_sink;
mod file_source;

pub use file_sink::{FileSink, FileSinkConfig};
pub use file_source::{FileSource, FileSourceConfig};
