//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Sources pour tape lines in, one at a time. Sinks take a finished report
//! and upsert one transcript per terminal into a store.
//! Everything between the two is pure and lives in `extract` and `aggregate`.
//!
//! 🦆 The duck is here because every file must have one. Do not question the duck.

pub mod source;
pub mod sink;

pub mod elasticsearch;
pub mod file;
pub mod in_mem;

pub use elasticsearch::ElasticsearchSinkConfig;
pub use file::{FileSinkConfig, FileSourceConfig};
pub use sink::{SinkBackend, UpsertOutcome, UpsertSink};
pub use source::{Source, SourceBackend};
