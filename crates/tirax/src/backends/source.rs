use anyhow::Result;
use async_trait::async_trait;
use indicatif::MultiProgress;

use crate::app_config::{RuntimeConfig, SourceConfig};
use crate::backends::{file, in_mem};
use crate::common::Vendor;

/// 🚰 A lazy, single-pass stream of tape lines.
///
/// # Contract 📜
/// - `next_line` yields lines in file order, without their line terminator.
/// - `Ok(None)` = end of stream. Calling again after that keeps returning `None`.
/// - `Err(..)` = the read failed mid-stream. The caller throws away everything it built.
/// - Not restartable. Want the tape again? Open a new source.
#[async_trait]
pub trait Source: std::fmt::Debug + Send {
    /// 📄 The next line, or `None` when the tape runs out.
    async fn next_line(&mut self) -> Result<Option<String>>;

    /// 🏁 Called once the stream has been fully drained. Default: nothing to do.
    fn finish(&mut self) {}
}

/// 🎭 The many faces of a Source, dispatched by match.
#[derive(Debug)]
pub enum SourceBackend {
    InMemory(in_mem::InMemorySource),
    File(file::FileSource),
}

impl SourceBackend {
    /// 🔧 Open whatever the config points at. Fails here, before a single line is read,
    /// when the file is missing or unreadable. File tapes draw their bar into `bars`
    /// unless `runtime.show_progress` is off.
    pub async fn from_config(
        config: &SourceConfig,
        vendor: Vendor,
        runtime: &RuntimeConfig,
        bars: &MultiProgress,
    ) -> Result<Self> {
        match config {
            SourceConfig::InMemory { lines } => Ok(SourceBackend::InMemory(
                in_mem::InMemorySource::new(lines.clone()),
            )),
            SourceConfig::File(file_config) => Ok(SourceBackend::File(
                file::FileSource::new(
                    file_config.clone(),
                    vendor,
                    runtime.show_progress.then_some(bars),
                )
                .await?,
            )),
        }
    }
}

#[async_trait]
impl Source for SourceBackend {
    async fn next_line(&mut self) -> Result<Option<String>> {
        match self {
            SourceBackend::InMemory(source) => source.next_line().await,
            SourceBackend::File(source) => source.next_line().await,
        }
    }

    fn finish(&mut self) {
        match self {
            SourceBackend::InMemory(source) => source.finish(),
            SourceBackend::File(source) => source.finish(),
        }
    }
}
