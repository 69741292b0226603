use std::collections::VecDeque;

use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::MultiProgress;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt},
};
use tracing::trace;

use crate::backends::Source;
use crate::common::Vendor;
use crate::progress::ReadProgress;

// -- 📂 FileSourceConfig: "it's just a file", said no sysadmin ever before the disk filled up.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FileSourceConfig {
    pub file_name: String,
}

/// 📂 FileSource: reads a tape file line by line, as lazily as it can get away with.
///
/// Line endings: `\n`, `\r\n` and a lone `\r` all end a line, and none of them
/// make it into the line itself. Bytes that are not valid UTF-8 are replaced
/// with U+FFFD instead of failing the pass; old journal printers have opinions
/// about encodings and we do not want to hear them.
pub struct FileSource {
    buf_reader: io::BufReader<File>,
    source_config: FileSourceConfig,
    // -- lines already split off the last chunk (lone `\r` can yield several per read)
    pending: VecDeque<String>,
    raw: Vec<u8>,
    exhausted: bool,
    progress: ReadProgress,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("source_config", &self.source_config)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl FileSource {
    /// 🚀 Open the tape. A missing or unreadable file fails right here, with the path in the message.
    ///
    /// `bars` is the run's shared progress display; `None` reads without drawing anything.
    pub async fn new(
        source_config: FileSourceConfig,
        vendor: Vendor,
        bars: Option<&MultiProgress>,
    ) -> Result<Self> {
        let file_handle = File::open(&source_config.file_name).await.context(format!(
            "💀 The {} tape at '{}' would not open. We knocked. We checked the path. \
             Either it isn't there or we aren't allowed in.",
            vendor, source_config.file_name
        ))?;

        // 📏 size for the progress bar; unknown is fine, the bar just won't know where the end is
        let file_size = file_handle.metadata().await.map(|m| m.len()).unwrap_or(0);
        let label = format!("{}:{}", vendor, source_config.file_name);
        let progress = match bars {
            Some(bars) => ReadProgress::new(label, file_size, bars),
            None => ReadProgress::hidden(label),
        };

        Ok(Self {
            buf_reader: io::BufReader::new(file_handle),
            source_config,
            pending: VecDeque::new(),
            raw: Vec::with_capacity(256),
            exhausted: false,
            progress,
        })
    }

    /// 🔪 Split one `\n`-terminated chunk into lines on any lone `\r` it carries.
    fn split_chunk(&mut self, bytes_read: usize) {
        let mut chunk: &[u8] = &self.raw;
        if let Some(stripped) = chunk.strip_suffix(b"\n") {
            chunk = stripped;
        }
        if let Some(stripped) = chunk.strip_suffix(b"\r") {
            chunk = stripped;
        }

        let mut first = true;
        for piece in chunk.split(|b| *b == b'\r') {
            let line = String::from_utf8_lossy(piece).into_owned();
            // -- the whole chunk's bytes are credited to its first line
            self.progress.record_line(if first { bytes_read as u64 } else { 0 });
            first = false;
            self.pending.push_back(line);
        }
    }
}

#[async_trait]
impl Source for FileSource {
    async fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(Some(line));
        }
        if self.exhausted {
            return Ok(None);
        }

        self.raw.clear();
        let bytes_read = match self.buf_reader.read_until(b'\n', &mut self.raw).await {
            Ok(bytes_read) => bytes_read,
            Err(err) => {
                self.exhausted = true;
                self.progress.abandon();
                return Err(err).context(format!(
                    "💀 Reading '{}' fell over mid-tape. Whatever we grouped so far is being thrown away.",
                    self.source_config.file_name
                ));
            }
        };

        if bytes_read == 0 {
            trace!(file = %self.source_config.file_name, "🏁 end of tape");
            self.exhausted = true;
            return Ok(None);
        }

        self.split_chunk(bytes_read);
        Ok(self.pending.pop_front())
    }

    fn finish(&mut self) {
        self.progress.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn drain(source: &mut FileSource) -> Vec<String> {
        let mut the_lines = Vec::new();
        while let Some(line) = source.next_line().await.expect("💀 read should not fail") {
            the_lines.push(line);
        }
        the_lines
    }

    fn tape_with(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut the_file = tempfile::NamedTempFile::new().expect("💀 temp file refused to exist");
        the_file.write_all(bytes).expect("💀 temp file refused our bytes");
        the_file.flush().expect("💀 flush");
        the_file
    }

    fn config_for(file: &tempfile::NamedTempFile) -> FileSourceConfig {
        FileSourceConfig {
            file_name: file.path().to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn the_one_where_every_line_ending_style_is_respected() {
        let the_tape = tape_with(b"unix\nwindows\r\nold mac\rstill here\n\nlast without newline");
        let mut the_source = FileSource::new(config_for(&the_tape), Vendor::Diebold, None)
            .await
            .expect("💀 open");

        assert_eq!(
            drain(&mut the_source).await,
            vec!["unix", "windows", "old mac", "still here", "", "last without newline"]
        );
        // -- and it stays drained
        assert_eq!(the_source.next_line().await.expect("no error"), None);
    }

    #[tokio::test]
    async fn the_one_where_bad_bytes_become_replacement_characters() {
        let the_tape = tape_with(b"CAJERO \xff\xfe OK\n");
        let mut the_source = FileSource::new(config_for(&the_tape), Vendor::Ncr, None)
            .await
            .expect("💀 open");
        assert_eq!(drain(&mut the_source).await, vec!["CAJERO \u{FFFD}\u{FFFD} OK"]);
    }

    #[tokio::test]
    async fn the_one_where_lines_are_not_trimmed() {
        let the_tape = tape_with(b"   indented   \n\ttabbed\t\n");
        let mut the_source = FileSource::new(config_for(&the_tape), Vendor::Ncr, None)
            .await
            .expect("💀 open");
        assert_eq!(drain(&mut the_source).await, vec!["   indented   ", "\ttabbed\t"]);
    }

    #[tokio::test]
    async fn the_one_where_a_missing_tape_fails_at_the_door() {
        let the_dir = tempfile::tempdir().expect("💀 tempdir");
        let the_missing = the_dir.path().join("nope.rpt");
        let the_result = FileSource::new(
            FileSourceConfig {
                file_name: the_missing.to_string_lossy().into_owned(),
            },
            Vendor::Diebold,
            None,
        )
        .await;

        let the_error = the_result.expect_err("💀 a missing file should not open");
        assert!(format!("{the_error:#}").contains("nope.rpt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn the_one_where_a_read_that_breaks_mid_tape_abandons_the_bar() {
        // -- a directory opens fine on unix and then refuses to be read
        let the_dir = tempfile::tempdir().expect("💀 tempdir");
        let the_screen = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let mut the_source = FileSource::new(
            FileSourceConfig {
                file_name: the_dir.path().to_string_lossy().into_owned(),
            },
            Vendor::Ncr,
            Some(&the_screen),
        )
        .await
        .expect("💀 opening a directory should succeed on unix");

        let the_error = the_source
            .next_line()
            .await
            .expect_err("💀 reading a directory should fail");
        assert!(format!("{the_error:#}").contains("fell over mid-tape"));
        assert!(the_source.progress.is_finished());
        assert_eq!(the_source.next_line().await.expect("no second error"), None);
    }
}
