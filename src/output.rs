use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};

use crate::extract::Record;

/// Byte order mark so spreadsheet apps pick the right decoder.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

const HEADER: [&str; 5] = ["title", "price_raw", "price_value", "stock", "url"];

/// Incremental delimited writer for scraped records.
///
/// Opened once per run; every page is flushed as soon as it is appended so
/// a mid-run abort leaves all previously written pages on disk.
pub struct RecordSink<W: Write> {
    writer: Writer<W>,
}

impl RecordSink<File> {
    /// Create (truncating) the output file, making parent directories as
    /// needed for relative or nested paths.
    pub fn create(path: &Path, delimiter: u8) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Self::from_writer(file, delimiter)
    }
}

impl<W: Write> RecordSink<W> {
    /// Wrap any writer, emitting the BOM and header row up front.
    pub fn from_writer(mut inner: W, delimiter: u8) -> Result<Self> {
        inner.write_all(UTF8_BOM).context("failed to write output header")?;
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(HEADER).context("failed to write output header")?;
        Ok(Self { writer })
    }

    /// Append one page worth of records and flush.
    pub fn append_page(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            self.writer.serialize(record).context("failed to write record")?;
        }
        self.writer.flush().context("failed to flush output")?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush output: {}", e))
    }
}

// ── Tests ──
