//! Raw PCM output sink
//!
//! Owns the destination file for one extraction run: opened truncating
//! before the loop starts, finished exactly once after it ends, with `Drop`
//! as the backstop on early exits.

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only PCM byte sink.
pub struct PcmSink {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    bytes_written: u64,
}

impl PcmSink {
    /// Open the destination, truncating any pre-existing file at the path.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            path: path.to_path_buf(),
            bytes_written: 0,
        })
    }

    /// Append transformed PCM bytes. Write failures are fatal to the run.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(bytes)?;
            self.bytes_written += bytes.len() as u64;
        }
        Ok(())
    }

    /// Flush and close the sink. Safe to call once more on an already
    /// finished sink; returns the total bytes written.
    pub fn finish(&mut self) -> Result<u64> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(self.bytes_written)
    }

    /// Path the sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Drop for PcmSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
