use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::shared::error::Result;

/// Append-only JSONL debug log.
///
/// Every call writes exactly one line. Failures while writing are swallowed:
/// the log is a debugging aid and must never take a run down with it.
#[derive(Debug)]
pub struct JsonlLogger {
    filepath: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonlLogger {
    /// Create `runs_dir` if needed and open `filename` inside it, or a
    /// timestamp-named file when `filename` is `None`.
    pub fn new(runs_dir: &Path, filename: Option<&str>) -> Result<Self> {
        fs::create_dir_all(runs_dir)?;
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| timestamp_filename(Utc::now()));
        Self::at_path(runs_dir.join(filename))
    }

    /// Open an explicit log path, creating parent directories.
    pub fn at_path(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            filepath: path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    /// Write a raw line. Discarded after [`close`](Self::close).
    pub fn log(&self, line: &str) {
        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        if let Some(writer) = guard.as_mut()
            && let Err(e) = writeln!(writer, "{line}")
        {
            debug!("jsonl log write failed: {}", e);
        }
    }

    /// Serialise `value` onto one line. Values that cannot be serialised are skipped.
    pub fn log_value<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(line) => self.log(&line),
            Err(e) => debug!("skipping unserialisable log value: {}", e),
        }
    }

    /// Flush and close. Calling it again is a no-op.
    pub fn close(&self) {
        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        if let Some(mut writer) = guard.take()
            && let Err(e) = writer.flush()
        {
            debug!("jsonl log flush failed: {}", e);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.lock().map(|g| g.is_none()).unwrap_or(true)
    }
}

impl Drop for JsonlLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// `2024-01-15T10-30-45-123Z.jsonl`
fn timestamp_filename(now: DateTime<Utc>) -> String {
    format!("{}.jsonl", now.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}
