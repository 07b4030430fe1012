//! Built-in [`LogListener`] implementations.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::Serialize;

use super::{LogEntry, LogEntryKind, LogListener};

/// Name of the text log inside a [`TextFileListener`] directory.
pub const TEXT_LOG_FILE_NAME: &str = "automation_log.txt";

// ---------------------------------------------------------------------------
// ConsoleListener
// ---------------------------------------------------------------------------

/// Forwards entries to `tracing`, at a level matching their kind.
#[derive(Debug, Default)]
pub struct ConsoleListener {
    closed: bool,
}

impl ConsoleListener {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogListener for ConsoleListener {
    fn add_entry(&mut self, entry: &LogEntry) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let kind = entry.kind.as_str();
        let remark = entry.remark.as_str();
        match entry.kind {
            LogEntryKind::Failure | LogEntryKind::Error | LogEntryKind::CriticalError => {
                tracing::error!(kind, "{remark}")
            }
            LogEntryKind::Warning => tracing::warn!(kind, "{remark}"),
            LogEntryKind::Verbose => tracing::debug!(kind, "{remark}"),
            LogEntryKind::Success | LogEntryKind::Info | LogEntryKind::Comment => {
                tracing::info!(kind, "{remark}")
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StatisticsListener
// ---------------------------------------------------------------------------

/// Entry counts for one log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub passes: usize,
    pub failures: usize,
    pub warnings: usize,
    /// Errors and critical errors.
    pub errors: usize,
}

impl Statistics {
    pub fn success(&self) -> bool {
        self.failures + self.errors == 0
    }

    fn record(&mut self, kind: LogEntryKind) {
        match kind {
            LogEntryKind::Success => self.passes += 1,
            LogEntryKind::Failure => self.failures += 1,
            LogEntryKind::Warning => self.warnings += 1,
            LogEntryKind::Error | LogEntryKind::CriticalError => self.errors += 1,
            LogEntryKind::Info | LogEntryKind::Comment | LogEntryKind::Verbose => {}
        }
    }
}

/// Counts entries by kind. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct StatisticsListener {
    counts: Arc<Mutex<Statistics>>,
    closed: bool,
}

impl StatisticsListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Statistics {
        *self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogListener for StatisticsListener {
    fn add_entry(&mut self, entry: &LogEntry) -> Result<()> {
        if !self.closed {
            self.counts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(entry.kind);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TextFileListener
// ---------------------------------------------------------------------------

/// Writes one line per entry to `automation_log.txt` in a directory and,
/// optionally, copies attachments next to it as `1{suffix}`, `2{suffix}`, ...
#[derive(Debug)]
pub struct TextFileListener {
    directory: PathBuf,
    log_path: PathBuf,
    writer: Option<BufWriter<File>>,
    save_attachments: bool,
    attachments: Vec<PathBuf>,
}

impl TextFileListener {
    /// Create `directory` if needed and open a fresh text log in it.
    pub fn create(directory: impl Into<PathBuf>, save_attachments: bool) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("failed to create log directory {}", directory.display()))?;

        let log_path = directory.join(TEXT_LOG_FILE_NAME);
        let file = File::create(&log_path)
            .with_context(|| format!("failed to create {}", log_path.display()))?;

        Ok(Self {
            directory,
            log_path,
            writer: Some(BufWriter::new(file)),
            save_attachments,
            attachments: Vec::new(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Copies made so far, in attachment order.
    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }
}

impl LogListener for TextFileListener {
    fn add_entry(&mut self, entry: &LogEntry) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        writeln!(writer, "{entry}")
            .and_then(|()| writer.flush())
            .with_context(|| format!("failed to write {}", self.log_path.display()))
    }

    fn add_attachment(&mut self, path: &Path, suffix: &str) -> Result<()> {
        if self.writer.is_none() || !self.save_attachments {
            return Ok(());
        }
        let dest = self
            .directory
            .join(format!("{}{suffix}", self.attachments.len() + 1));
        std::fs::copy(path, &dest).with_context(|| {
            format!("failed to copy attachment {} to {}", path.display(), dest.display())
        })?;
        self.attachments.push(dest);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("failed to flush {}", self.log_path.display()))?;
        }
        Ok(())
    }
}
