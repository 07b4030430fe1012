//! Result log for automation scenarios.
//!
//! A [`TestLog`] fans every entry out to its [`LogListener`]s and keeps its
//! own pass/fail accounting. A run succeeds iff nothing was logged as a
//! failure or an error.

pub mod listeners;

use std::fmt;
use std::path::Path;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

pub use listeners::{ConsoleListener, Statistics, StatisticsListener, TextFileListener};

/// Kind of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryKind {
    Success,
    Failure,
    Info,
    Comment,
    Error,
    Warning,
    Verbose,
    /// An error that ends the scenario.
    CriticalError,
}

impl LogEntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogEntryKind::Success => "SUCCESS",
            LogEntryKind::Failure => "FAILURE",
            LogEntryKind::Info => "INFO",
            LogEntryKind::Comment => "COMMENT",
            LogEntryKind::Error => "ERROR",
            LogEntryKind::Warning => "WARNING",
            LogEntryKind::Verbose => "VERBOSE",
            LogEntryKind::CriticalError => "C_ERROR",
        }
    }

    /// Whether an entry of this kind makes the run unsuccessful.
    pub fn is_failing(self) -> bool {
        matches!(
            self,
            LogEntryKind::Failure | LogEntryKind::Error | LogEntryKind::CriticalError
        )
    }
}

impl fmt::Display for LogEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped remark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub kind: LogEntryKind,
    pub remark: String,
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    pub fn new(kind: LogEntryKind, remark: impl Into<String>) -> Self {
        Self::at(kind, remark, Local::now())
    }

    pub fn at(kind: LogEntryKind, remark: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            kind,
            remark: remark.into(),
            timestamp,
        }
    }
}

/// `HH:MM:SS - KIND    - remark`, kinds padded to seven columns.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {:<7} - {}",
            self.timestamp.format("%H:%M:%S"),
            self.kind.as_str(),
            self.remark
        )
    }
}

/// A sink for log entries.
pub trait LogListener: Send {
    fn add_entry(&mut self, entry: &LogEntry) -> Result<()>;

    /// Record a file produced during the run (screenshot, trace, ...).
    fn add_attachment(&mut self, _path: &Path, _suffix: &str) -> Result<()> {
        Ok(())
    }

    /// Flush and stop listening. Entries after `close` are ignored.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TestLog
// ---------------------------------------------------------------------------

pub struct TestLog {
    name: String,
    verbose: bool,
    statistics: StatisticsListener,
    listeners: Vec<Box<dyn LogListener>>,
}

impl fmt::Debug for TestLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestLog")
            .field("name", &self.name)
            .field("verbose", &self.verbose)
            .field("statistics", &self.statistics.snapshot())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TestLog {
    /// A log with only its built-in statistics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verbose: false,
            statistics: StatisticsListener::new(),
            listeners: Vec::new(),
        }
    }

    /// Keep [`LogEntryKind::Verbose`] entries instead of dropping them.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_listener(mut self, listener: impl LogListener + 'static) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&mut self, listener: impl LogListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Counters so far.
    pub fn statistics(&self) -> Statistics {
        self.statistics.snapshot()
    }

    /// True iff no failures and no errors have been logged.
    pub fn success(&self) -> bool {
        self.statistics.snapshot().success()
    }

    pub fn log(&mut self, kind: LogEntryKind, remark: impl Into<String>) {
        if kind == LogEntryKind::Verbose && !self.verbose {
            return;
        }
        let entry = LogEntry::new(kind, remark);

        if let Err(e) = self.statistics.add_entry(&entry) {
            warn!(error = %format!("{e:#}"), "statistics listener rejected entry");
        }
        for listener in &mut self.listeners {
            if let Err(e) = listener.add_entry(&entry) {
                warn!(log = %self.name, error = %format!("{e:#}"), "log listener failed");
            }
        }
    }

    pub fn pass(&mut self, remark: impl Into<String>) {
        self.log(LogEntryKind::Success, remark);
    }

    pub fn fail(&mut self, remark: impl Into<String>) {
        self.log(LogEntryKind::Failure, remark);
    }

    pub fn info(&mut self, remark: impl Into<String>) {
        self.log(LogEntryKind::Info, remark);
    }

    pub fn comment(&mut self, remark: impl Into<String>) {
        self.log(LogEntryKind::Comment, remark);
    }

    pub fn error(&mut self, remark: impl Into<String>) {
        self.log(LogEntryKind::Error, remark);
    }

    pub fn warning(&mut self, remark: impl Into<String>) {
        self.log(LogEntryKind::Warning, remark);
    }

    pub fn verbose(&mut self, remark: impl Into<String>) {
        self.log(LogEntryKind::Verbose, remark);
    }

    /// Log a critical error and return it for the caller to propagate.
    ///
    /// ```ignore
    /// return Err(log.critical_error("session did not start"));
    /// ```
    pub fn critical_error(&mut self, remark: impl Into<String>) -> anyhow::Error {
        let remark = remark.into();
        self.log(LogEntryKind::CriticalError, remark.clone());
        anyhow!("critical error: {remark}")
    }

    /// Log a pass if `expected == actual`, a failure naming both otherwise.
    pub fn verify<T>(&mut self, expected: T, actual: T, remark: &str) -> bool
    where
        T: PartialEq + fmt::Display,
    {
        if expected == actual {
            self.pass(format!("{remark} --- VALUE: {actual}"));
            true
        } else {
            self.fail(format!("{remark} --- EXPECTED: {expected} ACTUAL: {actual}"));
            false
        }
    }

    /// Like [`verify`](Self::verify) but only logs on mismatch.
    pub fn assert_eq<T>(&mut self, expected: T, actual: T, remark: &str) -> bool
    where
        T: PartialEq + fmt::Display,
    {
        if expected == actual {
            return true;
        }
        self.fail(format!("{remark} --- EXPECTED: {expected} ACTUAL: {actual}"));
        false
    }

    pub fn add_attachment(&mut self, path: &Path, suffix: &str) {
        for listener in &mut self.listeners {
            if let Err(e) = listener.add_attachment(path, suffix) {
                warn!(path = %path.display(), error = %format!("{e:#}"), "failed to attach file");
            }
        }
    }

    /// Close every listener; the first failure is returned after all of
    /// them have been closed.
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for listener in &mut self.listeners {
            if let Err(e) = listener.close() {
                warn!(error = %format!("{e:#}"), "failed to close log listener");
                first_err.get_or_insert(e);
            }
        }
        // The built-in statistics stay readable after close.
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<LogEntry>>>);

    impl LogListener for Recorder {
        fn add_entry(&mut self, entry: &LogEntry) -> Result<()> {
            self.0.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    #[test]
    fn entry_display_pads_kind() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let entry = LogEntry::at(LogEntryKind::Info, "hello", ts);
        assert_eq!(entry.to_string(), "14:05:07 - INFO    - hello");

        let entry = LogEntry::at(LogEntryKind::CriticalError, "boom", ts);
        assert_eq!(entry.to_string(), "14:05:07 - C_ERROR - boom");
    }

    #[test]
    fn success_tracks_failures_and_errors_only() {
        let mut log = TestLog::new("t");
        log.pass("ok");
        log.info("note");
        log.warning("careful");
        assert!(log.success());

        log.error("bad");
        assert!(!log.success());
        assert_eq!(log.statistics().errors, 1);
        assert_eq!(log.statistics().warnings, 1);
    }

    #[test]
    fn verify_logs_pass_or_failure() {
        let recorder = Recorder::default();
        let mut log = TestLog::new("t").with_listener(recorder.clone());

        assert!(log.verify(15, 15, "sum"));
        assert!(!log.verify("15", "16", "sum text"));

        let entries = recorder.0.lock().unwrap();
        assert_eq!(entries[0].kind, LogEntryKind::Success);
        assert_eq!(entries[0].remark, "sum --- VALUE: 15");
        assert_eq!(entries[1].kind, LogEntryKind::Failure);
        assert_eq!(entries[1].remark, "sum text --- EXPECTED: 15 ACTUAL: 16");
        assert!(!log.success());
    }

    #[test]
    fn assert_eq_is_silent_on_match() {
        let recorder = Recorder::default();
        let mut log = TestLog::new("t").with_listener(recorder.clone());
        assert!(log.assert_eq(1, 1, "same"));
        assert!(recorder.0.lock().unwrap().is_empty());
        assert!(!log.assert_eq(1, 2, "different"));
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn verbose_entries_need_verbose_log() {
        let recorder = Recorder::default();
        let mut quiet = TestLog::new("quiet").with_listener(recorder.clone());
        quiet.verbose("dropped");
        assert!(recorder.0.lock().unwrap().is_empty());

        let mut loud = TestLog::new("loud")
            .with_verbose(true)
            .with_listener(recorder.clone());
        loud.verbose("kept");
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn critical_error_is_logged_and_returned() {
        let mut log = TestLog::new("t");
        let err = log.critical_error("no session");
        assert!(err.to_string().contains("no session"));
        assert!(!log.success());
    }
}
