//! The in-app journal behind `tlog!`: a bounded buffer for the log panel,
//! mirrored to `logdeck.log` in the data directory once `init` has run.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

const CAPACITY: usize = 500;
const FILE_NAME: &str = "logdeck.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// The entry as written to the log file. Continuation lines of copied
    /// text are tab-indented so every record starts with its timestamp.
    fn file_record(&self) -> String {
        format!(
            "{} {:<5} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level.label(),
            self.message.replace('\n', "\n\t")
        )
    }
}

#[derive(Default)]
struct Journal {
    entries: VecDeque<LogEntry>,
    file: Option<File>,
    unseen: bool,
}

impl Journal {
    fn record(&mut self, entry: LogEntry) {
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "{}", entry.file_record());
        }
        if self.entries.len() == CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.unseen = true;
    }
}

// Indexer threads log too; a panic in one of them must not silence the rest.
fn journal() -> MutexGuard<'static, Journal> {
    static JOURNAL: OnceLock<Mutex<Journal>> = OnceLock::new();
    JOURNAL
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Starts appending entries to `logdeck.log` under `data_dir`. Until then
/// (and in tests) the journal lives in memory only.
pub fn init(data_dir: &Path) {
    let path = data_dir.join(FILE_NAME);
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => journal().file = Some(file),
        Err(e) => push(
            LogLevel::Warn,
            format!("not writing {}: {}", path.display(), e),
        ),
    }
}

pub fn push(level: LogLevel, message: String) {
    journal().record(LogEntry {
        timestamp: Utc::now(),
        level,
        message,
    });
}

/// Whether entries arrived since the last call.
pub fn take_dirty() -> bool {
    std::mem::take(&mut journal().unseen)
}

pub fn entries() -> Vec<LogEntry> {
    journal().entries.iter().cloned().collect()
}

pub fn clear() {
    let mut journal = journal();
    journal.entries.clear();
    journal.unseen = true;
}

pub fn entry_count() -> usize {
    journal().entries.len()
}

#[macro_export]
macro_rules! tlog {
    (info, $($arg:tt)*) => {
        $crate::log::push($crate::log::LogLevel::Info, format!($($arg)*))
    };
    (warn, $($arg:tt)*) => {
        $crate::log::push($crate::log::LogLevel::Warn, format!($($arg)*))
    };
    (error, $($arg:tt)*) => {
        $crate::log::push($crate::log::LogLevel::Error, format!($($arg)*))
    };
}
