//! Bounded process log shown on the settings screen.
//!
//! Entries live in an in-memory ring and are mirrored to SQLite so recent
//! history survives a restart. Mirroring is best-effort: a database failure is
//! reported through `log` and otherwise ignored.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDateTime};

use crate::db::Database;

pub const DEFAULT_LOG_CAPACITY: usize = 500;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format(TIMESTAMP_FORMAT), self.message)
    }
}

pub struct LogStore {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    db: Option<Database>,
}

impl LogStore {
    /// Opens (or creates) the log database and rehydrates the ring from it.
    /// Falls back to a memory-only log if the database is unusable.
    pub fn open(path: &Path, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let db = match Database::open(path) {
            Ok(db) => Some(db),
            Err(e) => {
                log::error!("Process log database {} unavailable: {}", path.display(), e);
                None
            }
        };

        let mut entries = VecDeque::with_capacity(capacity);
        if let Some(db) = &db {
            match db.recent_process_log(capacity) {
                Ok(rows) => {
                    for row in rows {
                        match NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT) {
                            Ok(timestamp) => entries.push_back(LogEntry {
                                timestamp,
                                level: LogLevel::parse(&row.level),
                                message: row.message,
                            }),
                            Err(e) => log::warn!("Skipping log row {}: {}", row.seq, e),
                        }
                    }
                }
                Err(e) => log::error!("Failed to read process log: {}", e),
            }
        }

        Self {
            entries: Mutex::new(entries),
            capacity,
            db,
        }
    }

    pub fn in_memory(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            db: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, new_entries: impl IntoIterator<Item = LogEntry>) {
        let new_entries: Vec<LogEntry> = new_entries.into_iter().collect();
        if new_entries.is_empty() {
            return;
        }

        {
            let mut entries = self.lock();
            for entry in &new_entries {
                if entries.len() == self.capacity {
                    entries.pop_front();
                }
                entries.push_back(entry.clone());
            }
        }

        if let Some(db) = &self.db {
            let rows: Vec<(String, String, String)> = new_entries
                .iter()
                .map(|e| {
                    (
                        e.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                        e.level.as_str().to_string(),
                        e.message.clone(),
                    )
                })
                .collect();
            if let Err(e) = db.append_process_log(&rows, self.capacity) {
                log::error!("Failed to persist {} log entries: {}", rows.len(), e);
            }
        }
    }

    /// Rendered entries, oldest first.
    pub fn fetch_all(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.to_string()).collect()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
        if let Some(db) = &self.db {
            if let Err(e) = db.clear_process_log() {
                log::error!("Failed to clear process log: {}", e);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
