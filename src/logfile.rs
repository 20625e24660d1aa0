//! Append-only event log.
//!
//! Best-effort, fire-and-forget: a failed append never reaches agent control
//! flow. The file handle is opened once at startup and shared for the life of
//! the process.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Append-only log of human-readable agent events.
pub struct EventLog {
    writer: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// Open (or create) the dated log file under `dir`.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_sensor.log", Local::now().format("%Y-%m-%d")));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: Some(Mutex::new(BufWriter::new(file))),
            path: Some(path),
        })
    }

    /// A log that discards everything. Used when the real one cannot be
    /// opened, and in tests.
    pub fn disabled() -> Self {
        Self {
            writer: None,
            path: None,
        }
    }

    /// Append one timestamped line. Errors are swallowed.
    pub fn append(&self, message: &str) {
        if message.is_empty() {
            return;
        }
        if let Some(ref writer) = self.writer {
            if let Ok(mut writer) = writer.lock() {
                let _ = writeln!(writer, "{} {}", Local::now().format("%H:%M:%S"), message);
                let _ = writer.flush();
            }
        }
    }

    /// Where the log lives, if it was opened.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Thread-safe shared event log.
pub type SharedEventLog = Arc<EventLog>;

/// Open a shared log under `dir`, falling back to a disabled log with a
/// warning if the directory or file cannot be used.
pub fn open_shared_log(dir: &Path) -> SharedEventLog {
    match EventLog::open(dir) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            eprintln!("Warning: Could not open event log in {dir:?}: {e}");
            Arc::new(EventLog::disabled())
        }
    }
}
