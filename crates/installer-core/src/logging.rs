//! Per-session transcript files.
//!
//! When a log directory is configured every session appends a line to
//! `{log_dir}/{session_id}.log` for each action it accepts and each progress
//! change it publishes. Diagnostics for the process as a whole go through the
//! `log` facade instead.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use chrono::{SecondsFormat, Utc};

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// A handle that discards everything written to it.
pub fn disabled() -> LogHandle {
    Arc::new(Mutex::new(None))
}

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, direction: &str, data: &str) {
    let mut guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(ref mut file) = *guard {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        if let Err(e) = writeln!(file, "[{}] {}: {}", ts, direction, data).and_then(|_| file.flush())
        {
            log::debug!("Failed to write session transcript: {}", e);
        }
    }
}

/// Open (or create) a log file at `{log_dir}/{log_id}.log` and return a shared handle.
///
/// Returns a disabled handle when `log_dir` is `None` or the file cannot be opened.
pub fn open_log_file(log_dir: Option<&Path>, log_id: &str) -> LogHandle {
    let Some(dir) = log_dir else {
        return disabled();
    };
    let path = dir.join(format!("{}.log", log_id));
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::warn!("Failed to create log directory {}: {}", dir.display(), e);
        return disabled();
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| log::warn!("Failed to open log file {}: {}", path.display(), e))
        .ok();
    Arc::new(Mutex::new(file))
}

/// A session transcript whose file is only opened on the first write.
///
/// Creating a session touches no disk, so sessions can be built while the
/// registry lock is held.
#[derive(Debug)]
pub struct Transcript {
    log_dir: Option<PathBuf>,
    log_id: String,
    handle: OnceLock<LogHandle>,
}

impl Transcript {
    pub fn new(log_dir: Option<&Path>, log_id: &str) -> Self {
        Self {
            log_dir: log_dir.map(Path::to_path_buf),
            log_id: log_id.to_string(),
            handle: OnceLock::new(),
        }
    }

    /// Append a line, opening the file first if needed.
    pub fn write(&self, direction: &str, data: &str) {
        if self.log_dir.is_none() {
            return;
        }
        let handle = self
            .handle
            .get_or_init(|| open_log_file(self.log_dir.as_deref(), &self.log_id));
        log_line(handle, direction, data);
    }

    /// Whether the file has been opened.
    pub fn is_open(&self) -> bool {
        self.handle.get().is_some()
    }
}
