//! Append-only plain-text event log.
//!
//! One line per event: `[YYYY-MM-DD HH:MM:SS] user:<key> <kind> <details>`.
//! The file is written for operators and never read back. Write failures are
//! reported through `tracing` and otherwise ignored.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;

/// Event kinds recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    Start,
    Chat,
    ApiSuccess,
    ViewHistory,
    ClearHistory,
    ViewStats,
    ReplySent,
    ReplyError,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Start => "start",
            AuditEvent::Chat => "chat",
            AuditEvent::ApiSuccess => "api_success",
            AuditEvent::ViewHistory => "view_history",
            AuditEvent::ClearHistory => "clear_history",
            AuditEvent::ViewStats => "view_stats",
            AuditEvent::ReplySent => "reply_sent",
            AuditEvent::ReplyError => "reply_error",
        }
    }
}

pub struct AuditLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event. The file write runs on the blocking pool.
    pub async fn record(&self, user_key: &str, event: AuditEvent, details: &str) {
        let line = format_line(
            &Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            user_key,
            event,
            details,
        );
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);

        match tokio::task::spawn_blocking(move || append_line(&lock, &path, &line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Failed to write audit log {}: {}", self.path.display(), e)
            }
            Err(e) => tracing::warn!("Audit log task failed: {}", e),
        }
    }
}

fn append_line(lock: &Mutex<()>, path: &Path, line: &str) -> std::io::Result<()> {
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

fn format_line(timestamp: &str, user_key: &str, event: AuditEvent, details: &str) -> String {
    // Details are free text; keep each event on a single line.
    let details = details.replace(['\n', '\r'], " ");
    format!("[{timestamp}] user:{user_key} {} {details}\n", event.as_str())
}
