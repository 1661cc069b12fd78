// Operator status reporting, injected into the session

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusLevel {
    Idle,
    Warn,
    Ok,
    Err,
}

/// Receives `(level, message)` status updates from the core.
pub trait StatusSink: Send + Sync {
    fn report(&self, level: StatusLevel, message: &str);
}

/// Default sink: drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {
    fn report(&self, _level: StatusLevel, _message: &str) {}
}

/// Forwards status updates to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn report(&self, level: StatusLevel, message: &str) {
        match level {
            StatusLevel::Idle | StatusLevel::Ok => tracing::info!(status = ?level, "{}", message),
            StatusLevel::Warn => tracing::warn!(status = ?level, "{}", message),
            StatusLevel::Err => tracing::error!(status = ?level, "{}", message),
        }
    }
}

/// Keeps every update, for tests and for hosts that render a history.
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusSink {
    entries: Arc<Mutex<Vec<(StatusLevel, String)>>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(StatusLevel, String)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<(StatusLevel, String)> {
        self.entries().last().cloned()
    }
}

impl StatusSink for RecordingStatusSink {
    fn report(&self, level: StatusLevel, message: &str) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push((level, message.to_string()));
    }
}
