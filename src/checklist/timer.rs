// Per-step timer: start instant, elapsed computation, stop

use chrono::{DateTime, Utc};

/// Tracks the running time of a single step.
///
/// Elapsed seconds never decrease, even if the clock is stepped back, and
/// freeze once the timer is stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepTimer {
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    elapsed_seconds: u64,
}

impl StepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.started_at = Some(now);
        self.stopped_at = None;
        self.elapsed_seconds = 0;
    }

    /// Whether the timer is currently feeding elapsed time.
    pub fn is_active(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    /// Recompute `floor((now - started_at) / 1000ms)` and return it.
    pub fn tick(&mut self, now: DateTime<Utc>) -> u64 {
        if !self.is_active() {
            return self.elapsed_seconds;
        }
        if let Some(started) = self.started_at {
            let millis = (now - started).num_milliseconds().max(0) as u64;
            self.elapsed_seconds = self.elapsed_seconds.max(millis / 1000);
        }
        self.elapsed_seconds
    }

    /// Stop feeding time. Elapsed stays at the last computed value.
    pub fn stop(&mut self, now: DateTime<Utc>) -> u64 {
        if self.is_active() {
            self.stopped_at = Some(now);
        }
        self.elapsed_seconds
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}
