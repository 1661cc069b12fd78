// Press-and-hold gesture detector for starting a step

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default hold time before a press turns into a start request.
pub const HOLD_DURATION: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed {
    step: usize,
    since: DateTime<Utc>,
}

/// Turns a press/release pair into at most one start request.
///
/// The host feeds `press` and `release` input events and calls `poll` on its
/// tick; `poll` yields the step index exactly once when the hold completes.
#[derive(Debug, Clone)]
pub struct HoldGesture {
    hold: Duration,
    armed: Option<Armed>,
}

impl Default for HoldGesture {
    fn default() -> Self {
        Self::new(HOLD_DURATION)
    }
}

impl HoldGesture {
    pub fn new(hold: Duration) -> Self {
        Self { hold, armed: None }
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold
    }

    /// Arm the gesture for `step`. Ignored while already armed or while any
    /// step is running. Returns whether the gesture was armed by this call.
    pub fn begin(&mut self, step: usize, now: DateTime<Utc>, any_running: bool) -> bool {
        if any_running {
            tracing::debug!(step, "hold ignored: a step is already running");
            return false;
        }
        if let Some(armed) = self.armed {
            tracing::debug!(step, armed_step = armed.step, "hold ignored: gesture already armed");
            return false;
        }
        self.armed = Some(Armed { step, since: now });
        tracing::debug!(step, "hold armed");
        true
    }

    /// Operator let go. A hold that already lasted the full duration still
    /// fires here, even if no tick polled it in between; otherwise disarms.
    pub fn release(&mut self, now: DateTime<Utc>) -> Option<usize> {
        if let Some(step) = self.poll(now) {
            return Some(step);
        }
        self.cancel();
        None
    }

    /// Disarms without effect.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                tracing::debug!(step = armed.step, "hold cancelled");
                true
            }
            None => false,
        }
    }

    /// Fire the start request once the hold duration has elapsed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let armed = self.armed?;
        let held_ms = (now - armed.since).num_milliseconds().max(0) as u128;
        if held_ms < self.hold.as_millis() {
            return None;
        }
        self.armed = None;
        tracing::debug!(step = armed.step, held_ms = held_ms as u64, "hold completed");
        Some(armed.step)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn armed_step(&self) -> Option<usize> {
        self.armed.map(|a| a.step)
    }
}
