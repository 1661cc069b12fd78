// Per-step lifecycle: PENDING -> RUNNING -> PASSED | FAILED

use chrono::{DateTime, Utc};
use statig::prelude::*;

use crate::checklist::timer::StepTimer;
use crate::checklist::types::{release_threshold, NcrOccurrence, StepRuntimeState, StepStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Start { at: DateTime<Utc> },
    Tick { at: DateTime<Utc> },
    Finish { passed: bool, at: DateTime<Utc> },
    RecordNcr(NcrOccurrence),
}

/// Context carried by a step's state machine.
#[derive(Debug, Clone)]
pub struct StepRuntime {
    index: usize,
    threshold_seconds: u64,
    status: StepStatus,
    timer: StepTimer,
    finished_at: Option<DateTime<Utc>>,
    occurrences: Vec<NcrOccurrence>,
}

impl StepRuntime {
    pub fn new(index: usize, target_seconds: u64, tolerance_percent: u32) -> Self {
        Self {
            index,
            threshold_seconds: release_threshold(target_seconds, tolerance_percent),
            status: StepStatus::Pending,
            timer: StepTimer::new(),
            finished_at: None,
            occurrences: Vec::new(),
        }
    }

    fn record(&mut self, occurrence: &NcrOccurrence) {
        self.occurrences.push(occurrence.clone());
        tracing::info!(
            step = self.index,
            status = ?self.status,
            occurrences = self.occurrences.len(),
            "Non-conformance recorded"
        );
    }

    fn ignore(&self, event: &StepEvent) {
        tracing::debug!(step = self.index, status = ?self.status, ?event, "Event ignored in current state");
    }
}

#[state_machine(initial = "State::pending()")]
impl StepRuntime {
    #[state]
    fn pending(&mut self, event: &StepEvent) -> Outcome<State> {
        match event {
            StepEvent::Start { at } => {
                self.timer.start(*at);
                self.status = StepStatus::Running;
                tracing::info!(step = self.index, started_at = %at, "Step started");
                Transition(State::running())
            }
            StepEvent::RecordNcr(occurrence) => {
                self.record(occurrence);
                Handled
            }
            _ => {
                self.ignore(event);
                Handled
            }
        }
    }

    #[state]
    fn running(&mut self, event: &StepEvent) -> Outcome<State> {
        match event {
            StepEvent::Tick { at } => {
                self.timer.tick(*at);
                Handled
            }
            StepEvent::Finish { passed, at } => {
                let elapsed = self.timer.tick(*at);
                if elapsed < self.threshold_seconds {
                    tracing::debug!(
                        step = self.index,
                        elapsed_seconds = elapsed,
                        threshold_seconds = self.threshold_seconds,
                        "Finish rejected: tolerance threshold not reached"
                    );
                    return Handled;
                }
                self.timer.stop(*at);
                self.finished_at = Some(*at);
                self.status = if *passed {
                    StepStatus::Passed
                } else {
                    StepStatus::Failed
                };
                tracing::info!(
                    step = self.index,
                    passed = *passed,
                    elapsed_seconds = elapsed,
                    "Step finished"
                );
                if *passed {
                    Transition(State::passed())
                } else {
                    Transition(State::failed())
                }
            }
            StepEvent::RecordNcr(occurrence) => {
                self.record(occurrence);
                Handled
            }
            StepEvent::Start { .. } => {
                self.ignore(event);
                Handled
            }
        }
    }

    #[state]
    fn passed(&mut self, event: &StepEvent) -> Outcome<State> {
        match event {
            StepEvent::RecordNcr(occurrence) => {
                self.record(occurrence);
                Handled
            }
            _ => {
                self.ignore(event);
                Handled
            }
        }
    }

    #[state]
    fn failed(&mut self, event: &StepEvent) -> Outcome<State> {
        match event {
            StepEvent::RecordNcr(occurrence) => {
                self.record(occurrence);
                Handled
            }
            _ => {
                self.ignore(event);
                Handled
            }
        }
    }
}

impl StepRuntime {
    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.elapsed_seconds()
    }

    pub fn threshold_seconds(&self) -> u64 {
        self.threshold_seconds
    }

    /// Elapsed time has reached the release threshold. Says nothing about
    /// status; callers gate on the step being the running one.
    pub fn can_finish(&self) -> bool {
        self.elapsed_seconds() >= self.threshold_seconds
    }

    pub fn occurrences(&self) -> &[NcrOccurrence] {
        &self.occurrences
    }

    pub fn snapshot(&self) -> StepRuntimeState {
        StepRuntimeState {
            status: self.status,
            started_at: self.timer.started_at(),
            finished_at: self.finished_at,
            elapsed_seconds: self.elapsed_seconds(),
            occurrences: self.occurrences.clone(),
        }
    }
}

/// A step's state machine. All mutation goes through `handle`.
pub struct Step {
    machine: StateMachine<StepRuntime>,
}

impl Step {
    pub fn new(index: usize, target_seconds: u64, tolerance_percent: u32) -> Self {
        Self {
            machine: StepRuntime::new(index, target_seconds, tolerance_percent).state_machine(),
        }
    }

    /// Feed an event; returns whether the status changed.
    pub fn handle(&mut self, event: &StepEvent) -> bool {
        let before = self.runtime().status();
        self.machine.handle(event);
        self.runtime().status() != before
    }

    pub fn runtime(&self) -> &StepRuntime {
        self.machine.inner()
    }

    pub fn status(&self) -> StepStatus {
        self.runtime().status()
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("runtime", self.runtime()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::clock::{Clock, ManualClock};

    #[test]
    fn test_step_basic_lifecycle() {
        let clock = ManualClock::new();
        let mut step = Step::new(0, 30, 90);
        assert_eq!(step.status(), StepStatus::Pending);

        assert!(step.handle(&StepEvent::Start { at: clock.now() }));
        assert_eq!(step.status(), StepStatus::Running);

        clock.advance_secs(27);
        step.handle(&StepEvent::Tick { at: clock.now() });
        assert!(step.runtime().can_finish());

        assert!(step.handle(&StepEvent::Finish { passed: true, at: clock.now() }));
        assert_eq!(step.status(), StepStatus::Passed);
        assert_eq!(step.runtime().snapshot().finished_at, Some(clock.now()));
    }

    #[test]
    fn test_can_finish_tracks_elapsed_only() {
        let clock = ManualClock::new();
        let mut step = Step::new(0, 10, 90);
        assert!(!step.runtime().can_finish());

        step.handle(&StepEvent::Start { at: clock.now() });
        clock.advance_secs(9);
        step.handle(&StepEvent::Tick { at: clock.now() });
        assert!(step.runtime().can_finish());

        assert!(step.handle(&StepEvent::Finish { passed: false, at: clock.now() }));
        assert_eq!(step.runtime().elapsed_seconds(), 9);
        assert!(step.runtime().can_finish());
        assert!(!step.handle(&StepEvent::Finish { passed: true, at: clock.now() }));
        assert_eq!(step.status(), StepStatus::Failed);
    }

    #[test]
    fn test_finish_before_threshold_is_ignored() {
        let clock = ManualClock::new();
        let mut step = Step::new(0, 30, 90);
        step.handle(&StepEvent::Start { at: clock.now() });

        clock.advance_secs(26);
        assert!(!step.handle(&StepEvent::Finish { passed: false, at: clock.now() }));
        assert_eq!(step.status(), StepStatus::Running);
        assert_eq!(step.runtime().elapsed_seconds(), 26);
    }

    #[test]
    fn test_terminal_state_does_not_restart() {
        let clock = ManualClock::new();
        let mut step = Step::new(0, 1, 90);
        step.handle(&StepEvent::Start { at: clock.now() });
        clock.advance_secs(1);
        step.handle(&StepEvent::Finish { passed: false, at: clock.now() });

        assert!(!step.handle(&StepEvent::Start { at: clock.now() }));
        assert!(!step.handle(&StepEvent::Finish { passed: true, at: clock.now() }));
        assert_eq!(step.status(), StepStatus::Failed);
    }

    #[test]
    fn test_ncr_recorded_in_any_state() {
        let clock = ManualClock::new();
        let mut step = Step::new(0, 1, 90);
        let occ = NcrOccurrence {
            category: Some("REBARBA".to_string()),
            ..Default::default()
        };

        step.handle(&StepEvent::RecordNcr(occ.clone()));
        step.handle(&StepEvent::Start { at: clock.now() });
        step.handle(&StepEvent::RecordNcr(occ.clone()));
        clock.advance_secs(1);
        step.handle(&StepEvent::Finish { passed: true, at: clock.now() });
        step.handle(&StepEvent::RecordNcr(occ));

        assert_eq!(step.runtime().occurrences().len(), 3);
        assert_eq!(step.status(), StepStatus::Passed);
    }

    #[test]
    fn test_tick_in_pending_does_not_accumulate() {
        let clock = ManualClock::new();
        let mut step = Step::new(0, 30, 90);
        clock.advance_secs(40);
        step.handle(&StepEvent::Tick { at: clock.now() });
        assert_eq!(step.runtime().elapsed_seconds(), 0);
    }
}
