// Execution state machine - owns every step's runtime state for one run
//
// All mutation of step state is routed through this type. Operations whose
// preconditions do not hold are no-ops: they return `false` and log at debug.

use crate::checklist::clock::{Clock, SystemClock};
use crate::checklist::step::{Step, StepEvent};
use crate::checklist::types::{
    percent_elapsed, release_threshold, ChecklistDefinition, NcrOccurrence, StepControls,
    StepRuntimeState, StepStatus, StepView, TOLERANCE_PERCENT,
};

pub struct ExecutionStateMachine<C: Clock = SystemClock> {
    definition: ChecklistDefinition,
    steps: Vec<Step>,
    running: Option<usize>,
    tolerance_percent: u32,
    frozen: bool,
    clock: C,
}

impl ExecutionStateMachine<SystemClock> {
    pub fn with_system_clock(definition: ChecklistDefinition) -> Self {
        Self::new(definition, SystemClock)
    }
}

impl<C: Clock> ExecutionStateMachine<C> {
    pub fn new(definition: ChecklistDefinition, clock: C) -> Self {
        Self::with_tolerance(definition, clock, TOLERANCE_PERCENT)
    }

    pub fn with_tolerance(definition: ChecklistDefinition, clock: C, tolerance_percent: u32) -> Self {
        let steps = build_steps(&definition, tolerance_percent);
        tracing::info!(
            model = %definition.model,
            steps = steps.len(),
            tolerance_percent,
            "Execution initialized"
        );
        Self {
            definition,
            steps,
            running: None,
            tolerance_percent,
            frozen: false,
            clock,
        }
    }

    pub fn definition(&self) -> &ChecklistDefinition {
        &self.definition
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn tolerance_percent(&self) -> u32 {
        self.tolerance_percent
    }

    /// Index of the step currently running, if any.
    pub fn running_step(&self) -> Option<usize> {
        self.running
    }

    pub fn running_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status() == StepStatus::Running)
            .count()
    }

    pub fn status(&self, index: usize) -> Option<StepStatus> {
        self.steps.get(index).map(Step::status)
    }

    pub fn state(&self, index: usize) -> Option<StepRuntimeState> {
        self.steps.get(index).map(|s| s.runtime().snapshot())
    }

    pub fn states(&self) -> Vec<StepRuntimeState> {
        self.steps.iter().map(|s| s.runtime().snapshot()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| !s.status().is_terminal())
            .count()
    }

    pub fn all_terminal(&self) -> bool {
        !self.steps.is_empty() && self.pending_count() == 0
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// PENDING -> RUNNING. Requires no other step running.
    pub fn start(&mut self, index: usize) -> bool {
        if self.frozen {
            tracing::debug!(step = index, "start ignored: run is frozen");
            return false;
        }
        if let Some(running) = self.running {
            tracing::debug!(step = index, running, "start ignored: another step is running");
            return false;
        }
        let at = self.clock.now();
        let Some(step) = self.steps.get_mut(index) else {
            tracing::debug!(step = index, "start ignored: no such step");
            return false;
        };
        if step.status() != StepStatus::Pending {
            tracing::debug!(step = index, status = ?step.status(), "start ignored: step not pending");
            return false;
        }
        step.handle(&StepEvent::Start { at });
        self.running = Some(index);
        true
    }

    /// Refresh elapsed time of the running step. Returns its elapsed seconds.
    pub fn tick(&mut self) -> Option<u64> {
        let index = self.running?;
        let at = self.clock.now();
        let step = self.steps.get_mut(index)?;
        step.handle(&StepEvent::Tick { at });
        Some(step.runtime().elapsed_seconds())
    }

    /// Tick a specific step. Ignored unless it is the running one.
    pub fn tick_step(&mut self, index: usize) -> bool {
        if self.running != Some(index) {
            tracing::debug!(step = index, running = ?self.running, "tick ignored: step not running");
            return false;
        }
        self.tick().is_some()
    }

    /// True iff the step's elapsed time reached the tolerance threshold.
    /// Pass/fail controls additionally require the step to be running.
    pub fn can_finish(&self, index: usize) -> bool {
        self.steps
            .get(index)
            .map(|s| s.runtime().can_finish())
            .unwrap_or(false)
    }

    /// RUNNING -> PASSED | FAILED. Elapsed time is refreshed first, then
    /// the tolerance gate applies.
    pub fn finish(&mut self, index: usize, passed: bool) -> bool {
        if self.frozen {
            tracing::debug!(step = index, "finish ignored: run is frozen");
            return false;
        }
        if self.running != Some(index) {
            tracing::debug!(step = index, running = ?self.running, "finish ignored: step not running");
            return false;
        }
        let at = self.clock.now();
        let Some(step) = self.steps.get_mut(index) else {
            return false;
        };
        if !step.handle(&StepEvent::Finish { passed, at }) {
            return false;
        }
        self.running = None;
        true
    }

    /// Append a non-conformance to a step, whatever its status.
    pub fn record_ncr(&mut self, index: usize, occurrence: NcrOccurrence) -> bool {
        if self.frozen {
            tracing::debug!(step = index, "occurrence ignored: run is frozen");
            return false;
        }
        match self.steps.get_mut(index) {
            Some(step) => {
                step.handle(&StepEvent::RecordNcr(occurrence));
                true
            }
            None => {
                tracing::debug!(step = index, "occurrence ignored: no such step");
                false
            }
        }
    }

    /// Discard all runtime state; every step returns to PENDING.
    pub fn reset(&mut self) {
        // stop the running feed before the state it feeds is dropped
        if let Some(index) = self.running.take() {
            tracing::info!(step = index, "Stopping running step for reset");
        }
        self.steps = build_steps(&self.definition, self.tolerance_percent);
        self.frozen = false;
        tracing::info!(model = %self.definition.model, "Execution reset");
    }

    /// Abandon the current run and start over on another definition.
    pub fn load(&mut self, definition: ChecklistDefinition) {
        self.definition = definition;
        self.reset();
    }

    /// Lock the run after it has been recorded. Only `reset`/`load` undo it.
    pub fn freeze(&mut self) {
        self.frozen = true;
        tracing::info!(model = %self.definition.model, "Execution frozen");
    }

    pub fn controls(&self, index: usize) -> StepControls {
        let Some(step) = self.steps.get(index) else {
            return StepControls::disabled();
        };
        if self.frozen {
            return StepControls::disabled();
        }
        let status = step.status();
        let is_running = self.running == Some(index);
        let finishable = is_running && step.runtime().can_finish();
        StepControls {
            can_hold: status == StepStatus::Pending && self.running.is_none(),
            can_pass: finishable,
            can_fail: finishable,
            can_record_ncr: status == StepStatus::Pending && !is_running,
        }
    }

    pub fn view(&self, index: usize) -> Option<StepView> {
        let spec = self.definition.step(index)?;
        let step = self.steps.get(index)?;
        let runtime = step.runtime();
        Some(StepView {
            index,
            order: spec.order,
            description: spec.description.clone(),
            target_seconds: spec.target_seconds,
            release_at_seconds: release_threshold(spec.target_seconds, self.tolerance_percent),
            status: runtime.status(),
            running: self.running == Some(index),
            elapsed_seconds: runtime.elapsed_seconds(),
            percent_elapsed: percent_elapsed(runtime.elapsed_seconds(), spec.target_seconds),
            occurrences: runtime.occurrences().len(),
            suggested_tags: spec.suggested_tags.clone(),
            controls: self.controls(index),
        })
    }

    pub fn views(&self) -> Vec<StepView> {
        (0..self.steps.len()).filter_map(|i| self.view(i)).collect()
    }
}

impl<C: Clock> std::fmt::Debug for ExecutionStateMachine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStateMachine")
            .field("model", &self.definition.model)
            .field("steps", &self.steps)
            .field("running", &self.running)
            .field("frozen", &self.frozen)
            .finish()
    }
}

fn build_steps(definition: &ChecklistDefinition, tolerance_percent: u32) -> Vec<Step> {
    definition
        .steps
        .iter()
        .enumerate()
        .map(|(i, spec)| Step::new(i, spec.target_seconds, tolerance_percent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::clock::ManualClock;
    use crate::checklist::types::StepSpec;

    fn definition(targets: &[u64]) -> ChecklistDefinition {
        ChecklistDefinition {
            model: "PM2100".to_string(),
            steps: targets
                .iter()
                .enumerate()
                .map(|(i, t)| StepSpec {
                    order: i as u32 + 1,
                    description: format!("Step {}", i + 1),
                    target_seconds: *t,
                    suggested_tags: vec![],
                })
                .collect(),
        }
    }

    fn machine(targets: &[u64]) -> (ExecutionStateMachine<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (ExecutionStateMachine::new(definition(targets), clock.clone()), clock)
    }

    #[test]
    fn test_single_active_step() {
        let (mut exec, _clock) = machine(&[30, 30, 30]);

        assert!(exec.start(0));
        assert!(!exec.start(1));
        assert_eq!(exec.running_step(), Some(0));
        assert_eq!(exec.running_count(), 1);
        assert_eq!(exec.status(1), Some(StepStatus::Pending));
    }

    #[test]
    fn test_tolerance_boundary_at_27_seconds() {
        let (mut exec, clock) = machine(&[30, 30, 30]);
        exec.start(0);

        clock.advance_secs(26);
        exec.tick();
        assert!(!exec.can_finish(0));

        clock.advance_secs(1);
        exec.tick();
        assert!(exec.can_finish(0));

        assert!(exec.finish(0, true));
        assert!(exec.can_finish(0));
        assert!(!exec.controls(0).can_pass);
    }

    #[test]
    fn test_finish_before_threshold_is_noop() {
        let (mut exec, clock) = machine(&[30]);
        exec.start(0);
        clock.advance_secs(20);

        assert!(!exec.finish(0, true));
        assert_eq!(exec.status(0), Some(StepStatus::Running));
        assert_eq!(exec.running_step(), Some(0));
    }

    #[test]
    fn test_finish_clears_running_slot() {
        let (mut exec, clock) = machine(&[30, 30]);
        exec.start(0);
        clock.advance_secs(27);
        exec.tick();

        assert!(exec.finish(0, false));
        assert_eq!(exec.running_step(), None);
        assert_eq!(exec.status(0), Some(StepStatus::Failed));
        assert!(exec.start(1));
    }

    #[test]
    fn test_elapsed_frozen_after_finish() {
        let (mut exec, clock) = machine(&[10]);
        exec.start(0);
        clock.advance_secs(12);
        exec.finish(0, true);

        clock.advance_secs(60);
        assert_eq!(exec.tick(), None);
        assert!(!exec.tick_step(0));
        assert_eq!(exec.state(0).map(|s| s.elapsed_seconds), Some(12));
    }

    #[test]
    fn test_reset_mid_run_discards_state() {
        let (mut exec, clock) = machine(&[30, 30, 30]);
        exec.start(0);
        clock.advance_secs(15);
        exec.tick();

        exec.reset();

        assert_eq!(exec.running_step(), None);
        assert!(exec
            .states()
            .iter()
            .all(|s| s.status == StepStatus::Pending && s.elapsed_seconds == 0));

        clock.advance_secs(30);
        assert!(!exec.tick_step(0));
        assert_eq!(exec.tick(), None);
        assert_eq!(exec.state(0).map(|s| s.elapsed_seconds), Some(0));
    }

    #[test]
    fn test_controls_follow_gating() {
        let (mut exec, clock) = machine(&[10, 10]);
        assert!(exec.controls(0).can_hold);
        assert!(exec.controls(0).can_record_ncr);

        exec.start(0);
        let running = exec.controls(0);
        assert!(!running.can_hold && !running.can_pass && !running.can_record_ncr);
        assert!(!exec.controls(1).can_hold);

        clock.advance_secs(9);
        exec.tick();
        assert!(exec.controls(0).can_pass && exec.controls(0).can_fail);

        exec.finish(0, true);
        exec.freeze();
        assert_eq!(exec.controls(1), StepControls::disabled());
    }

    #[test]
    fn test_frozen_run_rejects_mutation() {
        let (mut exec, _clock) = machine(&[10]);
        exec.freeze();

        assert!(!exec.start(0));
        assert!(!exec.record_ncr(0, NcrOccurrence::default()));

        exec.reset();
        assert!(!exec.is_frozen());
        assert!(exec.start(0));
    }

    #[test]
    fn test_view_reports_release_threshold_and_progress() {
        let (mut exec, clock) = machine(&[30]);
        exec.start(0);
        clock.advance_secs(15);
        exec.tick();

        let view = exec.view(0).unwrap();
        assert_eq!(view.release_at_seconds, 27);
        assert_eq!(view.percent_elapsed, 50);
        assert!(view.running);
    }

    #[test]
    fn test_view_with_huge_target_does_not_overflow() {
        let (mut exec, clock) = machine(&[u64::MAX]);
        exec.start(0);
        clock.advance_secs(3600);
        exec.tick();

        let view = exec.view(0).unwrap();
        assert_eq!(view.percent_elapsed, 0);
        assert!(!exec.can_finish(0));
    }

    #[test]
    fn test_out_of_range_indices_are_ignored() {
        let (mut exec, _clock) = machine(&[10]);
        assert!(!exec.start(5));
        assert!(!exec.finish(5, true));
        assert!(!exec.record_ncr(5, NcrOccurrence::default()));
        assert_eq!(exec.view(5), None);
    }
}
