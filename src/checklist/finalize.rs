// Finalize: build the run record and submit it exactly once

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::Instrument;

use crate::checklist::clock::Clock;
use crate::checklist::execution::ExecutionStateMachine;
use crate::checklist::types::{
    ChecklistDefinition, RunRecord, RunRecordItem, RunResult, StepRuntimeState,
};
use crate::error::{ChecklistError, TransportError, ValidationError};
use crate::telemetry::{create_run_span, generate_correlation_id};

/// Persistence collaborator for finished runs.
#[async_trait]
pub trait RunSubmitter: Send + Sync {
    async fn submit(&self, record: &RunRecord) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizePhase {
    /// Ready to submit (again, after a failure)
    Idle,
    /// A submission is awaiting its response
    InFlight,
    /// Recorded; nothing more until reset
    Submitted,
}

impl FinalizePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => FinalizePhase::InFlight,
            2 => FinalizePhase::Submitted,
            _ => FinalizePhase::Idle,
        }
    }
}

/// Assemble the record for a run. Fails if the serial is blank or any step
/// is not terminal.
pub fn build_record(
    serial: &str,
    operator: Option<&str>,
    definition: &ChecklistDefinition,
    states: &[StepRuntimeState],
    finished_at: DateTime<Utc>,
) -> Result<RunRecord, ValidationError> {
    let serial = serial.trim();
    if serial.is_empty() {
        return Err(ValidationError::EmptySerial);
    }
    let pending = states.iter().filter(|s| !s.status.is_terminal()).count();
    if states.is_empty() || pending > 0 || states.len() != definition.steps.len() {
        return Err(ValidationError::PendingSteps {
            pending: pending.max(definition.steps.len().saturating_sub(states.len())),
        });
    }

    let items = definition
        .steps
        .iter()
        .zip(states)
        .map(|(spec, state)| RunRecordItem {
            order: spec.order,
            description: spec.description.clone(),
            target_seconds: spec.target_seconds,
            status: state.status,
            started_at: state.started_at,
            finished_at: state.finished_at,
            elapsed_seconds: state.elapsed_seconds,
            occurrences: state.occurrences.clone(),
        })
        .collect::<Vec<_>>();

    Ok(RunRecord {
        serial: serial.to_string(),
        operator: operator
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string),
        model: definition.model.clone(),
        finished_at,
        result: RunResult::from_statuses(items.iter().map(|i| &i.status)),
        items,
    })
}

/// Guards a run's submission: one in flight at a time, none after success.
#[derive(Debug, Default)]
pub struct FinalizeCoordinator {
    phase: AtomicU8,
}

const IDLE: u8 = 0;
const IN_FLIGHT: u8 = 1;
const SUBMITTED: u8 = 2;

/// Releases the in-flight slot unless the submission committed.
struct InFlightGuard<'a> {
    phase: &'a AtomicU8,
    committed: bool,
}

impl InFlightGuard<'_> {
    fn commit(mut self) {
        self.phase.store(SUBMITTED, Ordering::SeqCst);
        self.committed = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.phase.store(IDLE, Ordering::SeqCst);
        }
    }
}

impl FinalizeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> FinalizePhase {
        FinalizePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase() == FinalizePhase::InFlight
    }

    pub fn is_submitted(&self) -> bool {
        self.phase() == FinalizePhase::Submitted
    }

    /// Back to `Idle` for a new run.
    pub fn reset(&self) {
        self.phase.store(IDLE, Ordering::SeqCst);
    }

    fn acquire(&self) -> Result<InFlightGuard<'_>, ChecklistError> {
        match self
            .phase
            .compare_exchange(IDLE, IN_FLIGHT, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Ok(InFlightGuard {
                phase: &self.phase,
                committed: false,
            }),
            Err(SUBMITTED) => Err(ChecklistError::RunFrozen),
            Err(_) => Err(ChecklistError::SubmissionInFlight),
        }
    }

    /// Validate, build and submit the record for `execution`.
    ///
    /// On success the coordinator moves to `Submitted`; the caller freezes the
    /// execution. On any failure the step state is untouched and a retry is
    /// possible.
    pub async fn finalize<C, S>(
        &self,
        serial: &str,
        operator: Option<&str>,
        execution: &ExecutionStateMachine<C>,
        submitter: &S,
    ) -> Result<RunRecord, ChecklistError>
    where
        C: Clock,
        S: RunSubmitter + ?Sized,
    {
        let guard = self.acquire()?;

        let record = build_record(
            serial,
            operator,
            execution.definition(),
            &execution.states(),
            execution.clock().now(),
        )?;

        let run_id = generate_correlation_id();
        let span = create_run_span(&record.serial, &run_id);
        async {
            tracing::info!(
                model = %record.model,
                items = record.items.len(),
                result = ?record.result,
                "Submitting run record"
            );
            match submitter.submit(&record).await {
                Ok(()) => {
                    guard.commit();
                    tracing::info!("Run record stored");
                    Ok(record)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Run submission failed; retry is possible");
                    Err(ChecklistError::Transport(e))
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::types::{StepSpec, StepStatus};
    use chrono::Utc;

    fn definition(n: usize) -> ChecklistDefinition {
        ChecklistDefinition {
            model: "PM2100".to_string(),
            steps: (0..n)
                .map(|i| StepSpec {
                    order: i as u32 + 1,
                    description: format!("Step {}", i + 1),
                    target_seconds: 30,
                    suggested_tags: vec![],
                })
                .collect(),
        }
    }

    fn state(status: StepStatus) -> StepRuntimeState {
        StepRuntimeState {
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_record_requires_serial() {
        let states = vec![state(StepStatus::Passed)];
        let err = build_record("  ", None, &definition(1), &states, Utc::now()).unwrap_err();
        assert_eq!(err, ValidationError::EmptySerial);
    }

    #[test]
    fn test_build_record_rejects_any_non_terminal_step() {
        for blocking in [StepStatus::Pending, StepStatus::Running] {
            let states = vec![state(StepStatus::Passed), state(blocking), state(StepStatus::Failed)];
            let err = build_record("SN1", None, &definition(3), &states, Utc::now()).unwrap_err();
            assert_eq!(err, ValidationError::PendingSteps { pending: 1 });
        }
    }

    #[test]
    fn test_build_record_result() {
        let passed = vec![state(StepStatus::Passed), state(StepStatus::Passed)];
        let record = build_record("SN1", Some(" alice "), &definition(2), &passed, Utc::now()).unwrap();
        assert_eq!(record.result, RunResult::Pass);
        assert_eq!(record.operator.as_deref(), Some("alice"));

        let mixed = vec![state(StepStatus::Passed), state(StepStatus::Failed)];
        let record = build_record("SN1", Some(""), &definition(2), &mixed, Utc::now()).unwrap();
        assert_eq!(record.result, RunResult::Fail);
        assert_eq!(record.operator, None);
    }

    #[test]
    fn test_phase_transitions() {
        let coordinator = FinalizeCoordinator::new();
        assert_eq!(coordinator.phase(), FinalizePhase::Idle);

        let guard = coordinator.acquire().unwrap();
        assert!(coordinator.is_in_flight());
        assert!(matches!(coordinator.acquire(), Err(ChecklistError::SubmissionInFlight)));
        drop(guard);
        assert_eq!(coordinator.phase(), FinalizePhase::Idle);

        coordinator.acquire().unwrap().commit();
        assert!(coordinator.is_submitted());
        assert!(matches!(coordinator.acquire(), Err(ChecklistError::RunFrozen)));

        coordinator.reset();
        assert_eq!(coordinator.phase(), FinalizePhase::Idle);
    }
}
