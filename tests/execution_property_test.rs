// Property-based testing for the execution state machine
// Random operator/host sequences must never break the run invariants

use proptest::prelude::*;
use qc_checklist::checklist::finalize::build_record;
use qc_checklist::checklist::types::{release_threshold, NcrOccurrence, StepRuntimeState};
use qc_checklist::{ChecklistDefinition, ExecutionStateMachine, ManualClock, StepSpec, StepStatus};

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    Finish(usize, bool),
    Advance(u64),
    Tick,
    Ncr(usize),
    Reset,
}

fn op_strategy(steps: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..steps).prop_map(Op::Start),
        ((0..steps), any::<bool>()).prop_map(|(i, p)| Op::Finish(i, p)),
        (0u64..20).prop_map(Op::Advance),
        Just(Op::Tick),
        (0..steps).prop_map(Op::Ncr),
        Just(Op::Reset),
    ]
}

fn definition(targets: &[u64]) -> ChecklistDefinition {
    ChecklistDefinition {
        model: "PM700".to_string(),
        steps: targets
            .iter()
            .enumerate()
            .map(|(i, t)| StepSpec {
                order: i as u32 + 1,
                description: format!("Item {}", i + 1),
                target_seconds: *t,
                suggested_tags: vec![],
            })
            .collect(),
    }
}

fn scenario() -> impl Strategy<Value = (Vec<u64>, Vec<Op>)> {
    prop::collection::vec(1u64..40, 1..6).prop_flat_map(|targets| {
        let n = targets.len();
        (Just(targets), prop::collection::vec(op_strategy(n), 0..80))
    })
}

proptest! {
    #[test]
    fn at_most_one_step_runs((targets, ops) in scenario()) {
        let clock = ManualClock::new();
        let mut exec = ExecutionStateMachine::new(definition(&targets), clock.clone());

        for op in ops {
            let before = exec.states();
            let resetting = matches!(op, Op::Reset);
            match op {
                Op::Start(i) => {
                    let was_pending = before[i].status == StepStatus::Pending;
                    let other_running = exec.running_step().is_some();
                    let started = exec.start(i);
                    prop_assert_eq!(started, was_pending && !other_running);
                    if !started {
                        prop_assert_eq!(&exec.states(), &before);
                    }
                }
                Op::Finish(i, passed) => {
                    let finished = exec.finish(i, passed);
                    if finished {
                        let threshold = release_threshold(targets[i], 90);
                        let state = exec.state(i).unwrap();
                        prop_assert!(state.elapsed_seconds >= threshold);
                        prop_assert_eq!(
                            state.status,
                            if passed { StepStatus::Passed } else { StepStatus::Failed }
                        );
                    }
                }
                Op::Advance(secs) => clock.advance_secs(secs),
                Op::Tick => {
                    exec.tick();
                }
                Op::Ncr(i) => {
                    prop_assert!(exec.record_ncr(i, NcrOccurrence::default()));
                }
                Op::Reset => exec.reset(),
            }

            let states = exec.states();
            let running = states.iter().filter(|s| s.status == StepStatus::Running).count();
            prop_assert!(running <= 1);
            prop_assert_eq!(running == 1, exec.running_step().is_some());

            // terminal statuses are sticky until the run is reset
            if !resetting {
                for (b, a) in before.iter().zip(&states) {
                    if b.status.is_terminal() {
                        prop_assert_eq!(b.status, a.status);
                    }
                }
            }
        }
    }

    #[test]
    fn record_builds_iff_every_step_is_terminal(statuses in prop::collection::vec(
        prop_oneof![
            Just(StepStatus::Pending),
            Just(StepStatus::Running),
            Just(StepStatus::Passed),
            Just(StepStatus::Failed),
        ],
        1..8,
    )) {
        let targets = vec![10; statuses.len()];
        let states: Vec<_> = statuses
            .iter()
            .map(|status| StepRuntimeState {
                status: *status,
                ..Default::default()
            })
            .collect();

        let result = build_record("SN1", None, &definition(&targets), &states, chrono::Utc::now());

        prop_assert_eq!(result.is_ok(), statuses.iter().all(|s| s.is_terminal()));
    }
}
