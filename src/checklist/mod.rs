// Checklist execution - definitions, per-step lifecycle, occurrences and finalize

pub mod clock;
pub mod execution;
pub mod finalize;
pub mod hold;
pub mod loader;
pub mod ncr;
pub mod session;
pub mod status;
pub mod step;
pub mod timer;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use execution::ExecutionStateMachine;
pub use finalize::{FinalizeCoordinator, FinalizePhase, RunSubmitter};
pub use hold::HoldGesture;
pub use ncr::{NcrDraft, NcrPhoto, NcrRecorder};
pub use session::{ExecSession, HoldRelease};
pub use status::{NoopStatusSink, StatusLevel, StatusSink, TracingStatusSink};
pub use timer::StepTimer;
pub use types::{
    ChecklistDefinition, NcrOccurrence, RunRecord, RunRecordItem, RunResult, StepControls,
    StepRuntimeState, StepSpec, StepStatus, StepView,
};
