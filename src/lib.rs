// qc-checklist library - timed quality-checklist execution for the production floor
// This exposes the core components for hosts, testing and integration

pub mod api;
pub mod checklist;
pub mod cli;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export key types for easy access
pub use api::{ChecklistApiClient, DirectoryTemplateSource, TemplateSource};
pub use checklist::{
    ChecklistDefinition, Clock, ExecSession, ExecutionStateMachine, FinalizeCoordinator,
    HoldGesture, HoldRelease, ManualClock, NcrOccurrence, NcrPhoto, NcrRecorder, RunRecord,
    RunResult, RunSubmitter, StatusLevel, StatusSink, StepSpec, StepStatus, StepTimer, StepView,
    SystemClock,
};
pub use config::{config, init_config, ChecklistConfig};
pub use error::{ChecklistError, TransportError, ValidationError};
pub use telemetry::{create_run_span, generate_correlation_id, init_telemetry};
