// Core types for checklist execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checklist::ncr::NcrPhoto;

/// Share of a step's target time that must elapse before it may be closed.
pub const TOLERANCE_PERCENT: u32 = 90;

/// Seconds after which a step with `target_seconds` may be marked pass or fail.
///
/// Integer form of `ceil(target * tolerance)`, so 30s at 90% is exactly 27s.
pub fn release_threshold(target_seconds: u64, tolerance_percent: u32) -> u64 {
    let scaled = u128::from(target_seconds) * u128::from(tolerance_percent);
    u64::try_from(scaled.div_ceil(100)).unwrap_or(u64::MAX)
}

/// Progress bar value, capped at 100.
pub fn percent_elapsed(elapsed_seconds: u64, target_seconds: u64) -> u8 {
    if target_seconds == 0 {
        return 0;
    }
    let (elapsed, target) = (u128::from(elapsed_seconds), u128::from(target_seconds));
    let rounded = (elapsed * 200 + target) / (2 * target);
    rounded.min(100) as u8
}

/// One inspection step as defined by the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// 1-based, unique within the definition
    pub order: u32,
    pub description: String,
    pub target_seconds: u64,
    pub suggested_tags: Vec<String>,
}

/// A loaded template. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistDefinition {
    pub model: String,
    pub steps: Vec<StepSpec>,
}

impl ChecklistDefinition {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&StepSpec> {
        self.steps.get(index)
    }

    /// Union of every step's tags, first occurrence wins the position.
    pub fn suggested_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.steps.iter().flat_map(|s| s.suggested_tags.iter()) {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }
}

/// Lifecycle of a single step. `Passed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "rodando")]
    Running,
    #[serde(rename = "ok")]
    Passed,
    #[serde(rename = "nok")]
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Passed | StepStatus::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Pending => "Pendente",
            StepStatus::Running => "Rodando...",
            StepStatus::Passed => "OK",
            StepStatus::Failed => "Não conforme",
        }
    }
}

/// A non-conformance observed on a step. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NcrOccurrence {
    #[serde(rename = "categoria")]
    pub category: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "fotoDataUrl")]
    pub photo: Option<NcrPhoto>,
}

/// Snapshot of one step's runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRuntimeState {
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub occurrences: Vec<NcrOccurrence>,
}

impl Default for StepRuntimeState {
    fn default() -> Self {
        Self {
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            elapsed_seconds: 0,
            occurrences: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunResult {
    #[serde(rename = "OK")]
    Pass,
    #[serde(rename = "NOK")]
    Fail,
}

impl RunResult {
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a StepStatus>) -> Self {
        if statuses.into_iter().all(|s| *s == StepStatus::Passed) {
            RunResult::Pass
        } else {
            RunResult::Fail
        }
    }
}

/// One step entry of the finalize payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecordItem {
    #[serde(rename = "ordem")]
    pub order: u32,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "tempo_estimado_seg")]
    pub target_seconds: u64,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(rename = "elapsed_seg")]
    pub elapsed_seconds: u64,
    #[serde(rename = "ncrs")]
    pub occurrences: Vec<NcrOccurrence>,
}

/// The finalize payload. Built once per attempt, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub serial: String,
    #[serde(rename = "operador")]
    pub operator: Option<String>,
    #[serde(rename = "modelo")]
    pub model: String,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<RunRecordItem>,
    pub result: RunResult,
}

/// Which operator controls are live for a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepControls {
    pub can_hold: bool,
    pub can_pass: bool,
    pub can_fail: bool,
    pub can_record_ncr: bool,
}

impl StepControls {
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Render-ready view of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub index: usize,
    pub order: u32,
    pub description: String,
    pub target_seconds: u64,
    pub release_at_seconds: u64,
    pub status: StepStatus,
    pub running: bool,
    pub elapsed_seconds: u64,
    pub percent_elapsed: u8,
    pub occurrences: usize,
    pub suggested_tags: Vec<String>,
    pub controls: StepControls,
}
