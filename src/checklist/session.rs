//! Operator session.
//!
//! [`ExecSession`] is what a host (terminal, kiosk, web view) drives: it holds
//! the serial and operator of the unit on the bench, the loaded run, the
//! hold gesture, the occurrence draft and the finalize guard, and reports
//! progress through an injected [`StatusSink`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::api::source::TemplateSource;
use crate::checklist::clock::{Clock, SystemClock};
use crate::checklist::execution::ExecutionStateMachine;
use crate::checklist::finalize::{FinalizeCoordinator, RunSubmitter};
use crate::checklist::hold::{HoldGesture, HOLD_DURATION};
use crate::checklist::loader;
use crate::checklist::ncr::{NcrDraft, NcrPhoto, NcrRecorder};
use crate::checklist::status::{NoopStatusSink, StatusLevel, StatusSink};
use crate::checklist::types::{ChecklistDefinition, RunRecord, StepView, TOLERANCE_PERCENT};
use crate::config::ExecutionConfig;
use crate::error::{ChecklistError, ValidationError};

pub const MSG_LOADING: &str = "Buscando checklist...";
pub const MSG_LOADED: &str = "Checklist carregado.";
pub const MSG_LOAD_FAILED: &str = "Erro ao carregar checklist.";
pub const MSG_SUBMITTING: &str = "Enviando resultados...";
pub const MSG_SUBMITTED: &str = "Teste validado e armazenado.";
pub const MSG_SUBMIT_FAILED: &str = "Erro ao salvar execução.";
pub const MSG_WAITING: &str = "Aguardando serial...";

/// What letting go of the start control did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldRelease {
    /// Nothing was being held.
    NotHeld,
    /// Released early, the step stays pending.
    Cancelled,
    /// The hold had already completed and the step was started.
    Started(usize),
}

pub struct ExecSession<C: Clock = SystemClock> {
    clock: C,
    serial: String,
    operator: Option<String>,
    execution: Option<ExecutionStateMachine<C>>,
    hold: HoldGesture,
    ncr: NcrRecorder,
    finalize: FinalizeCoordinator,
    status: Arc<dyn StatusSink>,
    tolerance_percent: u32,
}

impl Default for ExecSession<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> ExecSession<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            serial: String::new(),
            operator: None,
            execution: None,
            hold: HoldGesture::new(HOLD_DURATION),
            ncr: NcrRecorder::new(),
            finalize: FinalizeCoordinator::new(),
            status: Arc::new(NoopStatusSink),
            tolerance_percent: TOLERANCE_PERCENT,
        }
    }

    pub fn from_config(clock: C, config: &ExecutionConfig) -> Self {
        Self::new(clock)
            .with_hold_duration(config.hold_duration())
            .with_tolerance(config.tolerance_percent)
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = sink;
        self
    }

    pub fn with_hold_duration(mut self, hold: Duration) -> Self {
        self.hold = HoldGesture::new(hold);
        self
    }

    /// Applies to runs loaded afterwards.
    pub fn with_tolerance(mut self, tolerance_percent: u32) -> Self {
        self.tolerance_percent = tolerance_percent;
        self
    }

    pub fn set_serial(&mut self, serial: &str) {
        self.serial = serial.trim().to_string();
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn set_operator(&mut self, operator: Option<&str>) {
        self.operator = operator
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string);
    }

    pub fn operator(&self) -> Option<&str> {
        self.operator.as_deref()
    }

    pub fn execution(&self) -> Option<&ExecutionStateMachine<C>> {
        self.execution.as_ref()
    }

    pub fn definition(&self) -> Option<&ChecklistDefinition> {
        self.execution.as_ref().map(|e| e.definition())
    }

    pub fn finalize_coordinator(&self) -> &FinalizeCoordinator {
        &self.finalize
    }

    fn report(&self, level: StatusLevel, message: &str) {
        self.status.report(level, message);
    }

    /// Fetch the checklist for the current serial. A failed lookup keeps
    /// whatever run was loaded before.
    pub async fn load_by_serial<S>(&mut self, source: &S) -> Result<(), ChecklistError>
    where
        S: TemplateSource + ?Sized,
    {
        if self.serial.is_empty() {
            return Err(ValidationError::EmptySerial.into());
        }
        self.report(StatusLevel::Warn, MSG_LOADING);
        match source.load_by_serial(&self.serial).await {
            Ok(definition) => {
                self.load_definition(definition);
                self.report(StatusLevel::Ok, MSG_LOADED);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(serial = %self.serial, error = %e, "Checklist lookup failed");
                self.report(StatusLevel::Err, MSG_LOAD_FAILED);
                Err(e)
            }
        }
    }

    /// Load a checklist from a JSON file picked by the operator.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), ChecklistError> {
        match loader::load_file(path) {
            Ok(definition) => {
                self.load_definition(definition);
                self.report(StatusLevel::Ok, MSG_LOADED);
                Ok(())
            }
            Err(e) => {
                self.report(StatusLevel::Err, MSG_LOAD_FAILED);
                Err(e.into())
            }
        }
    }

    /// Replace the run. Anything in progress is discarded first.
    pub fn load_definition(&mut self, definition: ChecklistDefinition) {
        self.hold.cancel();
        self.ncr.cancel();
        self.finalize.reset();
        match self.execution.as_mut() {
            Some(execution) => execution.load(definition),
            None => {
                self.execution = Some(ExecutionStateMachine::with_tolerance(
                    definition,
                    self.clock.clone(),
                    self.tolerance_percent,
                ))
            }
        }
    }

    /// Operator pressed the start control of step `index`.
    pub fn press(&mut self, index: usize) -> bool {
        let now = self.clock.now();
        let Some(execution) = self.execution.as_ref() else {
            return false;
        };
        if !execution.controls(index).can_hold {
            tracing::debug!(step = index, "press ignored: step cannot be started");
            return false;
        }
        self.hold
            .begin(index, now, execution.running_step().is_some())
    }

    /// Operator let go. Before the hold completes this cancels the start;
    /// after it, the step starts even if no tick ran in between.
    pub fn release(&mut self) -> HoldRelease {
        if !self.hold.is_armed() {
            return HoldRelease::NotHeld;
        }
        let now = self.clock.now();
        match (self.hold.release(now), self.execution.as_mut()) {
            (Some(index), Some(execution)) => {
                if execution.start(index) {
                    HoldRelease::Started(index)
                } else {
                    HoldRelease::Cancelled
                }
            }
            _ => HoldRelease::Cancelled,
        }
    }

    /// Periodic host tick: completes a pending hold, then refreshes the
    /// running step. Returns the step started by this tick, if any.
    pub fn tick(&mut self) -> Option<usize> {
        let now = self.clock.now();
        let execution = self.execution.as_mut()?;
        let started = self
            .hold
            .poll(now)
            .filter(|&index| execution.start(index));
        execution.tick();
        started
    }

    pub fn finish(&mut self, index: usize, passed: bool) -> bool {
        self.execution
            .as_mut()
            .map(|e| e.finish(index, passed))
            .unwrap_or(false)
    }

    pub fn mark_passed(&mut self, index: usize) -> bool {
        self.finish(index, true)
    }

    /// Fail the step and open an occurrence draft for it.
    pub fn mark_failed(&mut self, index: usize) -> bool {
        if !self.finish(index, false) {
            return false;
        }
        self.ncr.open(index);
        true
    }

    /// Open the occurrence draft for a step.
    pub fn open_ncr(&mut self, index: usize) -> bool {
        match self.execution.as_ref() {
            Some(execution) if !execution.is_frozen() && index < execution.len() => {
                self.ncr.open(index);
                true
            }
            _ => false,
        }
    }

    pub fn ncr_draft(&self) -> Option<&NcrDraft> {
        self.ncr.draft()
    }

    pub fn ncr_draft_mut(&mut self) -> Option<&mut NcrDraft> {
        self.ncr.draft_mut()
    }

    pub fn set_ncr_category(&mut self, category: &str) -> bool {
        self.edit_draft(|draft| draft.category = category.to_string())
    }

    pub fn set_ncr_description(&mut self, description: &str) -> bool {
        self.edit_draft(|draft| draft.description = description.to_string())
    }

    pub fn set_ncr_photo(&mut self, photo: Option<NcrPhoto>) -> bool {
        self.edit_draft(|draft| draft.photo = photo)
    }

    fn edit_draft(&mut self, edit: impl FnOnce(&mut NcrDraft)) -> bool {
        match self.ncr.draft_mut() {
            Some(draft) => {
                edit(draft);
                true
            }
            None => false,
        }
    }

    pub fn save_ncr(&mut self) -> bool {
        match self.execution.as_mut() {
            Some(execution) => self.ncr.save(execution),
            None => false,
        }
    }

    pub fn cancel_ncr(&mut self) -> bool {
        self.ncr.cancel()
    }

    /// Record an occurrence without going through a draft.
    pub fn record_ncr(
        &mut self,
        index: usize,
        category: Option<&str>,
        description: Option<&str>,
        photo: Option<NcrPhoto>,
    ) -> bool {
        match self.execution.as_mut() {
            Some(execution) => self.ncr.record(execution, index, category, description, photo),
            None => false,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.execution.as_ref().is_some_and(|e| e.is_frozen())
    }

    pub fn can_finalize(&self) -> bool {
        match self.execution.as_ref() {
            Some(execution) => {
                execution.all_terminal()
                    && !execution.is_frozen()
                    && !self.finalize.is_in_flight()
            }
            None => false,
        }
    }

    /// Build and submit the run record. On success the run is frozen and any
    /// open occurrence draft is closed; on failure nothing changes and the
    /// operator may retry.
    pub async fn finalize<S>(&mut self, submitter: &S) -> Result<RunRecord, ChecklistError>
    where
        S: RunSubmitter + ?Sized,
    {
        let execution = self
            .execution
            .as_ref()
            .ok_or(ChecklistError::NoChecklistLoaded)?;
        if execution.is_frozen() {
            return Err(ChecklistError::RunFrozen);
        }
        if self.serial.is_empty() {
            return Err(ValidationError::EmptySerial.into());
        }
        let pending = execution.pending_count();
        if pending > 0 {
            return Err(ValidationError::PendingSteps { pending }.into());
        }

        self.report(StatusLevel::Warn, MSG_SUBMITTING);
        let outcome = self
            .finalize
            .finalize(&self.serial, self.operator.as_deref(), execution, submitter)
            .await;

        match outcome {
            Ok(record) => {
                if let Some(execution) = self.execution.as_mut() {
                    execution.freeze();
                }
                if self.ncr.cancel() {
                    tracing::info!("Closed unsaved occurrence draft after submission");
                }
                self.hold.cancel();
                self.report(StatusLevel::Ok, MSG_SUBMITTED);
                Ok(record)
            }
            Err(e @ ChecklistError::Transport(_)) => {
                self.report(StatusLevel::Err, MSG_SUBMIT_FAILED);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Start the same checklist over; every step back to pending.
    pub fn reset_run(&mut self) {
        self.hold.cancel();
        self.ncr.cancel();
        self.finalize.reset();
        if let Some(execution) = self.execution.as_mut() {
            execution.reset();
        }
    }

    /// Clear everything and wait for the next unit.
    pub fn reset_for_next_serial(&mut self) {
        self.hold.cancel();
        self.ncr.cancel();
        self.finalize.reset();
        self.execution = None;
        self.serial.clear();
        self.operator = None;
        self.report(StatusLevel::Idle, MSG_WAITING);
    }

    pub fn views(&self) -> Vec<StepView> {
        self.execution
            .as_ref()
            .map(|e| e.views())
            .unwrap_or_default()
    }

    pub fn suggested_tags(&self) -> Vec<String> {
        self.definition()
            .map(|d| d.suggested_tags())
            .unwrap_or_default()
    }
}
