use thiserror::Error;

/// Local input problems. Reported to the operator, never mutate run state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("serial number is required")]
    EmptySerial,
    #[error("there are still pending items ({pending})")]
    PendingSteps { pending: usize },
    #[error("checklist is empty or invalid")]
    EmptyChecklist,
    #[error("invalid checklist file: {0}")]
    InvalidFile(String),
    #[error("item {index}: {reason}")]
    InvalidStep { index: usize, reason: String },
    #[error("model is required")]
    EmptyModel,
    #[error("at most {max} items per template (got {actual})")]
    TooManySteps { max: usize, actual: usize },
    #[error("could not infer a model from serial {0}")]
    UnknownSerialModel(String),
}

/// Remote collaborator failures. The operator retries by hand.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("could not decode server response: {0}")]
    Decode(String),
    #[error("template source unavailable: {0}")]
    Source(String),
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("a submission for this run is already in flight")]
    SubmissionInFlight,
    #[error("run already recorded; start a new serial to continue")]
    RunFrozen,
    #[error("no checklist loaded")]
    NoChecklistLoaded,
}

impl ChecklistError {
    /// True for errors the operator fixes by correcting input.
    pub fn is_validation(&self) -> bool {
        matches!(self, ChecklistError::Validation(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ChecklistError::Transport(_))
    }
}

pub type Result<T, E = ChecklistError> = std::result::Result<T, E>;
