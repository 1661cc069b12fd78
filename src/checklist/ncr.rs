// Non-conformance capture: photo encoding and the one-save-per-draft recorder

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::checklist::clock::Clock;
use crate::checklist::execution::ExecutionStateMachine;
use crate::checklist::types::NcrOccurrence;

/// Photo attached to an occurrence, kept as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NcrPhoto(String);

impl NcrPhoto {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime_type, BASE64.encode(bytes)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(mime_for_path(path), &bytes))
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.0.strip_prefix("data:")?.split(';').next()
    }

    pub fn decode(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.0.split_once(";base64,")?;
        BASE64.decode(payload).ok()
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// An occurrence being filled in for one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NcrDraft {
    pub step: usize,
    pub category: String,
    pub description: String,
    pub photo: Option<NcrPhoto>,
}

impl NcrDraft {
    fn into_occurrence(self) -> NcrOccurrence {
        NcrOccurrence {
            category: non_blank(&self.category),
            description: non_blank(&self.description),
            photo: self.photo,
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Captures occurrences. At most one draft is open at a time and each save
/// appends exactly one occurrence.
#[derive(Debug, Clone, Default)]
pub struct NcrRecorder {
    draft: Option<NcrDraft>,
}

impl NcrRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh draft for `step`, discarding any unsaved one.
    pub fn open(&mut self, step: usize) -> &mut NcrDraft {
        if let Some(previous) = &self.draft {
            tracing::debug!(step = previous.step, "Discarding unsaved occurrence draft");
        }
        self.draft.insert(NcrDraft {
            step,
            ..Default::default()
        })
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    pub fn draft(&self) -> Option<&NcrDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut NcrDraft> {
        self.draft.as_mut()
    }

    pub fn cancel(&mut self) -> bool {
        self.draft.take().is_some()
    }

    /// Commit the open draft to its step and close it.
    pub fn save<C: Clock>(&mut self, execution: &mut ExecutionStateMachine<C>) -> bool {
        let Some(draft) = self.draft.take() else {
            tracing::debug!("save ignored: no occurrence draft open");
            return false;
        };
        let step = draft.step;
        execution.record_ncr(step, draft.into_occurrence())
    }

    /// Record an occurrence directly, without a draft.
    pub fn record<C: Clock>(
        &self,
        execution: &mut ExecutionStateMachine<C>,
        step: usize,
        category: Option<&str>,
        description: Option<&str>,
        photo: Option<NcrPhoto>,
    ) -> bool {
        let occurrence = NcrOccurrence {
            category: category.and_then(non_blank),
            description: description.and_then(non_blank),
            photo,
        };
        execution.record_ncr(step, occurrence)
    }
}
