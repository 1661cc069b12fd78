// Wire shapes exchanged with the checklist backend

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checklist::types::ChecklistDefinition;

/// One template item as the backend and exported files spell it.
///
/// Numeric fields stay as raw JSON so the loader can accept numbers and
/// numeric strings alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordem: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(default, alias = "tempo_alvo_s", skip_serializing_if = "Option::is_none")]
    pub tempo_seg: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncr_tags: Option<Value>,
}

/// `{ modelo, items }`, the template body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatePayload {
    #[serde(default, alias = "model", skip_serializing_if = "Option::is_none")]
    pub modelo: Option<String>,
    #[serde(default, alias = "itens", skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<WireItem>>,
}

impl From<&ChecklistDefinition> for TemplatePayload {
    fn from(definition: &ChecklistDefinition) -> Self {
        Self {
            modelo: Some(definition.model.clone()),
            items: Some(
                definition
                    .steps
                    .iter()
                    .map(|step| WireItem {
                        ordem: Some(Value::from(step.order)),
                        descricao: Some(step.description.clone()),
                        tempo_seg: Some(Value::from(step.target_seconds)),
                        ncr_tags: Some(Value::from(step.suggested_tags.clone())),
                    })
                    .collect(),
            ),
        }
    }
}

/// `GET /template/<model>` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub data: Option<TemplatePayload>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /by-serial/<serial>` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SerialLookupResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub modelo: Option<String>,
    #[serde(default)]
    pub data: Option<TemplatePayload>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Bare `{ ok, error? }` acknowledgement for saves and submissions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AckResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /templates` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateListResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub modelos: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A manually loaded file holds either the response envelope or the bare body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TemplateFile {
    Envelope { data: TemplatePayload },
    Bare(TemplatePayload),
}

impl TemplateFile {
    pub fn into_payload(self) -> TemplatePayload {
        match self {
            TemplateFile::Envelope { data } => data,
            TemplateFile::Bare(payload) => payload,
        }
    }
}
