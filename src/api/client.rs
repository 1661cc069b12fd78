// HTTP client for the checklist backend (`/api/gp/checklist`)

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::source::TemplateSource;
use crate::api::wire::{
    AckResponse, SerialLookupResponse, TemplateListResponse, TemplatePayload, TemplateResponse,
};
use crate::checklist::finalize::RunSubmitter;
use crate::checklist::loader::{from_payload, validate_for_save};
use crate::checklist::types::{ChecklistDefinition, RunRecord};
use crate::config::ApiConfig;
use crate::error::{ChecklistError, TransportError, ValidationError};

const API_PREFIX: [&str; 3] = ["api", "gp", "checklist"];

/// Client for template lookup, template save and run submission.
#[derive(Debug, Clone)]
pub struct ChecklistApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ChecklistApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("qc-checklist/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/api/gp/checklist/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    /// Template for a model.
    pub async fn fetch_template(&self, model: &str) -> Result<ChecklistDefinition, ChecklistError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(ValidationError::EmptyModel.into());
        }
        let url = self.endpoint(&["template", model])?;
        debug!(%url, "Fetching template");
        let (status, body): (_, TemplateResponse) = send_json(self.http.get(url)).await?;
        if !body.ok {
            return Err(rejected(status, body.error).into());
        }
        let payload = body
            .data
            .ok_or_else(|| TransportError::Decode("response carries no template".to_string()))?;
        Ok(from_payload(payload, Some(model))?)
    }

    /// Models that have a stored template.
    pub async fn list_templates(&self) -> Result<Vec<String>, ChecklistError> {
        let url = self.endpoint(&["templates"])?;
        let (status, body): (_, TemplateListResponse) =
            send_json(self.http.get(url)).await?;
        if !body.ok {
            return Err(rejected(status, body.error).into());
        }
        Ok(body.modelos)
    }

    /// Validate locally, then store the template.
    pub async fn save_template(
        &self,
        definition: &ChecklistDefinition,
        max_steps: usize,
    ) -> Result<(), ChecklistError> {
        validate_for_save(definition, max_steps)?;
        let url = self.endpoint(&["template"])?;
        let payload = TemplatePayload::from(definition);
        let (status, body): (_, AckResponse) = send_json(self.http.post(url).json(&payload)).await?;
        if !body.ok {
            return Err(rejected(status, body.error).into());
        }
        info!(model = %definition.model, steps = definition.steps.len(), "Template saved");
        Ok(())
    }

    /// Checklist for a serial number.
    ///
    /// Uses the executor lookup route and falls back to the template-by-serial
    /// shortcut when the former is not served (404).
    pub async fn fetch_by_serial(&self, serial: &str) -> Result<ChecklistDefinition, ChecklistError> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(ValidationError::EmptySerial.into());
        }

        let url = self.endpoint(&["by-serial", serial])?;
        debug!(%url, "Looking up checklist by serial");
        let response = self.http.get(url).send().await.map_err(TransportError::from)?;
        if response.status() != StatusCode::NOT_FOUND {
            let (status, body): (_, SerialLookupResponse) = read_json(response).await?;
            if !body.ok {
                return Err(rejected(status, body.error).into());
            }
            // the envelope's model wins over the one inside the template
            let mut payload = body.data.unwrap_or_default();
            let nested = payload.modelo.take();
            let model = body.modelo.filter(|m| !m.trim().is_empty()).or(nested);
            return Ok(from_payload(payload, model.as_deref())?);
        }

        let url = self.endpoint(&["template-by-serial", serial])?;
        debug!(%url, "Serial lookup route not found; using template-by-serial");
        let (status, body): (_, TemplateResponse) = send_json(self.http.get(url)).await?;
        if !body.ok {
            return Err(rejected(status, body.error).into());
        }
        Ok(from_payload(body.data.unwrap_or_default(), None)?)
    }

    /// POST the run record. Any non-`ok` answer is an error.
    pub async fn submit_run(&self, record: &RunRecord) -> Result<(), TransportError> {
        let url = self.endpoint(&["exec"])?;
        let (status, body): (_, AckResponse) = send_json(self.http.post(url).json(record)).await?;
        if !body.ok {
            return Err(rejected(status, body.error));
        }
        Ok(())
    }
}

#[async_trait]
impl RunSubmitter for ChecklistApiClient {
    async fn submit(&self, record: &RunRecord) -> Result<(), TransportError> {
        self.submit_run(record).await
    }
}

#[async_trait]
impl TemplateSource for ChecklistApiClient {
    async fn load_by_serial(&self, serial: &str) -> Result<ChecklistDefinition, ChecklistError> {
        self.fetch_by_serial(serial).await
    }
}

async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<(StatusCode, T), TransportError> {
    read_json(request.send().await?).await
}

/// Decode a JSON body. Non-2xx statuses become `Rejected`, carrying the
/// backend's `error` field when the body has one.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<(StatusCode, T), TransportError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<AckResponse>(&text)
            .ok()
            .and_then(|ack| ack.error)
            .unwrap_or_else(|| text.trim().to_string());
        warn!(status = status.as_u16(), %message, "Backend rejected request");
        return Err(TransportError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let body = serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?;
    Ok((status, body))
}

fn rejected(status: StatusCode, error: Option<String>) -> TransportError {
    let message = error.unwrap_or_else(|| "request was not accepted".to_string());
    warn!(status = status.as_u16(), %message, "Backend answered ok=false");
    TransportError::Rejected {
        status: status.as_u16(),
        message,
    }
}
