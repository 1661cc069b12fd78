// Where checklists come from when a serial is entered

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::checklist::loader::{infer_model_from_serial, load_file};
use crate::checklist::types::ChecklistDefinition;
use crate::config::TemplatesConfig;
use crate::error::{ChecklistError, TransportError, ValidationError};

/// Resolves the checklist to run for a serial number.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn load_by_serial(&self, serial: &str) -> Result<ChecklistDefinition, ChecklistError>;
}

/// Offline source: infers the model from the serial and reads
/// `<directory>/<model>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateSource {
    directory: PathBuf,
    serial_models: BTreeMap<String, String>,
}

impl DirectoryTemplateSource {
    pub fn new(directory: impl Into<PathBuf>, serial_models: BTreeMap<String, String>) -> Self {
        Self {
            directory: directory.into(),
            serial_models,
        }
    }

    /// `None` when no directory is configured.
    pub fn from_config(config: &TemplatesConfig) -> Option<Self> {
        config
            .directory
            .as_ref()
            .map(|dir| Self::new(dir, config.serial_models.clone()))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn template_path(&self, model: &str) -> PathBuf {
        self.directory.join(format!("{}.json", model))
    }
}

#[async_trait]
impl TemplateSource for DirectoryTemplateSource {
    async fn load_by_serial(&self, serial: &str) -> Result<ChecklistDefinition, ChecklistError> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(ValidationError::EmptySerial.into());
        }
        let model = infer_model_from_serial(serial, &self.serial_models)
            .ok_or_else(|| ValidationError::UnknownSerialModel(serial.to_string()))?;

        let path = self.template_path(&model);
        if !path.exists() {
            return Err(TransportError::Source(format!(
                "no template for {} at {}",
                model,
                path.display()
            ))
            .into());
        }

        let mut definition = load_file(&path)?;
        if definition.model.is_empty() {
            definition.model = model;
        }
        Ok(definition)
    }
}
