use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checklist::loader::MAX_STEPS;
use crate::checklist::types::TOLERANCE_PERCENT;

/// Main configuration structure for qc-checklist
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChecklistConfig {
    /// Checklist backend
    pub api: ApiConfig,
    /// Execution timing
    pub execution: ExecutionConfig,
    /// Offline template lookup
    pub templates: TemplatesConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend serving `/api/gp/checklist`
    pub base_url: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Press-and-hold time before a step starts
    pub hold_ms: u64,
    /// Share of the target time required before pass/fail unlocks
    pub tolerance_percent: u32,
    /// Host tick cadence
    pub tick_ms: u64,
    /// Builder limit on items per template
    pub max_steps: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory of `<model>.json` files used when the backend is unreachable
    pub directory: Option<PathBuf>,
    /// Third serial digit -> model
    pub serial_models: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level / filter directive
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            hold_ms: 1000,
            tolerance_percent: TOLERANCE_PERCENT,
            tick_ms: 250,
            max_steps: MAX_STEPS,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            execution: ExecutionConfig::default(),
            templates: TemplatesConfig {
                directory: None,
                serial_models: default_serial_models(),
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_serial_models() -> BTreeMap<String, String> {
    [("1", "PM2100"), ("2", "PM2200"), ("7", "PM700")]
        .into_iter()
        .map(|(digit, model)| (digit.to_string(), model.to_string()))
        .collect()
}

impl ExecutionConfig {
    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ChecklistConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (qc-checklist.toml, .qc-checklist-rc)
    /// 3. Environment variables (prefixed with QC_CHECKLIST, `__` between levels)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`ChecklistConfig::load`], looking for files under `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        let main = dir.join("qc-checklist.toml");
        if main.exists() {
            builder = builder.add_source(File::from(main));
        }

        let rc = dir.join(".qc-checklist-rc");
        if rc.exists() {
            builder = builder.add_source(File::from(rc).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("QC_CHECKLIST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut loaded: ChecklistConfig = config.try_deserialize()?;
        if loaded.templates.serial_models.is_empty() {
            loaded.templates.serial_models = default_serial_models();
        }
        Ok(loaded)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ChecklistConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = ChecklistConfig::load_env_file();
        ChecklistConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ChecklistConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (call this early in main)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_operator_expectations() {
        let config = ChecklistConfig::default();
        assert_eq!(config.execution.hold_duration(), Duration::from_millis(1000));
        assert_eq!(config.execution.tolerance_percent, 90);
        assert_eq!(config.execution.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.templates.serial_models.get("7").map(String::as_str), Some("PM700"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("qc-checklist.toml"),
            "[api]\nbase_url = \"http://bench8:8080\"\n\n[execution]\nhold_ms = 1500\n",
        )
        .unwrap();

        let config = ChecklistConfig::load_from(dir.path()).unwrap();

        assert_eq!(config.api.base_url, "http://bench8:8080");
        assert_eq!(config.api.timeout_seconds, 15);
        assert_eq!(config.execution.hold_ms, 1500);
        assert_eq!(config.execution.tolerance_percent, 90);
        assert!(!config.templates.serial_models.is_empty());
    }

    #[test]
    fn test_save_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qc-checklist.toml");
        let mut config = ChecklistConfig::default();
        config.execution.tick_ms = 100;

        config.save_to_file(&path).unwrap();
        let loaded = ChecklistConfig::load_from(dir.path()).unwrap();

        assert_eq!(loaded.execution.tick_ms, 100);
    }
}
