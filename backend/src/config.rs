//! Engine configuration.
//!
//! Settings live in `guardian_config.yaml` inside the data directory. Every
//! field has a default, so a missing file or a partial file is fine.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::household_service::PrimaryGuardian;
use crate::domain::step_up_service::StepUpSettings;

pub const CONFIG_FILE_NAME: &str = "guardian_config.yaml";
pub const DATA_DIR_ENV: &str = "GUARDIAN_DATA_DIR";
pub const BIND_ADDR_ENV: &str = "GUARDIAN_BIND_ADDR";

const APP_DIRECTORY_NAME: &str = "Guardianship Engine";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resolved at load time; never read from the file itself
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub bind_address: String,
    /// Origin allowed by CORS
    pub allowed_origin: String,
    /// App key whose allowlist entry gates EV charging
    pub charging_app_key: String,
    pub default_currency: String,
    pub external_call_timeout_ms: u64,
    pub step_up: StepUpSettings,
    pub primary_guardian: PrimaryGuardian,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bind_address: "127.0.0.1:3000".to_string(),
            allowed_origin: "http://localhost:8080".to_string(),
            charging_app_key: "charging".to_string(),
            default_currency: "USD".to_string(),
            external_call_timeout_ms: 5_000,
            step_up: StepUpSettings::default(),
            primary_guardian: PrimaryGuardian::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration using the environment to locate the data directory
    pub fn load() -> Result<Self> {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let mut config = Self::load_from(&data_dir)?;
        if let Ok(bind_address) = std::env::var(BIND_ADDR_ENV) {
            config.bind_address = bind_address;
        }
        Ok(config)
    }

    /// Load `guardian_config.yaml` from `data_dir`, falling back to defaults
    pub fn load_from(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_yaml::from_str::<EngineConfig>(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            info!("No {} found in {}, using defaults", CONFIG_FILE_NAME, data_dir.display());
            EngineConfig::default()
        };
        config.data_dir = data_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.external_call_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.charging_app_key.trim().is_empty() {
            anyhow::bail!("charging_app_key cannot be empty");
        }
        if self.external_call_timeout_ms == 0 {
            anyhow::bail!("external_call_timeout_ms must be positive");
        }
        if self.step_up.proof_ttl_secs <= 0 || self.step_up.challenge_ttl_secs <= 0 {
            anyhow::bail!("step-up lifetimes must be positive");
        }
        if self.step_up.max_code_attempts == 0 {
            anyhow::bail!("max_code_attempts must be at least 1");
        }
        if self.primary_guardian.password_sha256.is_none() {
            warn!(
                "No password configured for primary guardian {}; only one-time codes can satisfy step-up",
                self.primary_guardian.id
            );
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIRECTORY_NAME)
}
