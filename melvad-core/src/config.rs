//! JSON configuration file.
//!
//! ```json
//! {
//!   "features": { "durationMs": 20, "filtersCount": 26, "zeroEnergy": "floor" },
//!   "svm": { "kernel": "rbf", "gamma": 0.0, "cost": 1.0, "tolerance": 0.001, ... },
//!   "modelPath": "melvad.model.json"
//! }
//! ```
//!
//! Every field is optional; omitted fields take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VadError};
use crate::features::FeatureConfig;
use crate::svm::Hyperparameters;

pub const DEFAULT_MODEL_PATH: &str = "melvad.model.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct VadConfig {
    pub features: FeatureConfig,
    pub svm: Hyperparameters,
    pub model_path: PathBuf,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            svm: Hyperparameters::default(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl VadConfig {
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        if self.model_path.as_os_str().is_empty() {
            return Err(VadError::Configuration("modelPath must not be empty".into()));
        }
        Ok(())
    }
}

/// Read a config file. A missing file yields the defaults.
///
/// # Errors
/// `VadError::Configuration` for unreadable, malformed or invalid files.
pub fn load_config(path: &Path) -> Result<VadConfig> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(VadConfig::default());
        }
        Err(e) => {
            return Err(VadError::Configuration(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };
    let config: VadConfig = serde_json::from_str(&raw)
        .map_err(|e| VadError::Configuration(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &VadConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| VadError::Configuration(e.to_string()))?;
    fs::write(path, json)?;
    Ok(())
}
