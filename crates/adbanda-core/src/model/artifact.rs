//! On-disk model artifacts
//!
//! `models/<model-name>/model.yaml` holds the [`ModelConfig`] (grouping, class
//! names, hyperparameters); `model.safetensors` holds the weights.

use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::error::{AdbandaError, Result};

use super::Classifier;

pub const MODEL_CONFIG_FILE: &str = "model.yaml";
pub const MODEL_WEIGHTS_FILE: &str = "model.safetensors";

/// Directory of a named model inside the models directory
pub fn artifact_dir(models_dir: &Path, model_name: &str) -> PathBuf {
    models_dir.join(model_name)
}

impl Classifier {
    /// Write `model.yaml` and `model.safetensors` into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let yaml = serde_yaml::to_string(self.config()).map_err(|e| AdbandaError::InvalidArtifact {
            path: dir.to_path_buf(),
            reason: format!("cannot serialize config: {}", e),
        })?;
        std::fs::write(dir.join(MODEL_CONFIG_FILE), yaml)?;
        self.save_weights(&dir.join(MODEL_WEIGHTS_FILE))?;

        log::info!("Saved model {} to {:?}", self.config().name(), dir);
        Ok(())
    }

    /// Rebuild a head from an artifact directory
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(MODEL_CONFIG_FILE);
        let weights_path = dir.join(MODEL_WEIGHTS_FILE);
        for path in [&config_path, &weights_path] {
            if !path.exists() {
                return Err(AdbandaError::InvalidArtifact {
                    path: dir.to_path_buf(),
                    reason: format!("missing {:?}", path.file_name().unwrap_or_default()),
                });
            }
        }

        let yaml = std::fs::read_to_string(&config_path)?;
        let config: ModelConfig =
            serde_yaml::from_str(&yaml).map_err(|e| AdbandaError::InvalidArtifact {
                path: config_path.clone(),
                reason: e.to_string(),
            })?;
        if config.classes.is_empty() {
            return Err(AdbandaError::InvalidArtifact {
                path: config_path,
                reason: "no classes".to_string(),
            });
        }

        let model = Self::new(config, 0)?;
        model.load_weights(&weights_path)?;
        log::info!("Loaded model {} from {:?}", model.config().name(), dir);
        Ok(model)
    }
}
