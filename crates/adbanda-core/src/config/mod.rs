//! Configuration for training, tuning and prediction
//!
//! - [`ModelKind`] / [`ModelConfig`]: label grouping plus head hyperparameters
//! - [`TrainParams`]: epochs, batch size, validation split, seed
//! - [`AppConfig`]: optional `adbanda.yaml` overriding paths and training params
//!
//! Nothing here is global: seeds and model locations travel inside these
//! values into the dataset and training entry points.

mod hyperparams;
mod io;
mod model;

pub use hyperparams::{
    hp_amt_best, hp_amt_second, hp_at_best, hp_baseline, hp_mo_best, Activation,
    LayerHyperparameters, ModelHyperparameters,
};
pub use io::{load_config, save_config};
pub use model::{ModelConfig, ModelKind, RawClass};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILENAME: &str = "adbanda.yaml";

/// Training loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    pub epochs: usize,
    pub batch_size: usize,
    /// Fraction of the shuffled dataset held out for validation
    pub validation_ratio: f64,
    /// Seed for dataset shuffling, batch order and weight init
    pub seed: u64,
    /// Epochs without validation AUC improvement before stopping
    pub patience: usize,
    /// Weight the loss by inverse class frequency
    pub class_weighting: bool,
    /// Cap on files listed per raw class (audio source only)
    pub max_files_per_class: Option<usize>,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            epochs: 6,
            batch_size: 64,
            validation_ratio: 0.1,
            seed: 1_231_239,
            patience: 10,
            class_weighting: false,
            max_files_per_class: None,
        }
    }
}

impl TrainParams {
    /// Clamp values to usable ranges
    pub fn validate(&mut self) {
        self.epochs = self.epochs.max(1);
        self.batch_size = self.batch_size.max(1);
        self.validation_ratio = self.validation_ratio.clamp(0.0, 0.9);
    }
}

/// Root of `adbanda.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `yamnet.onnx` and trained model artifacts
    pub models_dir: PathBuf,
    /// Directory for per-epoch training history
    pub logs_dir: PathBuf,
    pub train: TrainParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            logs_dir: PathBuf::from("logs"),
            train: TrainParams::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to defaults, and validate
    pub fn load(path: &std::path::Path) -> Self {
        let mut config: AppConfig = load_config(path);
        config.train.validate();
        config
    }
}
