//! Training driver
//!
//! Fits a [`Classifier`] on a [`TrainingData`] split with mini-batch Adam,
//! evaluating the validation subset after every epoch and handing the
//! results to a list of [`Callback`]s.
//!
//! The standard run (see [`train_model`]) uses:
//! - early stopping on validation AUC with best-weight restore,
//! - a best-only weights checkpoint under the system temp directory,
//! - a JSON-lines history at `<logs>/<model-name>/history.jsonl`.

pub mod callbacks;

pub use callbacks::{
    Callback, CallbackAction, EarlyStopping, HistoryLogger, LowValAccuracy, ModelCheckpoint,
    Monitor,
};

use std::path::{Path, PathBuf};

use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, TrainParams};
use crate::dataset::{LabeledSet, TrainingData};
use crate::embedding::Embedding;
use crate::error::{AdbandaError, Result};
use crate::metrics;
use crate::model::{categorical_crossentropy, embeddings_tensor, one_hot, Classifier};

/// Metrics of one finished epoch (1-based)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub auc: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub val_auc: f64,
}

/// All epochs of one run
#[derive(Debug, Clone, Default)]
pub struct History {
    pub epochs: Vec<EpochMetrics>,
}

impl History {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Highest validation accuracy seen, 0.0 for an empty history
    pub fn best_val_accuracy(&self) -> f64 {
        self.epochs
            .iter()
            .map(|m| m.val_accuracy)
            .filter(|v| !v.is_nan())
            .fold(0.0, f64::max)
    }
}

/// Inverse class frequency weights, `total / count_i` (0 for empty classes)
pub fn class_weights(counts: &[usize]) -> Vec<f32> {
    let total: usize = counts.iter().sum();
    counts
        .iter()
        .map(|&count| {
            if count == 0 {
                0.0
            } else {
                total as f32 / count as f32
            }
        })
        .collect()
}

/// Mini-batch training loop
pub struct Trainer {
    params: TrainParams,
    callbacks: Vec<Box<dyn Callback>>,
}

impl Trainer {
    pub fn new(params: TrainParams) -> Self {
        Self {
            params,
            callbacks: Vec::new(),
        }
    }

    pub fn with_callback(mut self, callback: impl Callback + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Train `model` in place and return the per-epoch history
    pub fn fit(&mut self, model: &Classifier, data: &TrainingData) -> Result<History> {
        let train = &data.train;
        let validation = &data.validation;

        if train.is_empty() {
            return Err(AdbandaError::InvalidInput("training set is empty".to_string()));
        }
        if train.num_classes() != model.output_units() {
            return Err(AdbandaError::InvalidInput(format!(
                "dataset has {} classes, model outputs {}",
                train.num_classes(),
                model.output_units()
            )));
        }
        if validation.is_empty() {
            log::warn!("Validation set is empty, validation metrics will be NaN");
        }

        let weights = if self.params.class_weighting {
            let weights = class_weights(&train.class_counts());
            log::info!("Class weights: {:?}", weights);
            Some(weights)
        } else {
            None
        };

        let mut optimizer = AdamW::new(
            model.vars(),
            ParamsAdamW {
                lr: model.config().hyperparams.learning_rate,
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-7,
                weight_decay: 0.0,
            },
        )?;

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history = History::default();

        for epoch in 1..=self.params.epochs {
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0f64;
            let mut seen_probs = Vec::with_capacity(train.len());
            let mut seen_labels = Vec::with_capacity(train.len());

            for batch in order.chunks(self.params.batch_size.max(1)) {
                let (rows, labels) = gather(train, batch);
                let xs = embeddings_tensor(&rows, model.device())?;
                let targets = one_hot(&labels, train.num_classes(), model.device())?;
                let sample_weights = match &weights {
                    Some(w) => {
                        let per_row: Vec<f32> = labels.iter().map(|&l| w[l]).collect();
                        Some(Tensor::from_vec(per_row, labels.len(), model.device())?)
                    }
                    None => None,
                };

                let probs = model.forward_t(&xs, true)?;
                let loss = categorical_crossentropy(&probs, &targets, sample_weights.as_ref())?;
                optimizer.backward_step(&loss)?;

                loss_sum += loss.to_scalar::<f32>()? as f64 * batch.len() as f64;
                seen_probs.extend(probs.to_vec2::<f32>()?);
                seen_labels.extend(labels);
            }

            let (val_loss, val_accuracy, val_auc) = evaluate(model, validation)?;
            let epoch_metrics = EpochMetrics {
                epoch,
                loss: loss_sum / train.len() as f64,
                accuracy: metrics::accuracy(&seen_probs, &seen_labels),
                auc: metrics::roc_auc(&seen_probs, &seen_labels),
                val_loss,
                val_accuracy,
                val_auc,
            };
            log::info!(
                "Epoch {}/{} - loss: {:.4} - accuracy: {:.4} - auc: {:.4} - \
                 val_loss: {:.4} - val_accuracy: {:.4} - val_auc: {:.4}",
                epoch,
                self.params.epochs,
                epoch_metrics.loss,
                epoch_metrics.accuracy,
                epoch_metrics.auc,
                epoch_metrics.val_loss,
                epoch_metrics.val_accuracy,
                epoch_metrics.val_auc
            );

            let mut stop = false;
            for callback in &mut self.callbacks {
                if callback.on_epoch_end(&epoch_metrics, model)? == CallbackAction::Stop {
                    stop = true;
                }
            }
            history.epochs.push(epoch_metrics);
            if stop {
                break;
            }
        }

        for callback in &mut self.callbacks {
            callback.on_train_end(model)?;
        }
        Ok(history)
    }
}

fn gather<'a>(
    set: &'a LabeledSet<Embedding>,
    indices: &[usize],
) -> (Vec<&'a Embedding>, Vec<usize>) {
    let samples = set.samples();
    indices
        .iter()
        .map(|&i| (&samples[i].0, samples[i].1))
        .unzip()
}

/// `(loss, accuracy, auc)` of the model on a labeled set; NaN when empty
pub fn evaluate(model: &Classifier, set: &LabeledSet<Embedding>) -> Result<(f64, f64, f64)> {
    if set.is_empty() {
        return Ok((f64::NAN, f64::NAN, f64::NAN));
    }
    let embeddings: Vec<&Embedding> = set.iter().map(|(e, _)| e).collect();
    let labels: Vec<usize> = set.labels().collect();
    let probs = model.predict(&embeddings)?;
    Ok((
        metrics::cross_entropy(&probs, &labels),
        metrics::accuracy(&probs, &labels),
        metrics::roc_auc(&probs, &labels),
    ))
}

/// Files written by a standard training run
#[derive(Debug, Clone)]
pub struct TrainingOutputs {
    pub history_file: PathBuf,
    pub checkpoint_file: PathBuf,
}

impl TrainingOutputs {
    /// `<logs>/<model>/history.jsonl` and `<tmp>/adbanda-checkpoint/<model>.safetensors`
    pub fn for_model(logs_dir: &Path, model_name: &str) -> Self {
        Self {
            history_file: logs_dir.join(model_name).join("history.jsonl"),
            checkpoint_file: std::env::temp_dir()
                .join("adbanda-checkpoint")
                .join(format!("{}.safetensors", model_name)),
        }
    }
}

/// Build a fresh head for `config` and train it with the standard callbacks
pub fn train_model(
    config: ModelConfig,
    data: &TrainingData,
    params: &TrainParams,
    outputs: &TrainingOutputs,
) -> Result<(Classifier, History)> {
    let model = Classifier::new(config, params.seed)?;
    log::info!("Hyperparameters:\n{}", model.config().hyperparams);
    log::info!("{}", model.summary());

    let mut trainer = Trainer::new(params.clone())
        .with_callback(EarlyStopping::new(Monitor::ValAuc, params.patience, true))
        .with_callback(ModelCheckpoint::new(&outputs.checkpoint_file, Monitor::ValAuc))
        .with_callback(HistoryLogger::create(&outputs.history_file)?);

    let history = trainer.fit(&model, data)?;
    Ok((model, history))
}
