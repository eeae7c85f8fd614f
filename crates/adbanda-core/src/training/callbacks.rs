//! Per-epoch training callbacks

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use candle_core::Tensor;

use crate::error::Result;
use crate::model::Classifier;

use super::EpochMetrics;

/// What the training loop should do after an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    Stop,
}

/// Hook invoked by the training loop
pub trait Callback {
    fn on_epoch_end(
        &mut self,
        metrics: &EpochMetrics,
        model: &Classifier,
    ) -> Result<CallbackAction>;

    fn on_train_end(&mut self, _model: &Classifier) -> Result<()> {
        Ok(())
    }
}

/// Validation quantity watched by a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monitor {
    ValAuc,
    ValLoss,
}

impl Monitor {
    pub fn value(&self, metrics: &EpochMetrics) -> f64 {
        match self {
            Self::ValAuc => metrics.val_auc,
            Self::ValLoss => metrics.val_loss,
        }
    }

    /// Whether `current` beats `best`
    pub fn improves(&self, current: f64, best: Option<f64>) -> bool {
        if current.is_nan() {
            return false;
        }
        match (self, best) {
            (_, None) => true,
            (Self::ValLoss, Some(best)) => current < best,
            (_, Some(best)) => current > best,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ValAuc => "val_auc",
            Self::ValLoss => "val_loss",
        }
    }
}

/// Stop when the monitored value has not improved for `patience` epochs.
///
/// With `restore_best_weights` the model ends training with the weights of
/// its best epoch.
pub struct EarlyStopping {
    monitor: Monitor,
    patience: usize,
    restore_best_weights: bool,
    best: Option<f64>,
    best_epoch: usize,
    best_weights: Option<Vec<Tensor>>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(monitor: Monitor, patience: usize, restore_best_weights: bool) -> Self {
        Self {
            monitor,
            patience,
            restore_best_weights,
            best: None,
            best_epoch: 0,
            best_weights: None,
            wait: 0,
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

impl Callback for EarlyStopping {
    fn on_epoch_end(
        &mut self,
        metrics: &EpochMetrics,
        model: &Classifier,
    ) -> Result<CallbackAction> {
        let current = self.monitor.value(metrics);
        if self.monitor.improves(current, self.best) {
            self.best = Some(current);
            self.best_epoch = metrics.epoch;
            self.wait = 0;
            if self.restore_best_weights {
                self.best_weights = Some(model.snapshot()?);
            }
            return Ok(CallbackAction::Continue);
        }

        self.wait += 1;
        if self.wait >= self.patience {
            log::info!(
                "Epoch {}: early stopping, best {} was {:.4} at epoch {}",
                metrics.epoch,
                self.monitor.name(),
                self.best.unwrap_or(f64::NAN),
                self.best_epoch
            );
            return Ok(CallbackAction::Stop);
        }
        Ok(CallbackAction::Continue)
    }

    fn on_train_end(&mut self, model: &Classifier) -> Result<()> {
        if let Some(weights) = self.best_weights.take() {
            log::info!("Restoring model weights from epoch {}", self.best_epoch);
            model.restore(&weights)?;
        }
        Ok(())
    }
}

/// Save the weights whenever the monitored value improves
pub struct ModelCheckpoint {
    path: PathBuf,
    monitor: Monitor,
    best: Option<f64>,
}

impl ModelCheckpoint {
    pub fn new(path: impl Into<PathBuf>, monitor: Monitor) -> Self {
        Self {
            path: path.into(),
            monitor,
            best: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Callback for ModelCheckpoint {
    fn on_epoch_end(
        &mut self,
        metrics: &EpochMetrics,
        model: &Classifier,
    ) -> Result<CallbackAction> {
        let current = self.monitor.value(metrics);
        if self.monitor.improves(current, self.best) {
            log::debug!(
                "Epoch {}: {} improved to {:.4}, saving {:?}",
                metrics.epoch,
                self.monitor.name(),
                current,
                self.path
            );
            self.best = Some(current);
            model.save_weights(&self.path)?;
        }
        Ok(CallbackAction::Continue)
    }
}

/// Append every epoch's metrics as one JSON line
pub struct HistoryLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl HistoryLogger {
    /// Create (or truncate) the history file
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(File::create(path)?),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Callback for HistoryLogger {
    fn on_epoch_end(
        &mut self,
        metrics: &EpochMetrics,
        _model: &Classifier,
    ) -> Result<CallbackAction> {
        let line = serde_json::to_string(metrics)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(CallbackAction::Continue)
    }
}

/// Abort a run whose validation accuracy falls below a threshold
pub struct LowValAccuracy {
    threshold: f64,
}

impl LowValAccuracy {
    pub const DEFAULT_THRESHOLD: f64 = 0.80;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for LowValAccuracy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl Callback for LowValAccuracy {
    fn on_epoch_end(
        &mut self,
        metrics: &EpochMetrics,
        _model: &Classifier,
    ) -> Result<CallbackAction> {
        // No validation data this epoch
        if metrics.val_accuracy.is_nan() || metrics.val_accuracy >= self.threshold {
            return Ok(CallbackAction::Continue);
        }
        log::info!(
            "val_accuracy={:.3} is below threshold {:.3}, terminating training",
            metrics.val_accuracy,
            self.threshold
        );
        Ok(CallbackAction::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{hp_at_best, ModelConfig, ModelKind};
    use crate::embedding::EMBEDDING_DIM;

    fn metrics(epoch: usize, val_auc: f64, val_accuracy: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            loss: 0.5,
            accuracy: 0.5,
            auc: 0.5,
            val_loss: 0.5,
            val_accuracy,
            val_auc,
        }
    }

    fn model() -> Classifier {
        seeded_model(0)
    }

    fn seeded_model(seed: u64) -> Classifier {
        let config = ModelConfig::with_hyperparameters(ModelKind::At, hp_at_best());
        Classifier::new(config, seed).unwrap()
    }

    fn step(cb: &mut impl Callback, m: EpochMetrics, model: &Classifier) -> CallbackAction {
        cb.on_epoch_end(&m, model).unwrap()
    }

    #[test]
    fn test_early_stopping_waits_for_patience() {
        let model = model();
        let mut cb = EarlyStopping::new(Monitor::ValAuc, 2, false);
        assert_eq!(step(&mut cb, metrics(1, 0.7, 0.0), &model), CallbackAction::Continue);
        assert_eq!(step(&mut cb, metrics(2, 0.6, 0.0), &model), CallbackAction::Continue);
        assert_eq!(step(&mut cb, metrics(3, 0.7, 0.0), &model), CallbackAction::Stop);
        assert_eq!(cb.best(), Some(0.7));
    }

    #[test]
    fn test_early_stopping_resets_on_improvement() {
        let model = model();
        let mut cb = EarlyStopping::new(Monitor::ValAuc, 2, false);
        step(&mut cb, metrics(1, 0.5, 0.0), &model);
        step(&mut cb, metrics(2, 0.4, 0.0), &model);
        assert_eq!(step(&mut cb, metrics(3, 0.8, 0.0), &model), CallbackAction::Continue);
        assert_eq!(step(&mut cb, metrics(4, 0.8, 0.0), &model), CallbackAction::Continue);
    }

    #[test]
    fn test_early_stopping_restores_best_weights() {
        let model = model();
        let other = seeded_model(9);
        let input = vec![vec![0.25; EMBEDDING_DIM]];
        let best_predictions = model.predict(&input).unwrap();

        let mut cb = EarlyStopping::new(Monitor::ValAuc, 5, true);
        step(&mut cb, metrics(1, 0.9, 0.9), &model);

        model.restore(&other.snapshot().unwrap()).unwrap();
        assert_ne!(model.predict(&input).unwrap(), best_predictions);
        step(&mut cb, metrics(2, 0.5, 0.5), &model);

        cb.on_train_end(&model).unwrap();
        assert_eq!(model.predict(&input).unwrap(), best_predictions);
    }

    #[test]
    fn test_early_stopping_without_restore_keeps_last_weights() {
        let model = model();
        let other = seeded_model(9);
        let input = vec![vec![0.25; EMBEDDING_DIM]];

        let mut cb = EarlyStopping::new(Monitor::ValAuc, 5, false);
        step(&mut cb, metrics(1, 0.9, 0.9), &model);
        model.restore(&other.snapshot().unwrap()).unwrap();
        cb.on_train_end(&model).unwrap();
        assert_eq!(model.predict(&input).unwrap(), other.predict(&input).unwrap());
    }

    #[test]
    fn test_val_loss_improves_downwards() {
        assert!(Monitor::ValLoss.improves(0.1, Some(0.2)));
        assert!(!Monitor::ValAuc.improves(0.1, Some(0.2)));
        assert!(!Monitor::ValAuc.improves(f64::NAN, None));
    }

    #[test]
    fn test_checkpoint_saves_only_on_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.safetensors");
        let model = model();
        let mut cb = ModelCheckpoint::new(&path, Monitor::ValAuc);

        cb.on_epoch_end(&metrics(1, 0.9, 0.0), &model).unwrap();
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();

        cb.on_epoch_end(&metrics(2, 0.8, 0.0), &model).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_history_logger_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("history.jsonl");
        let model = model();
        let mut cb = HistoryLogger::create(&path).unwrap();
        cb.on_epoch_end(&metrics(1, 0.6, 0.5), &model).unwrap();
        cb.on_epoch_end(&metrics(2, 0.7, 0.6), &model).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["epoch"], 2);
    }

    #[test]
    fn test_low_val_accuracy_stops() {
        let model = model();
        let mut cb = LowValAccuracy::default();
        assert_eq!(step(&mut cb, metrics(1, 0.9, 0.85), &model), CallbackAction::Continue);
        assert_eq!(step(&mut cb, metrics(2, 0.9, 0.5), &model), CallbackAction::Stop);
    }

    #[test]
    fn test_low_val_accuracy_ignores_missing_validation() {
        let model = model();
        let mut cb = LowValAccuracy::default();
        assert_eq!(step(&mut cb, metrics(1, f64::NAN, f64::NAN), &model), CallbackAction::Continue);
    }
}
