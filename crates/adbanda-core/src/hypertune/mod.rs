//! Bayesian hyperparameter search for the classification head
//!
//! Each trial picks a point of the [`SearchSpace`], decodes it into
//! [`ModelHyperparameters`] and scores it by running the objective
//! `executions_per_trial` times and averaging. The first trials are sampled
//! at random; afterwards a Gaussian process fitted on all scored points
//! proposes the candidate with the highest upper confidence bound among
//! random samples.
//!
//! The best execution of every trial keeps its weights under the tuner
//! directory (`trial_<n>/`), next to a `trial.json` with its configuration
//! and score. The directory is wiped at the start of each search.

mod gp;
mod space;

pub use gp::GaussianProcess;
pub use space::SearchSpace;

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelHyperparameters, ModelKind, TrainParams};
use crate::dataset::TrainingData;
use crate::error::{AdbandaError, Result};
use crate::model::Classifier;
use crate::training::{LowValAccuracy, Trainer};

/// Budget and behavior of a search
#[derive(Debug, Clone)]
pub struct TunerSettings {
    pub max_trials: usize,
    pub executions_per_trial: usize,
    /// Trials sampled at random before the surrogate takes over
    pub initial_random_trials: usize,
    /// Random candidates scored by the acquisition function per proposal
    pub candidates: usize,
    /// Number of configurations returned
    pub top_k: usize,
    pub seed: u64,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            max_trials: 10,
            executions_per_trial: 3,
            initial_random_trials: 3,
            candidates: 512,
            top_k: 2,
            seed: 1_231_239,
        }
    }
}

/// Outcome of one execution of a trial
pub struct Execution {
    pub score: f64,
    /// Trained head, kept when this is the trial's best execution
    pub model: Option<Classifier>,
}

/// A scored trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: usize,
    pub hyperparams: ModelHyperparameters,
    /// Mean of the execution scores
    pub score: f64,
    pub execution_scores: Vec<f64>,
    /// Artifact directory of the best execution's weights
    pub model_dir: Option<PathBuf>,
}

/// `<tmp>/adbanda-tuner/<model-name>`
pub fn tuner_dir(model_name: &str) -> PathBuf {
    std::env::temp_dir().join("adbanda-tuner").join(model_name)
}

pub struct Tuner {
    space: SearchSpace,
    settings: TunerSettings,
    directory: PathBuf,
}

impl Tuner {
    pub fn new(space: SearchSpace, settings: TunerSettings, directory: impl Into<PathBuf>) -> Self {
        Self {
            space,
            settings,
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Log the bounds being searched
    pub fn search_space_summary(&self) {
        let s = &self.space;
        log::info!("Search space summary");
        log::info!("  num_layers: {}..={}", s.min_layers, s.max_layers);
        log::info!("  units_i: {}..={} step {}", s.min_units, s.max_units, s.units_step);
        log::info!("  has_dropout_i: bool, dropout_i: {}..={}", s.min_dropout, s.max_dropout);
        log::info!("  layer_activation: {:?}", s.layer_activations);
        log::info!("  output_activation: {:?}", s.output_activations);
        log::info!("  lr: {:e}..={:e} (log)", s.min_learning_rate, s.max_learning_rate);
    }

    /// Run the search and return the top configurations, best first.
    ///
    /// `objective` is called with the trial's hyperparameters and the
    /// execution index and returns the execution's score (higher is better).
    pub fn search<F>(&self, mut objective: F) -> Result<Vec<TrialResult>>
    where
        F: FnMut(&ModelHyperparameters, usize) -> Result<Execution>,
    {
        if self.directory.exists() {
            std::fs::remove_dir_all(&self.directory)?;
        }
        std::fs::create_dir_all(&self.directory)?;

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut points: Vec<Vec<f64>> = Vec::new();
        let mut scores: Vec<f64> = Vec::new();
        let mut trials = Vec::with_capacity(self.settings.max_trials);

        for trial in 0..self.settings.max_trials {
            let point = self.next_point(&points, &scores, trial, &mut rng);
            let hyperparams = self.space.decode(&point);
            log::info!("Trial {}/{}:\n{}", trial + 1, self.settings.max_trials, hyperparams);

            let result = self.run_trial(trial, hyperparams, &mut objective)?;
            log::info!("Trial {} score: {:.4}", trial + 1, result.score);

            points.push(point);
            scores.push(result.score);
            trials.push(result);
        }

        trials.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.results_summary(&trials);
        trials.truncate(self.settings.top_k);
        Ok(trials)
    }

    fn next_point(
        &self,
        points: &[Vec<f64>],
        scores: &[f64],
        trial: usize,
        rng: &mut StdRng,
    ) -> Vec<f64> {
        if trial < self.settings.initial_random_trials || points.len() < 2 {
            return self.space.random_point(rng);
        }

        let Some(gp) = GaussianProcess::fit(points, scores, gp::LENGTH_SCALE, gp::NOISE) else {
            log::warn!("Surrogate fit failed, sampling at random");
            return self.space.random_point(rng);
        };

        (0..self.settings.candidates.max(1))
            .map(|_| self.space.random_point(rng))
            .map(|candidate| (gp.ucb(&candidate, gp::UCB_BETA), candidate))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate)
            .unwrap_or_else(|| self.space.random_point(rng))
    }

    fn run_trial<F>(
        &self,
        trial: usize,
        hyperparams: ModelHyperparameters,
        objective: &mut F,
    ) -> Result<TrialResult>
    where
        F: FnMut(&ModelHyperparameters, usize) -> Result<Execution>,
    {
        let trial_dir = self.directory.join(format!("trial_{:02}", trial));
        std::fs::create_dir_all(&trial_dir)?;

        let mut execution_scores = Vec::with_capacity(self.settings.executions_per_trial);
        let mut best: Option<(f64, Classifier)> = None;

        for execution in 0..self.settings.executions_per_trial.max(1) {
            let Execution { score, model } = objective(&hyperparams, execution)?;
            let score = if score.is_nan() { 0.0 } else { score };
            execution_scores.push(score);

            if let Some(model) = model {
                if best.as_ref().map_or(true, |(s, _)| score > *s) {
                    best = Some((score, model));
                }
            }
        }

        let model_dir = match best {
            Some((_, model)) => {
                let dir = trial_dir.join("model");
                model.save(&dir)?;
                Some(dir)
            }
            None => None,
        };

        let result = TrialResult {
            trial,
            hyperparams,
            score: execution_scores.iter().sum::<f64>() / execution_scores.len() as f64,
            execution_scores,
            model_dir,
        };

        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| AdbandaError::InvalidInput(format!("Cannot serialize trial: {}", e)))?;
        std::fs::write(trial_dir.join("trial.json"), json)?;

        Ok(result)
    }

    fn results_summary(&self, sorted: &[TrialResult]) {
        log::info!("Results summary ({} trials, results in {:?})", sorted.len(), self.directory);
        for result in sorted.iter().take(self.settings.top_k) {
            log::info!(
                "Trial {} score {:.4}:\n{}",
                result.trial + 1,
                result.score,
                result.hyperparams
            );
        }
    }
}

/// Epochs each execution trains for
pub const SEARCH_EPOCHS: usize = 5;

/// Objective that trains a head on half of the training subset for a few
/// epochs and scores it by its best validation accuracy.
///
/// Executions use different seeds so their initializations differ; runs
/// whose validation accuracy falls below 0.80 are cut short.
pub fn training_objective<'a>(
    kind: ModelKind,
    data: &'a TrainingData,
    params: &'a TrainParams,
) -> impl FnMut(&ModelHyperparameters, usize) -> Result<Execution> + 'a {
    let half = TrainingData {
        train: data.train.clone().take(data.train.len() / 2),
        validation: data.validation.clone(),
    };

    move |hyperparams: &ModelHyperparameters, execution: usize| {
        let seed = params.seed.wrapping_add(execution as u64);
        let config = ModelConfig::with_hyperparameters(kind, hyperparams.clone());
        let model = Classifier::new(config, seed)?;
        let search_params = TrainParams {
            epochs: SEARCH_EPOCHS,
            seed,
            ..params.clone()
        };

        let history = Trainer::new(search_params)
            .with_callback(LowValAccuracy::default())
            .fit(&model, &half)?;

        Ok(Execution {
            score: history.best_val_accuracy(),
            model: Some(model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::tests::separable_data;

    fn fast_settings(max_trials: usize) -> TunerSettings {
        TunerSettings {
            max_trials,
            executions_per_trial: 2,
            initial_random_trials: 2,
            candidates: 64,
            top_k: 2,
            seed: 7,
        }
    }

    /// Prefers learning rates near 1e-3
    fn lr_score(hp: &ModelHyperparameters) -> f64 {
        1.0 - (hp.learning_rate.log10() + 3.0).abs() / 3.0
    }

    #[test]
    fn test_search_returns_top_k_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let tuner = Tuner::new(SearchSpace::default(), fast_settings(6), dir.path().join("tuner"));

        let mut calls = 0;
        let results = tuner
            .search(|hp, _| {
                calls += 1;
                Ok(Execution {
                    score: lr_score(hp),
                    model: None,
                })
            })
            .unwrap();

        assert_eq!(calls, 12);
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].execution_scores.len(), 2);
        assert!(dir
            .path()
            .join("tuner")
            .join(format!("trial_{:02}", results[0].trial))
            .join("trial.json")
            .exists());
    }

    #[test]
    fn test_search_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let run = || {
            Tuner::new(SearchSpace::default(), fast_settings(5), dir.path().join("t"))
                .search(|hp, _| {
                    Ok(Execution {
                        score: lr_score(hp),
                        model: None,
                    })
                })
                .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a[0].hyperparams, b[0].hyperparams);
        assert_eq!(a[0].score, b[0].score);
    }

    #[test]
    fn test_search_overwrites_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let tuner_dir = dir.path().join("tuner");
        std::fs::create_dir_all(tuner_dir.join("stale")).unwrap();

        Tuner::new(SearchSpace::default(), fast_settings(1), &tuner_dir)
            .search(|_, _| Ok(Execution { score: 0.5, model: None }))
            .unwrap();
        assert!(!tuner_dir.join("stale").exists());
    }

    #[test]
    fn test_training_objective_saves_best_weights() {
        let dir = tempfile::tempdir().unwrap();
        let data = separable_data(10);
        let params = TrainParams {
            batch_size: 8,
            ..TrainParams::default()
        };
        let space = SearchSpace {
            max_layers: 1,
            max_units: 64,
            ..SearchSpace::default()
        };
        let settings = TunerSettings {
            max_trials: 1,
            executions_per_trial: 1,
            top_k: 1,
            ..TunerSettings::default()
        };

        let results = Tuner::new(space, settings, dir.path().join("tuner"))
            .search(training_objective(ModelKind::At, &data, &params))
            .unwrap();

        let model_dir = results[0].model_dir.clone().unwrap();
        let loaded = Classifier::load(&model_dir).unwrap();
        assert_eq!(loaded.config().hyperparams, results[0].hyperparams);
    }

    #[test]
    fn test_tuner_dir_layout() {
        assert!(tuner_dir("adbanda_mo").ends_with("adbanda-tuner/adbanda_mo"));
    }
}
