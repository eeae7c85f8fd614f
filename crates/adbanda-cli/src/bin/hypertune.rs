//! adbanda-hypertune - Bayesian search over classification head hyperparameters

use std::path::PathBuf;

use adbanda_cli::{init_logging, CommonArgs};
use adbanda_core::config::ModelKind;
use adbanda_core::dataset::TrainingData;
use adbanda_core::embedding::{yamnet_path, YamnetModel};
use adbanda_core::hypertune::{training_objective, tuner_dir, SearchSpace, Tuner, TunerSettings};
use adbanda_core::model::Classifier;
use anyhow::{Context, Result};
use clap::Parser;

/// Search hyperparameters for one model configuration
#[derive(Parser, Debug)]
#[command(name = "adbanda-hypertune")]
#[command(about = "Search classification head hyperparameters with Bayesian optimization")]
struct Args {
    /// Model configuration: amt, mo, at or ao
    #[arg(value_name = "CONFIG")]
    kind: ModelKind,

    /// Dataset root with advert/, music/, talk/ (and their .embeddings caches)
    dataset_root: PathBuf,

    /// Number of configurations to try
    #[arg(long, default_value_t = 10)]
    max_trials: usize,

    /// Training runs averaged per configuration
    #[arg(long, default_value_t = 3)]
    executions_per_trial: usize,

    /// Number of best configurations to report
    #[arg(long, default_value_t = 2)]
    top: usize,

    /// Embed the WAV files instead of reading precomputed caches
    #[arg(long)]
    from_audio: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let app = args.common.app_config();
    let name = args.kind.model_name();

    log::info!("Hypertune model {}", name);

    let data = if args.from_audio {
        log::info!("Loading YAMNet model");
        let mut yamnet = YamnetModel::load(&yamnet_path(&app.models_dir))
            .context("Failed to load the embedding model")?;
        TrainingData::from_audio(&mut yamnet, &args.dataset_root, args.kind, &app.train)
    } else {
        TrainingData::from_cache(&args.dataset_root, args.kind, &app.train)
    }
    .with_context(|| format!("Failed to assemble dataset from {:?}", args.dataset_root))?;

    let settings = TunerSettings {
        max_trials: args.max_trials,
        executions_per_trial: args.executions_per_trial,
        top_k: args.top,
        seed: app.train.seed,
        ..TunerSettings::default()
    };
    let tuner = Tuner::new(SearchSpace::default(), settings, tuner_dir(&name));
    tuner.search_space_summary();
    log::info!("Trial artifacts under {:?}", tuner.directory());

    let best = tuner
        .search(training_objective(args.kind, &data, &app.train))
        .context("Hyperparameter search failed")?;

    for (rank, result) in best.iter().enumerate() {
        println!("Best model #{} (score {:.4}):", rank + 1, result.score);
        println!("{}", result.hyperparams);
        if let Some(dir) = &result.model_dir {
            let model = Classifier::load(dir).with_context(|| format!("Failed to load {:?}", dir))?;
            println!("{}", model.summary());
            println!("Weights: {:?}", dir);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_defaults() {
        let args = Args::try_parse_from(["adbanda-hypertune", "amt", "data"]).unwrap();
        assert_eq!(args.max_trials, 10);
        assert_eq!(args.executions_per_trial, 3);
        assert_eq!(args.top, 2);
    }
}
