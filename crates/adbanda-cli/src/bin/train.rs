//! adbanda-train - fit a classification head and save it under the models directory

use std::path::PathBuf;

use adbanda_cli::{init_logging, CommonArgs};
use adbanda_core::config::{save_config, ModelConfig, ModelKind};
use adbanda_core::dataset::TrainingData;
use adbanda_core::embedding::{yamnet_path, YamnetModel};
use adbanda_core::model::artifact_dir;
use adbanda_core::training::{train_model, TrainingOutputs};
use anyhow::{Context, Result};
use clap::Parser;

/// Train an adbanda model on a dataset root
#[derive(Parser, Debug)]
#[command(name = "adbanda-train")]
#[command(about = "Train an advert/music/talk classifier on YAMNet embeddings")]
struct Args {
    /// Model configuration: amt, mo, at or ao
    #[arg(value_name = "CONFIG")]
    kind: ModelKind,

    /// Dataset root with advert/, music/, talk/ (and their .embeddings caches)
    dataset_root: PathBuf,

    /// Embed the WAV files instead of reading precomputed caches
    #[arg(long)]
    from_audio: bool,

    /// Number of epochs (overrides the config file)
    #[arg(long)]
    epochs: Option<usize>,

    /// Weight the loss by inverse class frequency
    #[arg(long)]
    class_weights: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut app = args.common.app_config();
    if let Some(epochs) = args.epochs {
        app.train.epochs = epochs;
    }
    if args.class_weights {
        app.train.class_weighting = true;
    }
    app.train.validate();

    let config = ModelConfig::for_kind(args.kind);
    let name = config.name();
    log::info!("Train model {}", name);

    let data = if args.from_audio {
        log::info!("Loading YAMNet model");
        let mut yamnet = YamnetModel::load(&yamnet_path(&app.models_dir))
            .context("Failed to load the embedding model")?;
        TrainingData::from_audio(&mut yamnet, &args.dataset_root, args.kind, &app.train)
    } else {
        TrainingData::from_cache(&args.dataset_root, args.kind, &app.train)
    }
    .with_context(|| format!("Failed to assemble dataset from {:?}", args.dataset_root))?;

    let outputs = TrainingOutputs::for_model(&app.logs_dir, &name);
    if let Some(run_dir) = outputs.history_file.parent() {
        save_config(&app, &run_dir.join("config.yaml"))?;
    }
    let (model, history) =
        train_model(config, &data, &app.train, &outputs).context("Training failed")?;

    let dir = artifact_dir(&app.models_dir, &name);
    model
        .save(&dir)
        .with_context(|| format!("Failed to save model to {:?}", dir))?;

    log::info!(
        "Done after {} epochs, best val_accuracy {:.4}, history in {:?}",
        history.epochs.len(),
        history.best_val_accuracy(),
        outputs.history_file
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "adbanda-train",
            "mo",
            "data",
            "--from-audio",
            "--epochs",
            "20",
            "--class-weights",
        ])
        .unwrap();
        assert_eq!(args.kind, ModelKind::Mo);
        assert!(args.from_audio);
        assert_eq!(args.epochs, Some(20));
        assert!(args.class_weights);
    }

    #[test]
    fn test_unknown_config_key_is_rejected() {
        assert!(Args::try_parse_from(["adbanda-train", "xyz", "data"]).is_err());
    }
}
