//! adbanda-predict - classify a single WAV file

use std::path::PathBuf;

use adbanda_cli::{init_logging, CommonArgs};
use adbanda_core::config::ModelKind;
use adbanda_core::inference::Predictor;
use anyhow::{Context, Result};
use clap::Parser;

/// Predict the class of a WAV file with a trained model
#[derive(Parser, Debug)]
#[command(name = "adbanda-predict")]
#[command(about = "Classify a WAV file with a trained adbanda model")]
struct Args {
    /// Model configuration: amt, mo, at or ao
    #[arg(value_name = "CONFIG")]
    kind: ModelKind,

    /// WAV file for prediction
    input: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let app = args.common.app_config();

    let name = args.kind.model_name();
    let mut predictor = Predictor::load(&app.models_dir, args.kind)
        .with_context(|| format!("Failed to load {} from {:?}", name, app.models_dir))?;
    log::debug!("{}", predictor.classifier().summary());

    let prediction = predictor
        .predict_file(&args.input)
        .with_context(|| format!("Failed to classify {:?}", args.input))?;

    log::debug!("Mean probabilities: {:?}", prediction.mean_probabilities);
    println!("{:?}", prediction.frame_classes);
    println!("{}", prediction.class_name);
    Ok(())
}
