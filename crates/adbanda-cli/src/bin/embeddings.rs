//! adbanda-embeddings - precompute the per-class embedding caches of a dataset

use std::path::PathBuf;

use adbanda_cli::{init_logging, CommonArgs};
use adbanda_core::dataset::precompute::precompute_all;
use adbanda_core::embedding::yamnet_path;
use anyhow::{Context, Result};
use clap::Parser;

/// Embed every WAV file of a dataset root into `<class>.embeddings` caches
#[derive(Parser, Debug)]
#[command(name = "adbanda-embeddings")]
#[command(about = "Precompute YAMNet embedding caches for a dataset root")]
struct Args {
    /// Dataset root with advert/, music/ and talk/ directories
    dataset_root: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    // Worker processes re-enter main; this must run before anything else
    procspawn::init();

    init_logging();
    let args = Args::parse();
    let app = args.common.app_config();

    let yamnet = yamnet_path(&app.models_dir);
    if !yamnet.exists() {
        anyhow::bail!("Embedding model not found at {:?}", yamnet);
    }

    let counts = precompute_all(&args.dataset_root, &yamnet)
        .with_context(|| format!("Failed to precompute embeddings for {:?}", args.dataset_root))?;

    for (class, count) in counts {
        println!("{}: {} embeddings", class, count);
    }
    Ok(())
}
