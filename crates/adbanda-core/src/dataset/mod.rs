//! Dataset assembly
//!
//! Turns a dataset root into train/validation sets of labeled embeddings.
//!
//! # Layout
//!
//! ```text
//! <root>/advert/*.wav       raw audio, one directory per raw class
//! <root>/music/*.wav
//! <root>/talk/*.wav
//! <root>/advert.embeddings  precomputed caches (see `cache`)
//! ```
//!
//! # Sources
//!
//! - **Cache**: load the three caches, label and concatenate per grouping,
//!   shuffle with the seed, split. Splitting happens per embedding.
//! - **Audio**: label the WAV files, shuffle, split per file, then expand
//!   each file into its embedding frames. Frames of one file never end up on
//!   both sides of the split.

pub mod cache;
pub mod corpus;
mod labeled;
pub mod listing;
pub mod precompute;

pub use corpus::EmbeddingCorpus;
pub use labeled::{split_point, LabeledSet};

use std::path::Path;

use crate::config::{ModelKind, TrainParams};
use crate::embedding::{Embedding, EmbeddingModel};
use crate::error::Result;

/// Where training embeddings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetSource {
    Cache,
    Audio,
}

/// Train and validation subsets for one grouping
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub train: LabeledSet<Embedding>,
    pub validation: LabeledSet<Embedding>,
}

impl TrainingData {
    pub fn num_classes(&self) -> usize {
        self.train.num_classes()
    }

    /// Assemble from precomputed caches
    pub fn from_cache(root: &Path, kind: ModelKind, params: &TrainParams) -> Result<Self> {
        let full = EmbeddingCorpus::load(root)?.combine(kind).shuffle(params.seed);
        let (train, validation) = full.split(params.validation_ratio);
        log::info!(
            "We have {} training samples & {} validation ones",
            train.len(),
            validation.len()
        );
        Ok(Self { train, validation })
    }

    /// Assemble from raw audio, embedding each file with `model`
    pub fn from_audio<M: EmbeddingModel>(
        model: &mut M,
        root: &Path,
        kind: ModelKind,
        params: &TrainParams,
    ) -> Result<Self> {
        let files = listing::label_audio_files(root, kind, params.max_files_per_class)
            .shuffle(params.seed);
        let (train_files, validation_files) = files.split(params.validation_ratio);
        log::info!(
            "We have {} training files & {} validation ones",
            train_files.len(),
            validation_files.len()
        );

        log::info!("Processing train dataset");
        let train = train_files.try_flat_map(|path| model.embed_file(path))?;
        log::info!("Processing validation dataset");
        let validation = validation_files.try_flat_map(|path| model.embed_file(path))?;

        log::info!(
            "Expanded to {} training & {} validation embeddings",
            train.len(),
            validation.len()
        );
        Ok(Self { train, validation })
    }
}
