//! Error types shared by every adbanda component

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while preparing data, training or predicting
#[derive(Error, Debug)]
pub enum AdbandaError {
    #[error("Failed to read audio file: {path}")]
    AudioRead {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Embedding model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Embedding inference failed: {0}")]
    Inference(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Embedding cache {path} is corrupted: {reason}")]
    CorruptedCache { path: PathBuf, reason: String },

    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid model artifact at {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Audio produced no embedding frames: {0}")]
    NoFrames(PathBuf),

    #[error("Worker process failed: {0}")]
    Worker(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AdbandaError>;
