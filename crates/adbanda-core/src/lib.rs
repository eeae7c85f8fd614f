//! Adbanda Core - advert / music / talk classification over frozen YAMNet embeddings

pub mod audio;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod hypertune;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod training;

pub use error::{AdbandaError, Result};
