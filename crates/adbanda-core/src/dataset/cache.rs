//! Embedding cache files
//!
//! `<root>/<class>.embeddings` holds every embedding computed for one raw
//! class, flattened across files: a gzip stream wrapping a bincode-encoded
//! `Vec<Vec<f32>>`. Caches are written to a temp file and renamed into place.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::RawClass;
use crate::embedding::{Embedding, EMBEDDING_DIM};
use crate::error::{AdbandaError, Result};

/// Cache file extension
pub const CACHE_EXTENSION: &str = "embeddings";

/// Location of a raw class cache under a dataset root
pub fn cache_path(root: &Path, class: RawClass) -> PathBuf {
    root.join(format!("{}.{}", class.name(), CACHE_EXTENSION))
}

/// Write embeddings to a gzip-compressed cache
pub fn save_embeddings(path: &Path, embeddings: &[Embedding]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let file = File::create(&temp_path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        bincode::serialize_into(&mut encoder, embeddings)?;
        encoder.finish()?.flush()?;
    }
    fs::rename(&temp_path, path)?;

    log::info!("Saved {} embeddings to {:?}", embeddings.len(), path);
    Ok(())
}

/// Read a cache, checking every vector's dimension and finiteness
pub fn load_embeddings(path: &Path) -> Result<Vec<Embedding>> {
    log::info!("Loading {:?}", path);

    let file = File::open(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let embeddings: Vec<Embedding> = bincode::deserialize_from(decoder)?;

    let corrupted = |reason: String| AdbandaError::CorruptedCache {
        path: path.to_path_buf(),
        reason,
    };

    if let Some((i, e)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != EMBEDDING_DIM)
    {
        return Err(corrupted(format!(
            "embedding {} has {} values, expected {}",
            i,
            e.len(),
            EMBEDDING_DIM
        )));
    }

    if !embeddings.iter().flatten().all(|v| v.is_finite()) {
        return Err(corrupted("contains NaN or infinities".to_string()));
    }

    Ok(embeddings)
}

/// Like [`load_embeddings`], but a missing cache is an empty class
pub fn load_embeddings_or_empty(path: &Path) -> Result<Vec<Embedding>> {
    if !path.exists() {
        log::warn!("Embedding cache {:?} not found, treating as empty", path);
        return Ok(Vec::new());
    }
    load_embeddings(path)
}
