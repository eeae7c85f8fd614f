//! Embedding cache precompute
//!
//! Each raw class is embedded in its own worker process (procspawn pool of
//! three). Workers share nothing: each loads its own ONNX session, writes its
//! own cache file and reports the number of embeddings written. The caller
//! blocks on all workers and fails if any of them fails.
//!
//! Binaries using this module must call `procspawn::init()` first thing in
//! `main`.

use std::path::{Path, PathBuf};

use crate::config::RawClass;
use crate::embedding::{Embedding, EmbeddingModel, YamnetModel};
use crate::error::{AdbandaError, Result};

use super::cache::{cache_path, load_embeddings, save_embeddings};
use super::listing::list_class_files;

/// Size of the worker pool, one per raw class
pub const WORKERS: usize = 3;

/// Embed every file and flatten the per-file frames into one list
pub fn embed_files<M: EmbeddingModel>(model: &mut M, files: &[PathBuf]) -> Result<Vec<Embedding>> {
    let mut embeddings = Vec::new();
    for (i, file) in files.iter().enumerate() {
        let frames = model.embed_file(file)?;
        log::debug!("[{}/{}] {:?}: {} frames", i + 1, files.len(), file, frames.len());
        embeddings.extend(frames);
    }
    Ok(embeddings)
}

/// Build the cache of one raw class with an already loaded model.
///
/// Returns the number of embeddings read back from the written cache.
pub fn precompute_class<M: EmbeddingModel>(
    model: &mut M,
    dataset_root: &Path,
    class: RawClass,
) -> Result<usize> {
    let files = list_class_files(dataset_root, class, None);
    let embeddings = embed_files(model, &files)?;

    let path = cache_path(dataset_root, class);
    save_embeddings(&path, &embeddings)?;

    let count = load_embeddings(&path)?.len();
    log::info!("{}: {} embeddings", class, count);
    Ok(count)
}

/// Precompute caches for all raw classes in parallel worker processes
pub fn precompute_all(dataset_root: &Path, yamnet: &Path) -> Result<Vec<(RawClass, usize)>> {
    log::info!("Prepare embeddings for {:?}", dataset_root);

    let pool = procspawn::Pool::new(WORKERS)
        .map_err(|e| AdbandaError::Worker(format!("Failed to start worker pool: {}", e)))?;

    let handles: Vec<_> = RawClass::all()
        .iter()
        .map(|&class| {
            let args = (dataset_root.to_path_buf(), class, yamnet.to_path_buf());
            let handle = pool.spawn(args, |(root, class, yamnet): (PathBuf, RawClass, PathBuf)| {
                let mut model = YamnetModel::load(&yamnet).map_err(|e| e.to_string())?;
                precompute_class(&mut model, &root, class).map_err(|e| e.to_string())
            });
            (class, handle)
        })
        .collect();

    let mut counts = Vec::with_capacity(handles.len());
    for (class, handle) in handles {
        let count = handle
            .join()
            .map_err(|e| AdbandaError::Worker(format!("{} worker crashed: {:?}", class, e)))?
            .map_err(|e| AdbandaError::Worker(format!("{}: {}", class, e)))?;
        counts.push((class, count));
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::write_sine_wav;
    use crate::embedding::tests::FakeEmbedder;

    procspawn::enable_test_support!();

    #[test]
    fn test_precompute_class_writes_cache() {
        let root = tempfile::tempdir().unwrap();
        let advert_dir = root.path().join("advert");
        std::fs::create_dir_all(&advert_dir).unwrap();
        write_sine_wav(&advert_dir.join("a.wav"), 16_000, 1, 1.0);
        write_sine_wav(&advert_dir.join("b.wav"), 16_000, 1, 1.5);

        let count = precompute_class(&mut FakeEmbedder, root.path(), RawClass::Advert).unwrap();
        // 1.0s -> 2 frames, 1.5s -> 3 frames
        assert_eq!(count, 5);
        assert!(cache_path(root.path(), RawClass::Advert).exists());
    }

    #[test]
    fn test_empty_class_writes_empty_cache() {
        let root = tempfile::tempdir().unwrap();
        let count = precompute_class(&mut FakeEmbedder, root.path(), RawClass::Talk).unwrap();
        assert_eq!(count, 0);
        assert!(load_embeddings(&cache_path(root.path(), RawClass::Talk))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_worker_failure_aborts_precompute() {
        let root = tempfile::tempdir().unwrap();
        let err = precompute_all(root.path(), Path::new("/nonexistent/yamnet.onnx")).unwrap_err();
        match err {
            AdbandaError::Worker(msg) => assert!(msg.contains("not found"), "{}", msg),
            other => panic!("expected a worker error, got {:?}", other),
        }
        assert!(!cache_path(root.path(), RawClass::Advert).exists());
    }
}
