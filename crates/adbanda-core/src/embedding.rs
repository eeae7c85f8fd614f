//! Frozen YAMNet embedding extraction
//!
//! YAMNet turns a 16 kHz mono waveform into one 1024-dim embedding per
//! ~0.96s frame (0.48s hop). The model is exported to ONNX and executed with
//! ort; its three outputs are `scores [frames, 521]`, `embeddings [frames, 1024]`
//! and `log_mel_spectrogram`. Only the embeddings are used here.
//!
//! The extractor sits behind the [`EmbeddingModel`] trait so dataset assembly,
//! training and inference can run against any frame-level feature source.

use std::path::{Path, PathBuf};

use ndarray::Array1;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::audio::load_16k_mono_wav;
use crate::error::{AdbandaError, Result};

/// Dimension of a single embedding vector
pub const EMBEDDING_DIM: usize = 1024;

/// Default file name of the frozen model inside the models directory
pub const YAMNET_FILENAME: &str = "yamnet.onnx";

/// Input tensor name used by the ONNX export of YAMNet
const YAMNET_INPUT: &str = "waveform";

/// Position of the embeddings tensor among YAMNet's outputs
const EMBEDDINGS_OUTPUT_INDEX: usize = 1;

/// One embedding per audio frame
pub type Embedding = Vec<f32>;

/// A model that maps a 16 kHz waveform to per-frame embeddings
pub trait EmbeddingModel {
    /// Embed a 16 kHz mono waveform; one vector of `EMBEDDING_DIM` per frame
    fn embed(&mut self, waveform: &[f32]) -> Result<Vec<Embedding>>;

    /// Load, resample and embed a WAV file
    fn embed_file(&mut self, path: &Path) -> Result<Vec<Embedding>> {
        let waveform = load_16k_mono_wav(path)?;
        self.embed(&waveform)
    }
}

/// Path of the frozen YAMNet model inside a models directory
pub fn yamnet_path(models_dir: &Path) -> PathBuf {
    models_dir.join(YAMNET_FILENAME)
}

/// YAMNet executed through ONNX Runtime
pub struct YamnetModel {
    session: Session,
}

impl YamnetModel {
    /// Load the frozen model from an ONNX file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AdbandaError::ModelNotFound(path.to_path_buf()));
        }

        log::info!("Loading YAMNet model from {:?}", path);

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| AdbandaError::Inference(format!("Failed to load YAMNet: {}", e)))?;

        Ok(Self { session })
    }
}

impl EmbeddingModel for YamnetModel {
    fn embed(&mut self, waveform: &[f32]) -> Result<Vec<Embedding>> {
        if waveform.is_empty() {
            return Ok(Vec::new());
        }

        let input = Array1::from_vec(waveform.to_vec());
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| AdbandaError::Inference(format!("YAMNet tensor creation error: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![YAMNET_INPUT => input_tensor])
            .map_err(|e| AdbandaError::Inference(format!("YAMNet inference error: {}", e)))?;

        let (_, embeddings) = outputs
            .iter()
            .nth(EMBEDDINGS_OUTPUT_INDEX)
            .ok_or_else(|| {
                AdbandaError::Inference("YAMNet produced no embeddings output".to_string())
            })?;

        let (shape, data) = embeddings
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                AdbandaError::Inference(format!("YAMNet embedding extraction error: {}", e))
            })?;

        let shape: Vec<i64> = shape.iter().copied().collect();
        if shape.len() != 2 || shape[1] as usize != EMBEDDING_DIM {
            return Err(AdbandaError::Inference(format!(
                "Unexpected embeddings shape: {:?}, expected [frames, {}]",
                shape, EMBEDDING_DIM
            )));
        }

        Ok(split_frames(data))
    }
}

/// Split a flat `[frames * EMBEDDING_DIM]` buffer into per-frame vectors
pub fn split_frames(data: &[f32]) -> Vec<Embedding> {
    data.chunks_exact(EMBEDDING_DIM)
        .map(|frame| frame.to_vec())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic stand-in for YAMNet: one frame per 0.5s of audio, each
    /// frame filled with the mean absolute amplitude of its window.
    pub(crate) struct FakeEmbedder;

    impl EmbeddingModel for FakeEmbedder {
        fn embed(&mut self, waveform: &[f32]) -> Result<Vec<Embedding>> {
            Ok(waveform
                .chunks(8_000)
                .map(|window| {
                    let level =
                        window.iter().map(|s| s.abs()).sum::<f32>() / window.len() as f32;
                    vec![level; EMBEDDING_DIM]
                })
                .collect())
        }
    }

    #[test]
    fn test_split_frames() {
        let data = vec![1.0f32; EMBEDDING_DIM * 3];
        let frames = split_frames(&data);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == EMBEDDING_DIM));
    }

    #[test]
    fn test_missing_model_is_reported() {
        let result = YamnetModel::load(Path::new("/nonexistent/yamnet.onnx"));
        assert!(matches!(result, Err(AdbandaError::ModelNotFound(_))));
    }

    #[test]
    fn test_embed_file_through_trait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        crate::audio::tests::write_sine_wav(&path, 16_000, 1, 2.0);

        let frames = FakeEmbedder.embed_file(&path).unwrap();
        assert_eq!(frames.len(), 4);
        assert!(frames[0][0] > 0.0);
    }

    #[test]
    fn test_yamnet_path() {
        assert!(yamnet_path(Path::new("models")).ends_with("yamnet.onnx"));
    }
}
