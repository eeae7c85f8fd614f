//! Single-file prediction
//!
//! A file is embedded frame by frame, every frame is classified, and the file
//! as a whole gets the class with the highest mean probability across frames.

use std::path::Path;

use crate::config::ModelKind;
use crate::embedding::{yamnet_path, EmbeddingModel, YamnetModel};
use crate::error::{AdbandaError, Result};
use crate::metrics::{argmax, column_means};
use crate::model::{artifact_dir, Classifier};

/// Decision for one audio file
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the winning class
    pub class_index: usize,
    pub class_name: String,
    /// Per-class probability averaged over frames
    pub mean_probabilities: Vec<f32>,
    /// Most likely class of every frame, in time order
    pub frame_classes: Vec<usize>,
}

/// Combine per-frame probabilities into one decision; `None` without frames
pub fn decide(frame_probabilities: &[Vec<f32>], class_names: &[String]) -> Option<Prediction> {
    if frame_probabilities.is_empty() {
        return None;
    }
    let mean_probabilities = column_means(frame_probabilities);
    let class_index = argmax(&mean_probabilities);
    Some(Prediction {
        class_index,
        class_name: class_names.get(class_index).cloned().unwrap_or_default(),
        frame_classes: frame_probabilities.iter().map(|row| argmax(row)).collect(),
        mean_probabilities,
    })
}

/// Embedding model plus trained head
pub struct Predictor<M: EmbeddingModel> {
    embedder: M,
    classifier: Classifier,
}

impl Predictor<YamnetModel> {
    /// Load `yamnet.onnx` and the trained model of `kind` from `models_dir`
    pub fn load(models_dir: &Path, kind: ModelKind) -> Result<Self> {
        log::info!("Load YAMNet model");
        let embedder = YamnetModel::load(&yamnet_path(models_dir))?;

        log::info!("Load {} model", kind.model_name());
        let dir = artifact_dir(models_dir, &kind.model_name());
        let classifier = Classifier::load(&dir)?;

        let expected = kind.class_names();
        if classifier.config().classes != expected {
            return Err(AdbandaError::InvalidArtifact {
                path: dir,
                reason: format!(
                    "classes {:?} do not match {} ({:?})",
                    classifier.config().classes,
                    kind,
                    expected
                ),
            });
        }

        Ok(Self::new(embedder, classifier))
    }
}

impl<M: EmbeddingModel> Predictor<M> {
    pub fn new(embedder: M, classifier: Classifier) -> Self {
        Self {
            embedder,
            classifier,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Classify one WAV file
    pub fn predict_file(&mut self, path: &Path) -> Result<Prediction> {
        log::info!("Process audio file {:?}", path);
        let embeddings = self.embedder.embed_file(path)?;
        let frames = self.classifier.predict(&embeddings)?;
        decide(&frames, &self.classifier.config().classes)
            .ok_or_else(|| AdbandaError::NoFrames(path.to_path_buf()))
    }
}
