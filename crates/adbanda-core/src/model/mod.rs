//! Trainable classification head
//!
//! A small dense network over frozen 1024-dim embeddings:
//!
//! ```text
//! input [batch, 1024]
//!   -> dense_0 (units_0, layer activation) -> dropout_0 (if set)
//!   -> ...
//!   -> output (num_classes, output activation)
//! ```
//!
//! Weights are plain candle `Var`s named `dense_i.weight`, `dense_i.bias`,
//! `output.weight` and `output.bias`. Kernels use Glorot-uniform init from a
//! seeded RNG and biases start at zero, so two heads built with the same
//! seed start out identical.

mod activation;
mod artifact;
mod loss;

pub use artifact::{artifact_dir, MODEL_CONFIG_FILE, MODEL_WEIGHTS_FILE};
pub use loss::{categorical_crossentropy, one_hot};

use std::borrow::Borrow;
use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Dropout, Linear, Module};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ModelConfig;
use crate::embedding::{Embedding, EMBEDDING_DIM};
use crate::error::{AdbandaError, Result};

/// Rows per forward pass when predicting
const PREDICT_BATCH: usize = 1024;

struct DenseLayer {
    linear: Linear,
    dropout: Option<Dropout>,
}

/// Dense classification head with its trainable variables
pub struct Classifier {
    config: ModelConfig,
    hidden: Vec<DenseLayer>,
    output: Linear,
    /// Named variables in creation order
    vars: Vec<(String, Var)>,
    device: Device,
}

impl Classifier {
    /// Build a freshly initialized head on the CPU
    pub fn new(config: ModelConfig, seed: u64) -> Result<Self> {
        Self::with_device(config, seed, Device::Cpu)
    }

    pub fn with_device(config: ModelConfig, seed: u64, device: Device) -> Result<Self> {
        if config.num_classes() == 0 {
            return Err(AdbandaError::InvalidInput(
                "a classifier needs at least one class".to_string(),
            ));
        }
        if let Some(i) = config.hyperparams.layers.iter().position(|l| l.units == 0) {
            return Err(AdbandaError::InvalidInput(format!("dense_{} has zero units", i)));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut vars = Vec::new();
        let mut in_dim = EMBEDDING_DIM;

        let mut hidden = Vec::with_capacity(config.hyperparams.layers.len());
        for (i, layer) in config.hyperparams.layers.iter().enumerate() {
            let name = format!("dense_{}", i);
            let linear = dense(&name, in_dim, layer.units, &mut rng, &device, &mut vars)?;
            let dropout = layer.dropout.map(|p| Dropout::new(p.clamp(0.0, 0.99)));
            hidden.push(DenseLayer { linear, dropout });
            in_dim = layer.units;
        }
        let output = dense("output", in_dim, config.num_classes(), &mut rng, &device, &mut vars)?;

        Ok(Self {
            config,
            hidden,
            output,
            vars,
            device,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Trainable variables, for the optimizer
    pub fn vars(&self) -> Vec<Var> {
        self.vars.iter().map(|(_, var)| var.clone()).collect()
    }

    /// Width of the output layer
    pub fn output_units(&self) -> usize {
        self.output.weight().dims()[0]
    }

    /// Total number of trainable scalars
    pub fn parameter_count(&self) -> usize {
        self.vars.iter().map(|(_, var)| var.elem_count()).sum()
    }

    /// Forward pass producing class probabilities; dropout only when `train`
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let hp = &self.config.hyperparams;
        let mut xs = xs.clone();
        for layer in &self.hidden {
            xs = hp.layer_activation.apply(&layer.linear.forward(&xs)?)?;
            if let Some(dropout) = &layer.dropout {
                xs = dropout.forward(&xs, train)?;
            }
        }
        hp.output_activation.apply(&self.output.forward(&xs)?)
    }

    /// Class probabilities for every embedding, in input order
    pub fn predict<E: Borrow<Embedding>>(&self, embeddings: &[E]) -> Result<Vec<Vec<f32>>> {
        let mut rows = Vec::with_capacity(embeddings.len());
        for chunk in embeddings.chunks(PREDICT_BATCH) {
            let xs = embeddings_tensor(chunk, &self.device)?;
            rows.extend(self.forward_t(&xs, false)?.to_vec2::<f32>()?);
        }
        Ok(rows)
    }

    /// Copy of every variable's current value
    pub fn snapshot(&self) -> Result<Vec<Tensor>> {
        Ok(self
            .vars
            .iter()
            .map(|(_, var)| var.as_tensor().copy())
            .collect::<candle_core::Result<_>>()?)
    }

    /// Put back values taken with [`Classifier::snapshot`]
    pub fn restore(&self, snapshot: &[Tensor]) -> Result<()> {
        if snapshot.len() != self.vars.len() {
            return Err(AdbandaError::InvalidInput(format!(
                "snapshot has {} tensors, model has {}",
                snapshot.len(),
                self.vars.len()
            )));
        }
        for ((_, var), value) in self.vars.iter().zip(snapshot) {
            var.set(value)?;
        }
        Ok(())
    }

    /// Write the weights as a safetensors file
    pub fn save_weights(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tensors: HashMap<String, Tensor> = self
            .vars
            .iter()
            .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
            .collect();
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }

    /// Overwrite the weights from a safetensors file; names and shapes must match
    pub fn load_weights(&self, path: &Path) -> Result<()> {
        let mut tensors = candle_core::safetensors::load(path, &self.device)?;
        for (name, var) in &self.vars {
            let value = tensors.remove(name).ok_or_else(|| AdbandaError::InvalidArtifact {
                path: path.to_path_buf(),
                reason: format!("missing tensor {}", name),
            })?;
            if value.dims() != var.dims() {
                return Err(AdbandaError::InvalidArtifact {
                    path: path.to_path_buf(),
                    reason: format!(
                        "{} has shape {:?}, expected {:?}",
                        name,
                        value.dims(),
                        var.dims()
                    ),
                });
            }
            var.set(&value.to_dtype(DType::F32)?)?;
        }
        Ok(())
    }

    /// Layer-by-layer description for logs
    pub fn summary(&self) -> String {
        let hp = &self.config.hyperparams;
        let mut lines = vec![format!("Model: {}", self.config.name())];
        let mut in_dim = EMBEDDING_DIM;
        for (i, layer) in hp.layers.iter().enumerate() {
            lines.push(format!(
                "  dense_{:<2} {:>5} -> {:<5} {} ({} params)",
                i,
                in_dim,
                layer.units,
                hp.layer_activation,
                (in_dim + 1) * layer.units
            ));
            if let Some(p) = layer.dropout {
                lines.push(format!("  dropout_{:<2} rate={:.3}", i, p));
            }
            in_dim = layer.units;
        }
        lines.push(format!(
            "  output   {:>5} -> {:<5} {} ({} params)",
            in_dim,
            self.output_units(),
            hp.output_activation,
            (in_dim + 1) * self.output_units()
        ));
        lines.push(format!("Trainable params: {}", self.parameter_count()));
        lines.join("\n")
    }
}

/// Create one dense layer, registering its variables under `name`
fn dense(
    name: &str,
    in_dim: usize,
    out_dim: usize,
    rng: &mut StdRng,
    device: &Device,
    vars: &mut Vec<(String, Var)>,
) -> Result<Linear> {
    let limit = (6.0 / (in_dim + out_dim) as f64).sqrt() as f32;
    let kernel: Vec<f32> = (0..in_dim * out_dim)
        .map(|_| rng.gen_range(-limit..limit))
        .collect();

    let weight = Var::from_tensor(&Tensor::from_vec(kernel, (out_dim, in_dim), device)?)?;
    let bias = Var::zeros(out_dim, DType::F32, device)?;

    let linear = Linear::new(weight.as_tensor().clone(), Some(bias.as_tensor().clone()));
    vars.push((format!("{}.weight", name), weight));
    vars.push((format!("{}.bias", name), bias));
    Ok(linear)
}

/// Stack embeddings into a `[rows, EMBEDDING_DIM]` tensor
pub fn embeddings_tensor<E: Borrow<Embedding>>(rows: &[E], device: &Device) -> Result<Tensor> {
    let rows: Vec<&Embedding> = rows.iter().map(<E as Borrow<Embedding>>::borrow).collect();
    if let Some(bad) = rows.iter().find(|row| row.len() != EMBEDDING_DIM) {
        return Err(AdbandaError::InvalidInput(format!(
            "embedding has {} values, expected {}",
            bad.len(),
            EMBEDDING_DIM
        )));
    }
    let flat: Vec<f32> = rows.iter().flat_map(|row| row.iter().copied()).collect();
    Ok(Tensor::from_vec(flat, (rows.len(), EMBEDDING_DIM), device)?)
}
