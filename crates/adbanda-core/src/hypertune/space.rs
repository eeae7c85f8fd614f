//! Hyperparameter search space
//!
//! Every candidate is a point in the unit cube `[0, 1]^d`. The Gaussian
//! process works on those points directly; [`SearchSpace::decode`] maps a
//! point to concrete [`ModelHyperparameters`].
//!
//! Coordinates:
//!
//! ```text
//! 0                       num_layers
//! 1 + 3i, 2 + 3i, 3 + 3i  units_i, has_dropout_i, dropout_i   (i < max_layers)
//! d - 3                   layer_activation
//! d - 2                   output_activation
//! d - 1                   lr (log scale)
//! ```
//!
//! Coordinates of layers past `num_layers` are inactive but still part of the
//! point, so the dimension does not depend on the layer count.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{Activation, LayerHyperparameters, ModelHyperparameters};

/// Bounds of the hyperparameter search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub min_layers: usize,
    pub max_layers: usize,
    pub min_units: usize,
    pub max_units: usize,
    pub units_step: usize,
    pub min_dropout: f32,
    pub max_dropout: f32,
    pub layer_activations: Vec<Activation>,
    pub output_activations: Vec<Activation>,
    pub min_learning_rate: f64,
    pub max_learning_rate: f64,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            min_layers: 1,
            max_layers: 10,
            min_units: 32,
            max_units: 1024,
            units_step: 32,
            min_dropout: 0.0,
            max_dropout: 0.5,
            layer_activations: vec![
                Activation::Relu,
                Activation::Tanh,
                Activation::Elu,
                Activation::Sigmoid,
                Activation::Selu,
            ],
            output_activations: vec![Activation::Softmax, Activation::Sigmoid],
            min_learning_rate: 1e-5,
            max_learning_rate: 1e-2,
        }
    }
}

impl SearchSpace {
    /// Number of coordinates of a point
    pub fn dimension(&self) -> usize {
        1 + 3 * self.max_layers + 3
    }

    /// Uniformly random point
    pub fn random_point<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        (0..self.dimension()).map(|_| rng.gen::<f64>()).collect()
    }

    /// Concrete hyperparameters of a point
    pub fn decode(&self, point: &[f64]) -> ModelHyperparameters {
        let at = |i: usize| point.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);

        let num_layers = self.min_layers + bucket(at(0), self.max_layers - self.min_layers + 1);
        let unit_choices = (self.max_units - self.min_units) / self.units_step.max(1) + 1;

        let layers = (0..num_layers)
            .map(|i| {
                let base = 1 + 3 * i;
                let units = self.min_units + self.units_step * bucket(at(base), unit_choices);
                let dropout = (at(base + 1) >= 0.5).then(|| {
                    self.min_dropout + (self.max_dropout - self.min_dropout) * at(base + 2) as f32
                });
                LayerHyperparameters::new(units, dropout)
            })
            .collect();

        let d = self.dimension();
        let (lr_lo, lr_hi) = (self.min_learning_rate.ln(), self.max_learning_rate.ln());

        ModelHyperparameters {
            layers,
            layer_activation: self.layer_activations
                [bucket(at(d - 3), self.layer_activations.len())],
            output_activation: self.output_activations
                [bucket(at(d - 2), self.output_activations.len())],
            learning_rate: (lr_lo + (lr_hi - lr_lo) * at(d - 1)).exp(),
        }
    }
}

/// Index of the bucket holding `u` when `[0, 1]` is cut into `n` equal parts
fn bucket(u: f64, n: usize) -> usize {
    ((u * n as f64) as usize).min(n.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dimension() {
        assert_eq!(SearchSpace::default().dimension(), 34);
    }

    #[test]
    fn test_decode_corners() {
        let space = SearchSpace::default();
        let low = space.decode(&vec![0.0; space.dimension()]);
        assert_eq!(low.layers, vec![LayerHyperparameters::new(32, None)]);
        assert_eq!(low.layer_activation, Activation::Relu);
        assert_eq!(low.output_activation, Activation::Softmax);
        assert!((low.learning_rate - 1e-5).abs() < 1e-12);

        let high = space.decode(&vec![1.0; space.dimension()]);
        assert_eq!(high.layers.len(), 10);
        assert!(high
            .layers
            .iter()
            .all(|l| l.units == 1024 && l.dropout == Some(0.5)));
        assert_eq!(high.layer_activation, Activation::Selu);
        assert_eq!(high.output_activation, Activation::Sigmoid);
        assert!((high.learning_rate - 1e-2).abs() < 1e-9);
    }

    #[test]
    fn test_random_points_stay_in_bounds() {
        let space = SearchSpace::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let hp = space.decode(&space.random_point(&mut rng));
            assert!((1..=10).contains(&hp.layers.len()));
            for layer in &hp.layers {
                assert!((32..=1024).contains(&layer.units));
                assert_eq!(layer.units % 32, 0);
                if let Some(p) = layer.dropout {
                    assert!((0.0..=0.5).contains(&p));
                }
            }
            assert!((1e-5..=1e-2).contains(&hp.learning_rate));
        }
    }
}
