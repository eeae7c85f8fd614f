//! Classification head hyperparameters
//!
//! A `ModelHyperparameters` value fully determines the topology of the head
//! (together with the class count) and its learning rate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Activation functions available to dense layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Tanh,
    Elu,
    Mish,
    Selu,
    Sigmoid,
    Softmax,
    Softplus,
    Softsign,
    Swish,
}

impl Activation {
    /// Every supported activation
    pub fn all() -> &'static [Self] {
        &[
            Self::Relu,
            Self::Tanh,
            Self::Elu,
            Self::Mish,
            Self::Selu,
            Self::Sigmoid,
            Self::Softmax,
            Self::Softplus,
            Self::Softsign,
            Self::Swish,
        ]
    }

    /// Name as written in configs and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::Tanh => "tanh",
            Self::Elu => "elu",
            Self::Mish => "mish",
            Self::Selu => "selu",
            Self::Sigmoid => "sigmoid",
            Self::Softmax => "softmax",
            Self::Softplus => "softplus",
            Self::Softsign => "softsign",
            Self::Swish => "swish",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One hidden dense layer, optionally followed by dropout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerHyperparameters {
    pub units: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropout: Option<f32>,
}

impl LayerHyperparameters {
    pub fn new(units: usize, dropout: Option<f32>) -> Self {
        Self { units, dropout }
    }
}

impl fmt::Display for LayerHyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "units={}", self.units)?;
        if let Some(dropout) = self.dropout {
            write!(f, ", dropout={:.3e}", dropout)?;
        }
        Ok(())
    }
}

/// Full description of a classification head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHyperparameters {
    pub layers: Vec<LayerHyperparameters>,
    pub layer_activation: Activation,
    pub output_activation: Activation,
    pub learning_rate: f64,
}

impl fmt::Display for ModelHyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for layer in &self.layers {
            writeln!(f, "{}", layer)?;
        }
        write!(
            f,
            "layer_activation={}, output_activation={}, learning_rate={:.3e}",
            self.layer_activation, self.output_activation, self.learning_rate
        )
    }
}

fn layer(units: usize, dropout: f32) -> LayerHyperparameters {
    LayerHyperparameters::new(units, Some(dropout))
}

/// Four-layer head used before any tuning
pub fn hp_baseline() -> ModelHyperparameters {
    ModelHyperparameters {
        layers: vec![layer(256, 0.15), layer(384, 0.20), layer(192, 0.25), layer(384, 0.20)],
        layer_activation: Activation::Relu,
        output_activation: Activation::Softmax,
        learning_rate: 2e-5,
    }
}

/// Best tuned head for advert / music / talk
pub fn hp_amt_best() -> ModelHyperparameters {
    ModelHyperparameters {
        layers: vec![layer(64, 0.069), layer(640, 0.009), layer(512, 0.272)],
        layer_activation: Activation::Relu,
        output_activation: Activation::Softmax,
        learning_rate: 3e-4,
    }
}

/// Runner-up tuned head for advert / music / talk
pub fn hp_amt_second() -> ModelHyperparameters {
    ModelHyperparameters {
        layers: vec![
            layer(896, 0.083),
            layer(704, 0.113),
            layer(1024, 0.056),
            layer(512, 0.074),
            LayerHyperparameters::new(32, None),
        ],
        layer_activation: Activation::Relu,
        output_activation: Activation::Softmax,
        learning_rate: 3e-5,
    }
}

/// Best tuned head for music / other
pub fn hp_mo_best() -> ModelHyperparameters {
    ModelHyperparameters {
        layers: vec![layer(320, 8.106e-2)],
        layer_activation: Activation::Tanh,
        output_activation: Activation::Sigmoid,
        learning_rate: 2.782e-4,
    }
}

/// Best tuned head for advert / talk
pub fn hp_at_best() -> ModelHyperparameters {
    ModelHyperparameters {
        layers: vec![layer(128, 2.522e-1)],
        layer_activation: Activation::Relu,
        output_activation: Activation::Softmax,
        learning_rate: 3.524e-4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_display() {
        assert_eq!(LayerHyperparameters::new(32, None).to_string(), "units=32");
        assert_eq!(
            LayerHyperparameters::new(64, Some(0.25)).to_string(),
            "units=64, dropout=2.500e-1"
        );
    }

    #[test]
    fn test_model_display_lists_every_layer() {
        let text = hp_amt_best().to_string();
        assert_eq!(text.lines().count(), 4);
        assert!(text.ends_with("learning_rate=3.000e-4"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let hp = hp_amt_second();
        let yaml = serde_yaml::to_string(&hp).unwrap();
        assert!(yaml.contains("layer_activation: relu"));
        let parsed: ModelHyperparameters = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, hp);
    }

    #[test]
    fn test_activation_names_are_unique() {
        let mut names: Vec<_> = Activation::all().iter().map(|a| a.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Activation::all().len());
    }
}
