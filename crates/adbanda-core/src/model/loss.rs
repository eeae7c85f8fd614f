//! Categorical cross-entropy on probability outputs

use candle_core::{Device, Result, Tensor, D};

/// Probabilities are clipped to `[EPSILON, 1 - EPSILON]` before the log
const EPSILON: f32 = 1e-7;

/// One-hot `[labels.len(), num_classes]` target matrix
pub fn one_hot(labels: &[usize], num_classes: usize, device: &Device) -> Result<Tensor> {
    let mut data = vec![0.0f32; labels.len() * num_classes];
    for (row, &label) in labels.iter().enumerate() {
        if label < num_classes {
            data[row * num_classes + label] = 1.0;
        }
    }
    Tensor::from_vec(data, (labels.len(), num_classes), device)
}

/// Mean cross-entropy between predicted probabilities and one-hot targets.
///
/// Rows are renormalized to sum to one first, which makes sigmoid outputs
/// usable as a distribution. `sample_weights` (shape `[batch]`) scales each
/// row's loss before averaging over the batch.
pub fn categorical_crossentropy(
    probs: &Tensor,
    targets: &Tensor,
    sample_weights: Option<&Tensor>,
) -> Result<Tensor> {
    let sums = (probs.sum_keepdim(D::Minus1)? + EPSILON as f64)?;
    let probs = probs
        .broadcast_div(&sums)?
        .clamp(EPSILON, 1.0 - EPSILON)?;
    let per_row = (targets * probs.log()?)?.sum(D::Minus1)?.neg()?;
    match sample_weights {
        Some(weights) => (per_row * weights)?.mean_all(),
        None => per_row.mean_all(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot() {
        let t = one_hot(&[2, 0], 3, &Device::Cpu).unwrap();
        assert_eq!(
            t.to_vec2::<f32>().unwrap(),
            vec![vec![0.0, 0.0, 1.0], vec![1.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn test_loss_of_uniform_prediction() {
        let probs = Tensor::new(&[[0.5f32, 0.5], [0.5, 0.5]], &Device::Cpu).unwrap();
        let targets = one_hot(&[0, 1], 2, &Device::Cpu).unwrap();
        let loss = categorical_crossentropy(&probs, &targets, None)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-4);
    }

    #[test]
    fn test_confident_correct_prediction_has_small_loss() {
        let probs = Tensor::new(&[[0.999f32, 0.001]], &Device::Cpu).unwrap();
        let targets = one_hot(&[0], 2, &Device::Cpu).unwrap();
        let loss = categorical_crossentropy(&probs, &targets, None)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(loss < 0.01);
    }

    #[test]
    fn test_sample_weights_scale_loss() {
        let probs = Tensor::new(&[[0.5f32, 0.5]], &Device::Cpu).unwrap();
        let targets = one_hot(&[0], 2, &Device::Cpu).unwrap();
        let weights = Tensor::new(&[2.0f32], &Device::Cpu).unwrap();
        let loss = categorical_crossentropy(&probs, &targets, Some(&weights))
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((loss - 2.0 * std::f32::consts::LN_2).abs() < 1e-4);
    }
}
