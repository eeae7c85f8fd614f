//! Activation functions on candle tensors

use candle_core::{Result, Tensor, D};

use crate::config::Activation;

const SELU_ALPHA: f64 = 1.673_263_242_354_377_3;
const SELU_SCALE: f64 = 1.050_700_987_355_480_5;

impl Activation {
    /// Apply the activation element-wise (softmax over the last dimension)
    pub fn apply(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Relu => xs.relu(),
            Self::Tanh => xs.tanh(),
            Self::Elu => xs.elu(1.0),
            Self::Selu => xs.elu(SELU_ALPHA)?.affine(SELU_SCALE, 0.0),
            Self::Sigmoid => candle_nn::ops::sigmoid(xs),
            Self::Softmax => candle_nn::ops::softmax(xs, D::Minus1),
            Self::Softplus => softplus(xs),
            Self::Mish => xs.mul(&softplus(xs)?.tanh()?),
            Self::Softsign => xs.div(&(xs.abs()? + 1.0)?),
            Self::Swish => candle_nn::ops::silu(xs),
        }
    }
}

/// `log(1 + exp(x))`, written as `relu(x) + log(1 + exp(-|x|))` to avoid overflow
fn softplus(xs: &Tensor) -> Result<Tensor> {
    let tail = ((xs.abs()?.neg()?.exp()? + 1.0)?).log()?;
    xs.relu()? + tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn values(activation: Activation, input: &[f32]) -> Vec<f32> {
        let xs = Tensor::new(input, &Device::Cpu).unwrap();
        activation.apply(&xs).unwrap().to_vec1::<f32>().unwrap()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "{} != {}", a, e);
        }
    }

    #[test]
    fn test_relu_and_softsign() {
        assert_close(&values(Activation::Relu, &[-1.0, 2.0]), &[0.0, 2.0]);
        assert_close(&values(Activation::Softsign, &[-1.0, 3.0]), &[-0.5, 0.75]);
    }

    #[test]
    fn test_softplus_is_stable() {
        let out = values(Activation::Softplus, &[-100.0, 0.0, 100.0]);
        assert_close(&out, &[0.0, std::f32::consts::LN_2, 100.0]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let xs = Tensor::new(&[[1.0f32, 2.0, 3.0]], &Device::Cpu).unwrap();
        let out = Activation::Softmax.apply(&xs).unwrap().to_vec2::<f32>().unwrap();
        assert!((out[0].iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_every_activation_preserves_shape() {
        let xs = Tensor::new(&[[-2.0f32, -0.5, 0.0, 0.5, 2.0]], &Device::Cpu).unwrap();
        for activation in Activation::all() {
            let out = activation.apply(&xs).unwrap();
            assert_eq!(out.dims(), xs.dims(), "{}", activation);
        }
    }
}
