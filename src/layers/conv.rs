use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    error::{Error, Result},
    layers::parameter::Parameter,
    math::conv::{conv2d_backward, conv2d_forward},
    math::tensor::Tensor,
};

/// Activations kept from a training-mode forward pass for backprop.
#[derive(Debug)]
struct ConvCache {
    input: Tensor,
    pre_activation: Tensor, // z = W * x + b, needed for σ'(z)
}

/// Same-padded, stride-1 convolution followed by an element-wise activation.
#[derive(Debug)]
pub struct Conv2d {
    pub weights: Parameter,
    pub bias: Parameter,
    pub activator: ActivationFunction,
    cache: Option<ConvCache>,
}

impl Conv2d {
    /// He-initialised `kernel × kernel` convolution; biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Conv2d {
        let fan_in = in_channels * kernel * kernel;
        let weights = Tensor::he([out_channels, in_channels, kernel, kernel], fan_in, rng);
        Conv2d {
            weights: Parameter::new(weights),
            bias: Parameter::new(Tensor::zeros([1, out_channels, 1, 1])),
            activator: activation,
            cache: None,
        }
    }

    /// Forward pass. With `training` set, the input and pre-activation are
    /// cached for the following `backward`; otherwise any stale cache is dropped.
    pub fn forward(&mut self, input: &Tensor, training: bool) -> Result<Tensor> {
        let z = conv2d_forward(input, &self.weights.value, self.bias.value.data())?;
        let a = self.activator.apply(&z);
        self.cache = if training {
            Some(ConvCache { input: input.clone(), pre_activation: z })
        } else {
            None
        };
        Ok(a)
    }

    /// Accumulates parameter gradients for ∂L/∂a = `grad` and returns ∂L/∂input.
    pub fn backward(&mut self, grad: &Tensor) -> Result<Tensor> {
        let cache = self.cache.take().ok_or_else(|| {
            Error::Model("backward called without a training-mode forward pass".into())
        })?;
        let delta = self.activator.backward(&cache.pre_activation, grad);
        let grads = conv2d_backward(&cache.input, &self.weights.value, &delta)?;
        self.weights.accumulate(&grads.weights)?;
        let bias_grad = Tensor::from_vec(self.bias.value.shape(), grads.bias)?;
        self.bias.accumulate(&bias_grad)?;
        Ok(grads.input)
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weights, &mut self.bias]
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weights, &self.bias]
    }
}
