use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    error::Result,
    layers::{conv::Conv2d, parameter::Parameter, residual::ResidualBlock},
    math::tensor::Tensor,
    network::{model::Model, spec::Architecture},
};

/// Residual network predicting a correction that is added back onto the input.
pub struct ResidualCnn {
    architecture: Architecture,
    head: Conv2d,
    blocks: Vec<ResidualBlock>,
    tail: Conv2d,
    training: bool,
}

impl ResidualCnn {
    pub fn new<R: Rng + ?Sized>(architecture: Architecture, rng: &mut R) -> ResidualCnn {
        let (channels, hidden, kernel, blocks) = match architecture {
            Architecture::Resnet { channels, hidden, kernel, resnet_blocks } => {
                (channels, hidden, kernel, resnet_blocks)
            }
            Architecture::Baseline { channels, hidden, kernel, .. } => (channels, hidden, kernel, 0),
        };
        let head = Conv2d::new(channels, hidden, kernel, ActivationFunction::ReLU, rng);
        let blocks = (0..blocks).map(|_| ResidualBlock::new(hidden, kernel, rng)).collect();
        let tail = Conv2d::new(hidden, channels, kernel, ActivationFunction::Identity, rng);
        ResidualCnn { architecture, head, blocks, tail, training: true }
    }
}

impl Model for ResidualCnn {
    fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let mut current = self.head.forward(input, self.training)?;
        for block in &mut self.blocks {
            current = block.forward(&current, self.training)?;
        }
        let correction = self.tail.forward(&current, self.training)?;
        input.zip_map(&correction, |x, r| x + r)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<()> {
        // The global skip only feeds the input, which has no parameters.
        let mut delta = self.tail.backward(grad_output)?;
        for block in self.blocks.iter_mut().rev() {
            delta = block.backward(&delta)?;
        }
        self.head.backward(&delta)?;
        Ok(())
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn parameters(&self) -> Vec<&Parameter> {
        let mut params = self.head.parameters();
        params.extend(self.blocks.iter().flat_map(|b| b.parameters()));
        params.extend(self.tail.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params = self.head.parameters_mut();
        params.extend(self.blocks.iter_mut().flat_map(|b| b.parameters_mut()));
        params.extend(self.tail.parameters_mut());
        params
    }
}
