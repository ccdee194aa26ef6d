use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    error::Result,
    layers::{conv::Conv2d, parameter::Parameter},
    math::tensor::Tensor,
    network::{model::Model, spec::Architecture},
};

/// Plain stack of convolutions mapping an image to an image of the same shape.
pub struct BaselineCnn {
    architecture: Architecture,
    layers: Vec<Conv2d>,
    training: bool,
}

impl BaselineCnn {
    /// Builds the layer stack for an `Architecture::Baseline`; other variants
    /// are treated as a baseline with no middle blocks.
    pub fn new<R: Rng + ?Sized>(architecture: Architecture, rng: &mut R) -> BaselineCnn {
        let (channels, hidden, kernel, blocks) = match architecture {
            Architecture::Baseline { channels, hidden, kernel, num_convblocks } => {
                (channels, hidden, kernel, num_convblocks)
            }
            Architecture::Resnet { channels, hidden, kernel, .. } => (channels, hidden, kernel, 0),
        };
        let mut layers = Vec::with_capacity(blocks + 2);
        layers.push(Conv2d::new(channels, hidden, kernel, ActivationFunction::ReLU, rng));
        for _ in 0..blocks {
            layers.push(Conv2d::new(hidden, hidden, kernel, ActivationFunction::ReLU, rng));
        }
        layers.push(Conv2d::new(hidden, channels, kernel, ActivationFunction::Identity, rng));
        BaselineCnn { architecture, layers, training: true }
    }
}

impl Model for BaselineCnn {
    fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current, self.training)?;
        }
        Ok(current)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<()> {
        let mut delta = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            delta = layer.backward(&delta)?;
        }
        Ok(())
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn parameters(&self) -> Vec<&Parameter> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.layers.iter_mut().flat_map(|l| l.parameters_mut()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch(blocks: usize) -> Architecture {
        Architecture::Baseline { channels: 3, hidden: 4, kernel: 3, num_convblocks: blocks }
    }

    #[test]
    fn output_matches_input_shape() {
        let mut model = arch(2).build(1).unwrap();
        let out = model.forward(&Tensor::filled([2, 3, 5, 6], 0.1)).unwrap();
        assert_eq!(out.shape(), [2, 3, 5, 6]);
    }

    #[test]
    fn parameter_count_grows_with_blocks() {
        // head 3->4, tail 4->3, each block 4->4: weights plus biases.
        let head = 4 * 3 * 9 + 4;
        let tail = 3 * 4 * 9 + 3;
        let block = 4 * 4 * 9 + 4;
        assert_eq!(arch(0).build(0).unwrap().parameter_count(), head + tail);
        assert_eq!(arch(2).build(0).unwrap().parameter_count(), head + tail + 2 * block);
    }

    #[test]
    fn load_state_rejects_other_architecture() {
        let mut model = arch(1).build(0).unwrap();
        let other = arch(2).build(0).unwrap().state();
        assert!(model.load_state(&other).is_err());
        let same = arch(1).build(5).unwrap().state();
        model.load_state(&same).unwrap();
        assert_eq!(model.state(), same);
    }
}
