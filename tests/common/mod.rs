#![allow(dead_code)]

use std::sync::Arc;

use ferrite_recon::data::{Batch, DataLoader, Dataset, InMemoryDataset};
use ferrite_recon::layers::Parameter;
use ferrite_recon::network::{Architecture, Model};
use ferrite_recon::{Result, Tensor};

/// `output = w · input` with a single trainable scalar `w`.
pub struct ScaleModel {
    pub weight: Parameter,
    architecture: Architecture,
    cached_input: Option<Tensor>,
    training: bool,
}

impl ScaleModel {
    pub fn new(w: f64) -> ScaleModel {
        ScaleModel {
            weight: Parameter::new(Tensor::filled([1, 1, 1, 1], w)),
            // Only used as the checkpoint tag.
            architecture: Architecture::Baseline { channels: 1, hidden: 1, kernel: 1, num_convblocks: 0 },
            cached_input: None,
            training: true,
        }
    }

    pub fn w(&self) -> f64 {
        self.weight.value.data()[0]
    }
}

impl Model for ScaleModel {
    fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        if self.training {
            self.cached_input = Some(input.clone());
        }
        let w = self.w();
        Ok(input.map(|x| w * x))
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<()> {
        let input = self.cached_input.take().expect("forward before backward");
        let g: f64 = input.data().iter().zip(grad_output.data()).map(|(x, g)| x * g).sum();
        self.weight.accumulate(&Tensor::filled([1, 1, 1, 1], g))
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight]
    }
}

/// Single-channel `side × side` sample whose target is `input * factor`.
pub fn sample(seed: usize, side: usize, factor: f64) -> Batch {
    let data: Vec<f64> = (0..side * side)
        .map(|i| (((i + 3 * seed) as f64) * 0.61).sin().abs())
        .collect();
    let input = Tensor::from_vec([1, 1, side, side], data).unwrap();
    let target = input.map(|x| x * factor);
    Batch::new(input, target).unwrap()
}

pub fn dataset(samples: Vec<Batch>) -> Arc<dyn Dataset> {
    Arc::new(InMemoryDataset::new(samples).unwrap())
}

pub fn loader(samples: Vec<Batch>, batch_size: usize) -> DataLoader {
    DataLoader::new(dataset(samples), batch_size).unwrap()
}
