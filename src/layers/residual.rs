use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    error::Result,
    layers::{conv::Conv2d, parameter::Parameter},
    math::tensor::Tensor,
};

/// `x + conv(relu(conv(x)))`, channel count preserved.
#[derive(Debug)]
pub struct ResidualBlock {
    first: Conv2d,
    second: Conv2d,
}

impl ResidualBlock {
    pub fn new<R: Rng + ?Sized>(channels: usize, kernel: usize, rng: &mut R) -> ResidualBlock {
        ResidualBlock {
            first: Conv2d::new(channels, channels, kernel, ActivationFunction::ReLU, rng),
            second: Conv2d::new(channels, channels, kernel, ActivationFunction::Identity, rng),
        }
    }

    pub fn forward(&mut self, input: &Tensor, training: bool) -> Result<Tensor> {
        let hidden = self.first.forward(input, training)?;
        let branch = self.second.forward(&hidden, training)?;
        input.zip_map(&branch, |a, b| a + b)
    }

    pub fn backward(&mut self, grad: &Tensor) -> Result<Tensor> {
        let through_second = self.second.backward(grad)?;
        let through_branch = self.first.backward(&through_second)?;
        grad.zip_map(&through_branch, |skip, branch| skip + branch)
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params = self.first.parameters_mut();
        params.extend(self.second.parameters_mut());
        params
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        let mut params = self.first.parameters();
        params.extend(self.second.parameters());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_branch_is_identity() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut block = ResidualBlock::new(2, 3, &mut rng);
        for p in block.parameters_mut() {
            p.value.data_mut().iter_mut().for_each(|v| *v = 0.0);
        }
        let x = Tensor::from_vec([1, 2, 2, 2], (0..8).map(|v| v as f64).collect()).unwrap();
        let y = block.forward(&x, true).unwrap();
        assert_eq!(y, x);
        let g = Tensor::filled(x.shape(), 1.0);
        assert_eq!(block.backward(&g).unwrap(), g);
        assert_eq!(block.parameters().len(), 4);
    }
}
