use crate::error::Result;
use crate::network::model::Model;
use crate::optim::optimizer::Optimizer;

/// Plain SGD with optional L2 weight decay.
pub struct Sgd {
    pub learning_rate: f64,
    pub weight_decay: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, weight_decay: 0.0 }
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Sgd {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for Sgd {
    /// θ ← θ − lr · (∇θ + λθ)
    fn step(&mut self, model: &mut dyn Model) -> Result<()> {
        let (lr, wd) = (self.learning_rate, self.weight_decay);
        for param in model.parameters_mut() {
            let grads = param.grad.data().to_vec();
            for (w, g) in param.value.data_mut().iter_mut().zip(grads) {
                *w -= lr * (g + wd * *w);
            }
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::Architecture;

    #[test]
    fn step_moves_against_the_gradient() {
        let arch = Architecture::Baseline { channels: 1, hidden: 1, kernel: 1, num_convblocks: 0 };
        let mut model = arch.build(0).unwrap();
        let before: Vec<f64> = model.parameters().iter().map(|p| p.value.data()[0]).collect();
        for p in model.parameters_mut() {
            p.grad.data_mut()[0] = 2.0;
        }
        let mut sgd = Sgd::new(0.1);
        sgd.step(model.as_mut()).unwrap();
        for (p, b) in model.parameters().iter().zip(before) {
            assert!((p.value.data()[0] - (b - 0.2)).abs() < 1e-12);
        }
        sgd.zero_grad(model.as_mut());
        assert!(model.parameters().iter().all(|p| p.grad.data()[0] == 0.0));
    }

    #[test]
    fn weight_decay_shrinks_weights_without_gradient() {
        let arch = Architecture::Baseline { channels: 1, hidden: 1, kernel: 1, num_convblocks: 0 };
        let mut model = arch.build(4).unwrap();
        let before: Vec<f64> = model.parameters().iter().map(|p| p.value.data()[0]).collect();
        let mut sgd = Sgd::new(0.5).with_weight_decay(0.1);
        sgd.step(model.as_mut()).unwrap();
        for (p, b) in model.parameters().iter().zip(before) {
            assert!((p.value.data()[0] - b * 0.95).abs() < 1e-12);
        }
    }
}
