use serde::{Serialize, Deserialize};

use crate::math::tensor::Tensor;

/// Element-wise activation applied after a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    ReLU,
    Identity,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity => x,
        }
    }

    /// Derivative evaluated at the pre-activation value `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
        }
    }

    pub fn apply(&self, z: &Tensor) -> Tensor {
        match self {
            ActivationFunction::Identity => z.clone(),
            _ => z.map(|x| self.function(x)),
        }
    }

    /// δ = ∂L/∂a ⊙ σ'(z)
    pub fn backward(&self, z: &Tensor, grad: &Tensor) -> Tensor {
        match self {
            ActivationFunction::Identity => grad.clone(),
            _ => {
                let mut out = grad.clone();
                for (g, &zv) in out.data_mut().iter_mut().zip(z.data().iter()) {
                    *g *= self.derivative(zv);
                }
                out
            }
        }
    }
}
