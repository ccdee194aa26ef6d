use crate::error::Result;
use crate::math::tensor::Tensor;

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((predicted - expected)²)
    pub fn loss(predicted: &Tensor, expected: &Tensor) -> Result<f64> {
        predicted.mse(expected)
    }

    /// Gradient w.r.t. `predicted`: 2·(predicted - expected) / n
    pub fn derivative(predicted: &Tensor, expected: &Tensor) -> Result<Tensor> {
        predicted.mse_grad(expected)
    }
}
