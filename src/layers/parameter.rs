use crate::error::Result;
use crate::math::tensor::Tensor;

/// A trainable tensor paired with its accumulated gradient.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub value: Tensor,
    pub grad: Tensor,
}

impl Parameter {
    pub fn new(value: Tensor) -> Parameter {
        let grad = Tensor::zeros(value.shape());
        Parameter { value, grad }
    }

    pub fn zero_grad(&mut self) {
        self.grad.data_mut().iter_mut().for_each(|g| *g = 0.0);
    }

    /// Adds `delta` into the stored gradient.
    pub fn accumulate(&mut self, delta: &Tensor) -> Result<()> {
        self.grad.ensure_same_shape(delta)?;
        for (g, d) in self.grad.data_mut().iter_mut().zip(delta.data().iter()) {
            *g += d;
        }
        Ok(())
    }

    /// Replaces the value, keeping the shape fixed.
    pub fn load(&mut self, value: &Tensor) -> Result<()> {
        self.value.ensure_same_shape(value)?;
        self.value = value.clone();
        Ok(())
    }
}
