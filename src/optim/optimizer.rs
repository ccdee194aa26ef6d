use crate::error::Result;
use crate::network::model::Model;

/// Applies accumulated parameter gradients to a model.
pub trait Optimizer {
    /// Clears every parameter gradient before the next backward pass.
    fn zero_grad(&mut self, model: &mut dyn Model) {
        for param in model.parameters_mut() {
            param.zero_grad();
        }
    }

    /// One update from the gradients currently stored on the model.
    fn step(&mut self, model: &mut dyn Model) -> Result<()>;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}
