use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::parameter::Parameter;
use crate::math::tensor::Tensor;
use crate::network::spec::Architecture;

/// Serializable model snapshot: the architecture identifier plus every
/// parameter tensor in `Model::parameters()` order. Gradients and cached
/// activations are not part of the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub architecture: Architecture,
    pub parameters: Vec<Tensor>,
}

/// Image-to-image network driven by the training loop.
///
/// `forward` in training mode caches whatever `backward` needs; `backward`
/// adds ∂L/∂θ into each parameter's gradient and never touches the values.
/// Only an optimizer changes parameter values.
pub trait Model: Send {
    fn architecture(&self) -> &Architecture;

    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    /// Back-propagates ∂L/∂output through the last training-mode forward pass.
    fn backward(&mut self, grad_output: &Tensor) -> Result<()>;

    /// Switches between training (activations cached for backprop) and
    /// evaluation mode.
    fn set_training(&mut self, training: bool);

    fn is_training(&self) -> bool;

    fn parameters(&self) -> Vec<&Parameter>;

    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.value.len()).sum()
    }

    fn state(&self) -> ModelState {
        ModelState {
            architecture: self.architecture().clone(),
            parameters: self.parameters().iter().map(|p| p.value.clone()).collect(),
        }
    }

    fn load_state(&mut self, state: &ModelState) -> Result<()> {
        if &state.architecture != self.architecture() {
            return Err(Error::Model(format!(
                "checkpoint was saved for {:?}, model is {:?}",
                state.architecture,
                self.architecture()
            )));
        }
        let mut params = self.parameters_mut();
        if params.len() != state.parameters.len() {
            return Err(Error::Model(format!(
                "checkpoint holds {} parameter tensors, model has {}",
                state.parameters.len(),
                params.len()
            )));
        }
        for (param, value) in params.iter_mut().zip(state.parameters.iter()) {
            param.load(value)?;
        }
        Ok(())
    }
}

/// Restores a model from a saved state, building the architecture it names.
pub fn from_state(state: &ModelState) -> Result<Box<dyn Model>> {
    let mut model = state.architecture.build(0)?;
    model.load_state(state)?;
    Ok(model)
}
