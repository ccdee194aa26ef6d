pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod train;
pub mod inference;
pub mod cli;
pub mod logging;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::tensor::Tensor;
pub use network::{Architecture, Model, ModelState};
pub use loss::{LossMode, LossPolicy, PsnrMetric};
pub use optim::{Adam, Optimizer, Sgd, StepLr};
pub use data::{Batch, BatchSource, DataLoader};
pub use train::{CheckpointManager, EpochRunner, Trainer, TrainingConfig};
