pub mod optimizer;
pub mod sgd;
pub mod adam;
pub mod scheduler;

pub use optimizer::Optimizer;
pub use sgd::Sgd;
pub use adam::Adam;
pub use scheduler::{LrScheduler, StepLr};
