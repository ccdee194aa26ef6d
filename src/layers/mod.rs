pub mod parameter;
pub mod conv;
pub mod residual;

pub use parameter::Parameter;
pub use conv::Conv2d;
pub use residual::ResidualBlock;
