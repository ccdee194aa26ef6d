pub mod mse;
pub mod loss_type;
pub mod policy;
pub mod psnr;

pub use mse::MseLoss;
pub use loss_type::LossMode;
pub use policy::{LossBreakdown, LossPolicy};
pub use psnr::PsnrMetric;
