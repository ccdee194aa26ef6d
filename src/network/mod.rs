pub mod metadata;
pub mod model;
pub mod spec;
pub mod baseline;
pub mod resnet;
pub mod extractor;

pub use metadata::{ColorMode, Normalization};
pub use model::{Model, ModelState};
pub use spec::Architecture;
pub use baseline::BaselineCnn;
pub use resnet::ResidualCnn;
pub use extractor::{ConvFeatureExtractor, FeatureExtractor};
