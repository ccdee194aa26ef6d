pub mod batch;
pub mod dataset;
pub mod loader;
pub mod image_io;

pub use batch::Batch;
pub use dataset::{Dataset, ImageFolderDataset, InMemoryDataset, Split};
pub use loader::{BatchSource, DataLoader};
