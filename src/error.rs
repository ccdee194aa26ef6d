use thiserror::Error;

/// Errors surfaced by training, inference and their collaborators.
///
/// `Configuration` and `DataShape` abort a run. `Numeric` is recovered at
/// batch granularity by the epoch runner. `Io` during a checkpoint write is
/// retried once before it propagates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("numeric error: {0}")]
    Numeric(String),

    #[error("data shape error: {0}")]
    DataShape(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for the batch-level failures the epoch runner skips over.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Numeric(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
