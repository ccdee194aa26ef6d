pub mod metrics;
pub mod epoch_stats;
pub mod train_config;
pub mod epoch;
pub mod checkpoint;
pub mod trainer;

pub use metrics::RunningMetric;
pub use epoch_stats::{EpochStats, MetricsLog};
pub use train_config::{RunDescriptor, TrainingConfig};
pub use epoch::{EpochResult, EpochRunner, Phase};
pub use checkpoint::{Checkpoint, CheckpointManager};
pub use trainer::{BestScore, Trainer, TrainingSummary};
