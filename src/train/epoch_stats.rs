use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::Result;

/// Per-epoch record emitted by the trainer.
///
/// Sent on `TrainingConfig::progress_tx` when configured and appended to the
/// JSONL metrics log when one is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub total_epochs: usize,
    pub train_loss: f64,
    pub train_psnr: f64,
    pub val_loss: f64,
    pub val_psnr: f64,
    /// Learning rate after the scheduler step that closed this epoch.
    pub learning_rate: f64,
    /// Whether this epoch set a new best validation PSNR.
    pub is_best: bool,
    /// Batches dropped for a non-finite loss, train and validation combined.
    pub skipped_batches: usize,
    pub elapsed_ms: u64,
}

/// Append-only JSON-lines log of `EpochStats`.
pub struct MetricsLog {
    writer: BufWriter<File>,
}

impl MetricsLog {
    pub fn create(path: &Path) -> Result<MetricsLog> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(MetricsLog { writer: BufWriter::new(file) })
    }

    pub fn append(&mut self, stats: &EpochStats) -> Result<()> {
        serde_json::to_writer(&mut self.writer, stats)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
