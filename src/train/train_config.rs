use std::path::PathBuf;
use std::sync::mpsc;

use serde::{Serialize, Deserialize};

use crate::loss::loss_type::LossMode;
use crate::loss::psnr::DEFAULT_MAX_PSNR_DB;
use crate::network::spec::Architecture;
use crate::train::epoch_stats::EpochStats;

/// Configuration of one training run, passed by reference to the `Trainer`.
///
/// # Fields
/// - `run_id`             : names the checkpoint, sample and results artifacts
/// - `epochs`             : number of train + validate cycles
/// - `loss_mode`          : loss composition, recorded for the run log
/// - `train_log_interval` : batches between progress lines while training
/// - `val_log_interval`   : batches between progress lines while validating
/// - `save_images`        : dump input/output/target grids at each log line
/// - `image_dir`          : root of the sample dumps
/// - `checkpoint_dir`     : root of the per-run checkpoint directories
/// - `results_dir`        : where the per-epoch validation PSNRs are written,
///                          if at all
/// - `metrics_path`       : optional JSON-lines log of `EpochStats`
/// - `max_psnr_db`        : PSNR reported for a zero-error batch
/// - `progress_tx`        : optional channel receiving one `EpochStats` per epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub run_id: String,
    pub epochs: usize,
    pub loss_mode: LossMode,
    pub train_log_interval: usize,
    pub val_log_interval: usize,
    pub save_images: bool,
    pub image_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub results_dir: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
    pub max_psnr_db: f64,
    #[serde(skip)]
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl TrainingConfig {
    /// Creates a `TrainingConfig` with the default artifact locations, no
    /// image dumps, no results file and no progress channel.
    pub fn new(run_id: impl Into<String>, epochs: usize, loss_mode: LossMode) -> Self {
        TrainingConfig {
            run_id: run_id.into(),
            epochs,
            loss_mode,
            train_log_interval: 500,
            val_log_interval: 100,
            save_images: false,
            image_dir: PathBuf::from("images_from_runs"),
            checkpoint_dir: PathBuf::from("saved_models"),
            results_dir: None,
            metrics_path: None,
            max_psnr_db: DEFAULT_MAX_PSNR_DB,
            progress_tx: None,
        }
    }
}

/// Hyperparameters that make up a run identifier.
pub struct RunDescriptor<'a> {
    pub architecture: &'a Architecture,
    pub method: &'a str,
    pub size: Option<u32>,
    pub loss_mode: LossMode,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
}

impl RunDescriptor<'_> {
    /// `{model}_method={m}_size={s}_loss={l}_lr={lr}_epochs={e}_batch_size={b}` plus
    /// the architecture's block-count suffix.
    pub fn run_id(&self) -> String {
        let size = self.size.map(|s| s.to_string()).unwrap_or_else(|| "None".into());
        format!(
            "{}_method={}_size={}_loss={}_lr={}_epochs={}_batch_size={}{}",
            self.architecture.name(),
            self.method,
            size,
            self.loss_mode,
            self.learning_rate,
            self.epochs,
            self.batch_size,
            self.architecture.block_suffix(),
        )
    }
}
