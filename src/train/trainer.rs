use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::data::loader::BatchSource;
use crate::error::Result;
use crate::loss::policy::LossPolicy;
use crate::loss::psnr::PsnrMetric;
use crate::network::model::Model;
use crate::optim::optimizer::Optimizer;
use crate::optim::scheduler::LrScheduler;
use crate::train::checkpoint::CheckpointManager;
use crate::train::epoch::{EpochRunner, Phase};
use crate::train::epoch_stats::{EpochStats, MetricsLog};
use crate::train::train_config::TrainingConfig;

/// Highest validation PSNR seen so far in a run. Starts at 0 and never
/// decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BestScore {
    best: f64,
}

impl BestScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f64 {
        self.best
    }

    /// Records `psnr`; true iff it is strictly better than every earlier value.
    pub fn update(&mut self, psnr: f64) -> bool {
        let is_best = psnr > self.best;
        self.best = self.best.max(psnr);
        is_best
    }
}

/// What a finished run reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub best_psnr: f64,
    /// Validation PSNR per epoch, in order.
    pub val_psnrs: Vec<f64>,
    pub history: Vec<EpochStats>,
}

/// Drives the epoch loop: train, validate, schedule the learning rate, track
/// the best validation PSNR, checkpoint.
pub struct Trainer<'c> {
    config: &'c TrainingConfig,
    model: Box<dyn Model>,
    optimizer: Box<dyn Optimizer>,
    scheduler: Box<dyn LrScheduler>,
    loss: LossPolicy,
    checkpoints: CheckpointManager,
    best: BestScore,
}

impl<'c> Trainer<'c> {
    pub fn new(
        config: &'c TrainingConfig,
        model: Box<dyn Model>,
        optimizer: Box<dyn Optimizer>,
        scheduler: Box<dyn LrScheduler>,
        loss: LossPolicy,
    ) -> Trainer<'c> {
        Trainer {
            checkpoints: CheckpointManager::new(&config.checkpoint_dir),
            config,
            model,
            optimizer,
            scheduler,
            loss,
            best: BestScore::new(),
        }
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Box<dyn Model> {
        self.model
    }

    pub fn best(&self) -> BestScore {
        self.best
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    fn runner(&self, log_interval: usize) -> EpochRunner {
        let runner = EpochRunner::new(log_interval).with_psnr(PsnrMetric::new(self.config.max_psnr_db));
        if self.config.save_images {
            runner.with_samples(self.config.image_dir.join(&self.config.run_id))
        } else {
            runner
        }
    }

    /// Runs `config.epochs` epochs sequentially and returns the summary.
    /// The validation PSNR file is written once all epochs completed.
    pub fn fit(
        &mut self,
        train: &mut dyn BatchSource,
        val: &mut dyn BatchSource,
    ) -> Result<TrainingSummary> {
        let cfg = self.config;
        info!(
            run_id = %cfg.run_id,
            epochs = cfg.epochs,
            loss = %self.loss.mode(),
            parameters = self.model.parameter_count(),
            train_batches = train.len(),
            val_batches = val.len(),
            "starting training"
        );

        let mut metrics_log = match &cfg.metrics_path {
            Some(path) => Some(MetricsLog::create(path)?),
            None => None,
        };
        let train_runner = self.runner(cfg.train_log_interval);
        let val_runner = self.runner(cfg.val_log_interval);

        let mut val_psnrs = Vec::with_capacity(cfg.epochs);
        let mut history = Vec::with_capacity(cfg.epochs);

        for epoch in 1..=cfg.epochs {
            let t_start = Instant::now();

            let train_result = train_runner.run(
                epoch,
                train,
                self.model.as_mut(),
                &self.loss,
                Phase::Train { optimizer: self.optimizer.as_mut() },
            )?;
            let val_result = val_runner.run(epoch, val, self.model.as_mut(), &self.loss, Phase::Validate)?;
            info!("AVG PSNR after epoch {}: {}", epoch, val_result.mean_psnr);

            let learning_rate = self.scheduler.step(val_result.mean_loss);
            self.optimizer.set_learning_rate(learning_rate);

            let is_best = self.best.update(val_result.mean_psnr);
            self.checkpoints.save(&cfg.run_id, epoch, &self.model.state(), is_best)?;
            val_psnrs.push(val_result.mean_psnr);

            let stats = EpochStats {
                epoch,
                total_epochs: cfg.epochs,
                train_loss: train_result.mean_loss,
                train_psnr: train_result.mean_psnr,
                val_loss: val_result.mean_loss,
                val_psnr: val_result.mean_psnr,
                learning_rate,
                is_best,
                skipped_batches: train_result.skipped_batches + val_result.skipped_batches,
                elapsed_ms: t_start.elapsed().as_millis() as u64,
            };
            if let Some(log) = metrics_log.as_mut() {
                log.append(&stats)?;
            }
            if let Some(tx) = &cfg.progress_tx {
                if tx.send(stats.clone()).is_err() {
                    debug!("progress receiver dropped");
                }
            }
            history.push(stats);
        }

        if let Some(dir) = &cfg.results_dir {
            let path = results_path(dir, &cfg.run_id);
            save_val_psnrs(&path, &val_psnrs)?;
            info!(path = %path.display(), "validation PSNR per epoch saved");
        }
        info!("Best PSNR on the validation set: {}", self.best.value());

        Ok(TrainingSummary { best_psnr: self.best.value(), val_psnrs, history })
    }
}

pub fn results_path(dir: &Path, run_id: &str) -> PathBuf {
    dir.join(format!("{}.txt", run_id))
}

/// Writes one PSNR value per line.
pub fn save_val_psnrs(path: &Path, val_psnrs: &[f64]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    for psnr in val_psnrs {
        writeln!(file, "{}", psnr)?;
    }
    Ok(())
}
