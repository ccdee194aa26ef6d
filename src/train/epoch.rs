use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use crate::data::dataset::Split;
use crate::data::image_io::save_grid;
use crate::data::loader::BatchSource;
use crate::error::{Error, Result};
use crate::loss::policy::LossPolicy;
use crate::loss::psnr::PsnrMetric;
use crate::network::model::Model;
use crate::optim::optimizer::Optimizer;
use crate::train::metrics::RunningMetric;

/// Whether a pass updates weights. Training carries the optimizer so a
/// validation pass cannot step it.
pub enum Phase<'a> {
    Train { optimizer: &'a mut dyn Optimizer },
    Validate,
}

impl Phase<'_> {
    pub fn split(&self) -> Split {
        match self {
            Phase::Train { .. } => Split::Train,
            Phase::Validate => Split::Val,
        }
    }

    pub fn is_train(&self) -> bool {
        matches!(self, Phase::Train { .. })
    }
}

/// Outcome of one completed pass over a batch source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochResult {
    pub mean_loss: f64,
    pub mean_psnr: f64,
    /// Batches that contributed to the means.
    pub batches: usize,
    /// Batches dropped because their loss or PSNR was not finite.
    pub skipped_batches: usize,
    pub mean_batch_secs: f64,
}

/// Runs a model once over a batch source, in train or validate phase.
pub struct EpochRunner {
    pub log_interval: usize,
    /// `{outdir}/{run_id}`; sample grids land in `{split}/{epoch}_{iteration}_iter.jpg` below it.
    pub sample_dir: Option<PathBuf>,
    pub psnr: PsnrMetric,
}

impl EpochRunner {
    pub fn new(log_interval: usize) -> EpochRunner {
        EpochRunner { log_interval, sample_dir: None, psnr: PsnrMetric::default() }
    }

    pub fn with_samples(mut self, dir: PathBuf) -> EpochRunner {
        self.sample_dir = Some(dir);
        self
    }

    pub fn with_psnr(mut self, psnr: PsnrMetric) -> EpochRunner {
        self.psnr = psnr;
        self
    }

    /// One pass: forward, loss, (train: zero-grad, backward, step), metrics,
    /// periodic log and sample dump.
    ///
    /// Shape errors and model errors abort the pass. A batch whose loss,
    /// gradient or PSNR is not finite is logged and skipped; if every batch
    /// is skipped the pass fails with `Numeric`.
    pub fn run(
        &self,
        epoch: usize,
        source: &mut dyn BatchSource,
        model: &mut dyn Model,
        loss: &LossPolicy,
        mut phase: Phase<'_>,
    ) -> Result<EpochResult> {
        let split = phase.split();
        model.set_training(phase.is_train());

        let total = source.len();
        let mut batch_time = RunningMetric::new();
        let mut losses = RunningMetric::new();
        let mut psnrs = RunningMetric::new();
        let mut seen = 0usize;
        let mut skipped = 0usize;

        let mut start = Instant::now();
        for (i, batch) in source.batches().enumerate() {
            let iteration = i + 1;
            let batch = batch?;
            seen += 1;

            let output = model.forward(&batch.input)?;
            output.ensure_same_shape(&batch.target)?;

            let (breakdown, grad) = if phase.is_train() {
                let (b, g) = loss.compute_with_grad(&output, &batch.target)?;
                (b, Some(g))
            } else {
                (loss.compute(&output, &batch.target)?, None)
            };

            let finite = breakdown.total.is_finite() && grad.as_ref().map_or(true, |g| g.is_finite());
            let psnr = match self.psnr.psnr(breakdown.pixel) {
                Ok(p) if finite => Some(p),
                Ok(_) => None,
                Err(e) if e.is_recoverable() => None,
                Err(e) => return Err(e),
            };
            let Some(psnr) = psnr else {
                warn!(
                    split = %split, epoch, iteration,
                    loss = breakdown.total, mse = breakdown.pixel,
                    "non-finite loss, skipping batch"
                );
                skipped += 1;
                start = Instant::now();
                continue;
            };

            if let (Phase::Train { optimizer }, Some(grad)) = (&mut phase, grad.as_ref()) {
                optimizer.zero_grad(model);
                model.backward(grad)?;
                optimizer.step(model)?;
            }

            let n = batch.len() as f64;
            losses.update(breakdown.total, n);
            psnrs.update(psnr, n);
            batch_time.update(start.elapsed().as_secs_f64(), 1.0);
            start = Instant::now();

            if self.log_interval > 0 && iteration % self.log_interval == 0 {
                if let Some(dir) = &self.sample_dir {
                    let path = dir.join(split.as_str()).join(format!("{}_{}_iter.jpg", epoch, iteration));
                    // Diagnostic only; a failed dump does not stop training.
                    if let Err(e) = save_grid(&path, &[&batch.input, &output, &batch.target]) {
                        warn!(path = %path.display(), error = %e, "could not save sample image");
                    }
                }
                match split {
                    Split::Train => info!(
                        "Epoch: [{}][{}/{}]\tTime {:.3} ({:.3})\tLoss {:.4} ({:.4})\tPSNR {:.3} ({:.3})",
                        epoch, iteration, total,
                        batch_time.val, batch_time.average(),
                        losses.val, losses.average(),
                        psnrs.val, psnrs.average(),
                    ),
                    _ => info!(
                        "Test: [{}/{}]\tTime {:.3} ({:.3})\tLoss {:.4} ({:.4})\tPSNR {:.3} ({:.3})",
                        iteration, total,
                        batch_time.val, batch_time.average(),
                        losses.val, losses.average(),
                        psnrs.val, psnrs.average(),
                    ),
                }
            }
        }

        if seen > 0 && skipped == seen {
            return Err(Error::Numeric(format!(
                "every {} batch in epoch {} produced a non-finite loss",
                split, epoch
            )));
        }

        Ok(EpochResult {
            mean_loss: losses.average(),
            mean_psnr: psnrs.average(),
            batches: seen - skipped,
            skipped_batches: skipped,
            mean_batch_secs: batch_time.average(),
        })
    }
}
