use crate::error::{Error, Result};

/// Ceiling reported for a perfect (zero-error) reconstruction.
pub const DEFAULT_MAX_PSNR_DB: f64 = 100.0;

/// PSNR derived from a mean-squared error: `10 · log10(255 / mse)`.
///
/// The numerator is the peak value itself rather than its square; values are
/// therefore comparable only with other runs of this crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsnrMetric {
    pub max_db: f64,
}

impl Default for PsnrMetric {
    fn default() -> Self {
        PsnrMetric { max_db: DEFAULT_MAX_PSNR_DB }
    }
}

impl PsnrMetric {
    pub fn new(max_db: f64) -> PsnrMetric {
        PsnrMetric { max_db }
    }

    /// Returns `max_db` for `mse == 0` and clamps anything above it.
    /// Negative or non-finite inputs are a `Numeric` error.
    pub fn psnr(&self, mse: f64) -> Result<f64> {
        if !mse.is_finite() || mse < 0.0 {
            return Err(Error::Numeric(format!("cannot derive PSNR from mse = {}", mse)));
        }
        if mse == 0.0 {
            return Ok(self.max_db);
        }
        Ok((10.0 * (255.0 / mse).log10()).min(self.max_db))
    }
}
