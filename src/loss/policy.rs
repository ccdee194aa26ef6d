use std::sync::Arc;

use crate::error::{Error, Result};
use crate::loss::loss_type::LossMode;
use crate::loss::mse::MseLoss;
use crate::math::tensor::Tensor;
use crate::network::extractor::FeatureExtractor;

/// Weight of the pixel term in `PixelPerceptual`. The perceptual term is
/// added unweighted.
pub const PIXEL_WEIGHT: f64 = 0.5;

/// Components of one loss evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossBreakdown {
    /// The value that is optimised.
    pub total: f64,
    /// Pixel MSE, always computed since PSNR is derived from it.
    pub pixel: f64,
    /// Feature-space MSE; `None` in `Pixel` mode.
    pub perceptual: Option<f64>,
}

/// Turns (output, target) into a scalar loss according to a `LossMode`.
pub struct LossPolicy {
    mode: LossMode,
    extractor: Option<Arc<dyn FeatureExtractor>>,
}

impl LossPolicy {
    /// Fails with `Configuration` when a perceptual mode has no extractor.
    pub fn new(mode: LossMode, extractor: Option<Arc<dyn FeatureExtractor>>) -> Result<LossPolicy> {
        if mode.needs_extractor() && extractor.is_none() {
            return Err(Error::Configuration(format!(
                "loss mode '{}' requires a feature extractor",
                mode
            )));
        }
        Ok(LossPolicy { mode, extractor })
    }

    pub fn pixel() -> LossPolicy {
        LossPolicy { mode: LossMode::Pixel, extractor: None }
    }

    pub fn mode(&self) -> LossMode {
        self.mode
    }

    /// Combines already computed terms for `mode`.
    pub fn combine(mode: LossMode, pixel: f64, perceptual: f64) -> f64 {
        match mode {
            LossMode::Pixel => pixel,
            LossMode::Perceptual => perceptual,
            LossMode::PixelPerceptual => PIXEL_WEIGHT * pixel + perceptual,
        }
    }

    fn extractor(&self) -> Result<&dyn FeatureExtractor> {
        self.extractor.as_deref().ok_or_else(|| {
            Error::Configuration(format!("loss mode '{}' requires a feature extractor", self.mode))
        })
    }

    pub fn compute(&self, output: &Tensor, target: &Tensor) -> Result<LossBreakdown> {
        let pixel = MseLoss::loss(output, target)?;
        let perceptual = match self.mode {
            LossMode::Pixel => None,
            LossMode::Perceptual | LossMode::PixelPerceptual => {
                let extractor = self.extractor()?;
                let f_out = extractor.extract(output)?;
                let f_tgt = extractor.extract(target)?;
                Some(MseLoss::loss(&f_out, &f_tgt)?)
            }
        };
        Ok(LossBreakdown {
            total: Self::combine(self.mode, pixel, perceptual.unwrap_or(0.0)),
            pixel,
            perceptual,
        })
    }

    /// Like `compute`, also returning ∂total/∂output for backprop.
    pub fn compute_with_grad(&self, output: &Tensor, target: &Tensor) -> Result<(LossBreakdown, Tensor)> {
        let pixel = MseLoss::loss(output, target)?;
        let pixel_grad = MseLoss::derivative(output, target)?;
        let (perceptual, grad) = match self.mode {
            LossMode::Pixel => (None, pixel_grad),
            LossMode::Perceptual | LossMode::PixelPerceptual => {
                let extractor = self.extractor()?;
                let f_out = extractor.extract(output)?;
                let f_tgt = extractor.extract(target)?;
                let value = MseLoss::loss(&f_out, &f_tgt)?;
                let feature_grad = MseLoss::derivative(&f_out, &f_tgt)?;
                let perceptual_grad = extractor.backward(output, &feature_grad)?;
                let grad = if self.mode == LossMode::Perceptual {
                    perceptual_grad
                } else {
                    pixel_grad.zip_map(&perceptual_grad, |p, q| PIXEL_WEIGHT * p + q)?
                };
                (Some(value), grad)
            }
        };
        let breakdown = LossBreakdown {
            total: Self::combine(self.mode, pixel, perceptual.unwrap_or(0.0)),
            pixel,
            perceptual,
        };
        Ok((breakdown, grad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::extractor::ConvFeatureExtractor;

    fn extractor() -> Option<Arc<dyn FeatureExtractor>> {
        Some(Arc::new(ConvFeatureExtractor::seeded(1, 5)))
    }

    fn image(seed: f64) -> Tensor {
        Tensor::from_vec([1, 1, 4, 4], (0..16).map(|x| ((x as f64 + seed) * 0.9).sin()).collect()).unwrap()
    }

    #[test]
    fn perceptual_modes_need_an_extractor() {
        assert!(matches!(LossPolicy::new(LossMode::Perceptual, None), Err(Error::Configuration(_))));
        assert!(matches!(LossPolicy::new(LossMode::PixelPerceptual, None), Err(Error::Configuration(_))));
        assert!(LossPolicy::new(LossMode::Pixel, None).is_ok());
    }

    #[test]
    fn pixel_loss_of_identical_images_is_zero() {
        let x = image(0.0);
        let (b, grad) = LossPolicy::pixel().compute_with_grad(&x, &x).unwrap();
        assert_eq!(b.total, 0.0);
        assert!(grad.data().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn pixel_perceptual_weights_pixel_by_half() {
        assert_eq!(LossPolicy::combine(LossMode::PixelPerceptual, 2.0, 3.0), 4.0);
        let policy = LossPolicy::new(LossMode::PixelPerceptual, extractor()).unwrap();
        let b = policy.compute(&image(0.0), &image(1.0)).unwrap();
        let perceptual = b.perceptual.unwrap();
        assert!((b.total - (0.5 * b.pixel + perceptual)).abs() < 1e-12);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let a = Tensor::zeros([1, 1, 4, 4]);
        let b = Tensor::zeros([1, 1, 4, 2]);
        assert!(matches!(LossPolicy::pixel().compute(&a, &b), Err(Error::DataShape(_))));
    }

    #[test]
    fn perceptual_gradient_matches_finite_differences() {
        let policy = LossPolicy::new(LossMode::PixelPerceptual, extractor()).unwrap();
        let (out, tgt) = (image(0.0), image(2.0));
        let (_, grad) = policy.compute_with_grad(&out, &tgt).unwrap();
        let eps = 1e-6;
        for idx in [1, 7, 12] {
            let mut plus = out.clone();
            plus.data_mut()[idx] += eps;
            let mut minus = out.clone();
            minus.data_mut()[idx] -= eps;
            let numeric = (policy.compute(&plus, &tgt).unwrap().total
                - policy.compute(&minus, &tgt).unwrap().total) / (2.0 * eps);
            assert!((numeric - grad.data()[idx]).abs() < 1e-5);
        }
    }
}
