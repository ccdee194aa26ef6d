use std::path::{Path, PathBuf};

use tracing::info;

use crate::data::image_io::{gaussian_blur, image_to_tensor, save_grid};
use crate::error::Result;
use crate::math::tensor::Tensor;
use crate::network::metadata::{ColorMode, Normalization};
use crate::network::model::{from_state, Model};
use crate::train::checkpoint::CheckpointManager;

/// Model input, model output and the clean reference for one image.
pub struct Prediction {
    pub blurred: Tensor,
    pub output: Tensor,
    pub clean: Tensor,
}

/// Runs a trained model on single images.
pub struct Predictor {
    model: Box<dyn Model>,
    color: ColorMode,
    normalization: Normalization,
    pub blur_radius: f32,
}

impl Predictor {
    pub fn new(mut model: Box<dyn Model>, blur_radius: f32) -> Predictor {
        model.set_training(false);
        let color = if model.architecture().channels() == 1 {
            ColorMode::Grayscale
        } else {
            ColorMode::Rgb
        };
        Predictor { model, color, normalization: Normalization::lfw(color), blur_radius }
    }

    /// Loads the best checkpoint of `run_id`. `Ok(None)` when the run has
    /// no best checkpoint yet.
    pub fn from_best(checkpoints: &CheckpointManager, run_id: &str, blur_radius: f32) -> Result<Option<Predictor>> {
        let Some(checkpoint) = checkpoints.load_best(run_id)? else {
            return Ok(None);
        };
        info!("=> loading checkpoint '{}' (epoch {})", run_id, checkpoint.epoch);
        let model = from_state(&checkpoint.model)?;
        Ok(Some(Predictor::new(model, blur_radius)))
    }

    /// Blurs the clean image at `path`, reconstructs it and returns all three.
    pub fn predict_file(&mut self, path: &Path) -> Result<Prediction> {
        let clean_img = image::open(path)?;
        let blurred_img = gaussian_blur(&clean_img, self.blur_radius);
        let clean = image_to_tensor(&clean_img, self.color, &self.normalization)?;
        let blurred = image_to_tensor(&blurred_img, self.color, &self.normalization)?;
        info!(shape = ?blurred.shape(), "blurred input to model");
        let output = self.model.forward(&blurred)?;
        info!(shape = ?output.shape(), "model output");
        Ok(Prediction { blurred, output, clean })
    }
}

impl Prediction {
    /// Writes `prediction.jpg`, `blurred.jpg` and `ground_truth.jpg` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(3);
        for (name, tensor) in [
            ("prediction.jpg", &self.output),
            ("blurred.jpg", &self.blurred),
            ("ground_truth.jpg", &self.clean),
        ] {
            let path = dir.join(name);
            save_grid(&path, &[tensor])?;
            written.push(path);
        }
        Ok(written)
    }
}
