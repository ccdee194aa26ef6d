use serde::{Deserialize, Serialize};

/// Colour mode of the images fed to and produced by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Rgb,
    Grayscale,
}

impl ColorMode {
    pub fn channels(self) -> usize {
        match self {
            ColorMode::Rgb => 3,
            ColorMode::Grayscale => 1,
        }
    }

    /// Directory-name fragment, e.g. `cropped_rgb`.
    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::Rgb => "rgb",
            ColorMode::Grayscale => "grayscale",
        }
    }
}

/// Per-channel mean/std applied as `(x / 255 − mean) / std`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Normalization {
    /// Channel statistics of the cropped LFW training split.
    pub fn lfw(color: ColorMode) -> Normalization {
        let mean = [149.59638197, 114.21029544, 93.41318133];
        let std = [52.54902009, 44.34252746, 42.88273568];
        let n = color.channels();
        Normalization {
            mean: mean.iter().take(n).map(|m| m / 255.0).collect(),
            std: std.iter().take(n).map(|s| s / 255.0).collect(),
        }
    }

    /// Normalizes a raw 8-bit channel value of channel `c`.
    pub fn normalize(&self, c: usize, raw: u8) -> f64 {
        (raw as f64 / 255.0 - self.mean[c]) / self.std[c]
    }
}
