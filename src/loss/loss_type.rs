use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::Error;

/// Selects how the training loss is composed.
///
/// - `Pixel`           : MSE between output and target images.
/// - `Perceptual`      : MSE between feature-extractor activations of output
///   and target.
/// - `PixelPerceptual` : `0.5 * pixel + perceptual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossMode {
    Pixel,
    Perceptual,
    PixelPerceptual,
}

impl LossMode {
    pub fn needs_extractor(self) -> bool {
        !matches!(self, LossMode::Pixel)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LossMode::Pixel => "pixel",
            LossMode::Perceptual => "perceptual",
            LossMode::PixelPerceptual => "pixel_perceptual",
        }
    }
}

impl fmt::Display for LossMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossMode {
    type Err = Error;

    /// Accepts `mse` as a synonym for `pixel`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pixel" | "mse" => Ok(LossMode::Pixel),
            "perceptual" => Ok(LossMode::Perceptual),
            "pixel_perceptual" => Ok(LossMode::PixelPerceptual),
            other => Err(Error::Configuration(format!(
                "unknown loss mode '{}' (expected pixel, perceptual or pixel_perceptual)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes_and_alias() {
        assert_eq!("pixel".parse::<LossMode>().unwrap(), LossMode::Pixel);
        assert_eq!("MSE".parse::<LossMode>().unwrap(), LossMode::Pixel);
        assert_eq!("perceptual".parse::<LossMode>().unwrap(), LossMode::Perceptual);
        assert_eq!(
            "pixel_perceptual".parse::<LossMode>().unwrap(),
            LossMode::PixelPerceptual
        );
    }

    #[test]
    fn unknown_mode_is_a_configuration_error() {
        let err = "ssim".parse::<LossMode>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn display_round_trips() {
        for mode in [LossMode::Pixel, LossMode::Perceptual, LossMode::PixelPerceptual] {
            assert_eq!(mode.to_string().parse::<LossMode>().unwrap(), mode);
        }
    }
}
