//! Conversions between image files and normalized NCHW tensors, plus the
//! grid writer used for sample dumps and predictions.
use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;
use crate::network::metadata::{ColorMode, Normalization};

const GRID_PADDING: u32 = 2;

/// Decodes `path` and returns a `[1, C, H, W]` normalized tensor.
pub fn load_image(path: &Path, color: ColorMode, norm: &Normalization) -> Result<Tensor> {
    let img = image::open(path)?;
    image_to_tensor(&img, color, norm)
}

pub fn image_to_tensor(img: &DynamicImage, color: ColorMode, norm: &Normalization) -> Result<Tensor> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let c = color.channels();
    let mut data = vec![0.0; c * h * w];
    match color {
        ColorMode::Grayscale => {
            for (i, p) in img.to_luma8().pixels().enumerate() {
                data[i] = norm.normalize(0, p.0[0]);
            }
        }
        ColorMode::Rgb => {
            for (i, p) in img.to_rgb8().pixels().enumerate() {
                for ch in 0..3 {
                    data[ch * h * w + i] = norm.normalize(ch, p.0[ch]);
                }
            }
        }
    }
    Tensor::from_vec([1, c, h, w], data)
}

/// Lays out each tensor as one row of a grid (one cell per batch item) and
/// writes it to `path`. Intensities are min-max scaled over the whole grid;
/// single-channel tensors are rendered as gray.
pub fn save_grid(path: &Path, rows: &[&Tensor]) -> Result<()> {
    let first = rows.first()
        .ok_or_else(|| Error::DataShape("cannot save an empty image grid".into()))?;
    let [n, c, h, w] = first.shape();
    if rows.iter().any(|r| r.shape() != first.shape()) {
        return Err(Error::DataShape("all grid rows must share one shape".into()));
    }
    if c != 1 && c != 3 {
        return Err(Error::DataShape(format!("cannot render {} channels as an image", c)));
    }

    let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
        let (a, b) = r.min_max();
        (lo.min(a), hi.max(b))
    });
    let range = hi - lo;
    let to_byte = |v: f64| -> u8 {
        if range > 0.0 && range.is_finite() {
            (((v - lo) / range).clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            0
        }
    };

    let pad = GRID_PADDING;
    let cell_w = w as u32 + pad;
    let cell_h = h as u32 + pad;
    let mut canvas = RgbImage::new(n as u32 * cell_w + pad, rows.len() as u32 * cell_h + pad);

    for (row, tensor) in rows.iter().enumerate() {
        for item in 0..n {
            let x0 = pad + item as u32 * cell_w;
            let y0 = pad + row as u32 * cell_h;
            for y in 0..h {
                for x in 0..w {
                    let px = if c == 1 {
                        let g = to_byte(tensor.at(item, 0, y, x));
                        [g, g, g]
                    } else {
                        [
                            to_byte(tensor.at(item, 0, y, x)),
                            to_byte(tensor.at(item, 1, y, x)),
                            to_byte(tensor.at(item, 2, y, x)),
                        ]
                    };
                    canvas.put_pixel(x0 + x as u32, y0 + y as u32, Rgb(px));
                }
            }
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    canvas.save(path)?;
    Ok(())
}

/// Gaussian blur used to synthesise an obfuscated input at inference time.
pub fn gaussian_blur(img: &DynamicImage, radius: f32) -> DynamicImage {
    img.blur(radius)
}
