use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Dense 4-D tensor laid out as `[batch, channel, height, width]`, row-major.
///
/// Deserialization goes through `from_vec`, so a file whose data does not
/// fill its shape is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: [usize; 4],
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawTensor {
    shape: [usize; 4],
    data: Vec<f64>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = Error;

    fn try_from(raw: RawTensor) -> Result<Tensor> {
        Tensor::from_vec(raw.shape, raw.data)
    }
}

impl Tensor {
    pub fn zeros(shape: [usize; 4]) -> Tensor {
        Tensor::filled(shape, 0.0)
    }

    pub fn filled(shape: [usize; 4], value: f64) -> Tensor {
        Tensor {
            shape,
            data: vec![value; shape.iter().product()],
        }
    }

    /// Wraps `data` as a tensor of `shape`; fails if the element count differs.
    pub fn from_vec(shape: [usize; 4], data: Vec<f64>) -> Result<Tensor> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::DataShape(format!(
                "{} values cannot fill a tensor of shape {:?} ({} elements)",
                data.len(), shape, expected
            )));
        }
        Ok(Tensor { shape, data })
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Draw two independent uniform samples in (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// He initialization: samples from N(0, sqrt(2 / fan_in)).
    ///
    /// Recommended before ReLU layers. For a convolution kernel the fan-in is
    /// `in_channels * kernel * kernel`.
    pub fn he<R: Rng + ?Sized>(shape: [usize; 4], fan_in: usize, rng: &mut R) -> Tensor {
        let std_dev = (2.0 / fan_in.max(1) as f64).sqrt();
        let mut res = Tensor::zeros(shape);
        for x in res.data.iter_mut() {
            *x = Tensor::sample_standard_normal(rng) * std_dev;
        }
        res
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn batch(&self) -> usize {
        self.shape[0]
    }

    pub fn channels(&self) -> usize {
        self.shape[1]
    }

    pub fn height(&self) -> usize {
        self.shape[2]
    }

    pub fn width(&self) -> usize {
        self.shape[3]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Flat offset of element `(n, c, y, x)`.
    #[inline]
    pub fn offset(&self, n: usize, c: usize, y: usize, x: usize) -> usize {
        let [_, ch, h, w] = self.shape;
        ((n * ch + c) * h + y) * w + x
    }

    #[inline]
    pub fn at(&self, n: usize, c: usize, y: usize, x: usize) -> f64 {
        self.data[self.offset(n, c, y, x)]
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            shape: self.shape,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Element-wise combination of two same-shape tensors.
    pub fn zip_map<F>(&self, other: &Tensor, functor: F) -> Result<Tensor>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.ensure_same_shape(other)?;
        Ok(Tensor {
            shape: self.shape,
            data: self.data.iter().zip(other.data.iter()).map(|(&a, &b)| functor(a, b)).collect(),
        })
    }

    pub fn ensure_same_shape(&self, other: &Tensor) -> Result<()> {
        if self.shape != other.shape {
            return Err(Error::DataShape(format!(
                "shape {:?} does not match {:?}",
                self.shape, other.shape
            )));
        }
        Ok(())
    }

    /// Mean-squared error against `other`: mean((self - other)²).
    pub fn mse(&self, other: &Tensor) -> Result<f64> {
        self.ensure_same_shape(other)?;
        if self.data.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = self.data.iter().zip(other.data.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Ok(sum / self.data.len() as f64)
    }

    /// Gradient of `mse(self, other)` with respect to `self`: 2·(self − other)/n.
    pub fn mse_grad(&self, other: &Tensor) -> Result<Tensor> {
        let n = self.data.len().max(1) as f64;
        self.zip_map(other, |a, b| 2.0 * (a - b) / n)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    pub fn min_max(&self) -> (f64, f64) {
        self.data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
    }

    /// Concatenates tensors along the batch axis. All parts must agree on
    /// channel and spatial dimensions.
    pub fn concat(parts: &[&Tensor]) -> Result<Tensor> {
        let first = parts.first()
            .ok_or_else(|| Error::DataShape("cannot concatenate zero tensors".into()))?;
        let [_, c, h, w] = first.shape;
        let mut batch = 0;
        let mut data = Vec::new();
        for part in parts {
            let [n, pc, ph, pw] = part.shape;
            if (pc, ph, pw) != (c, h, w) {
                return Err(Error::DataShape(format!(
                    "cannot concatenate {:?} with {:?}",
                    part.shape, first.shape
                )));
            }
            batch += n;
            data.extend_from_slice(&part.data);
        }
        Ok(Tensor { shape: [batch, c, h, w], data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(Tensor::from_vec([1, 1, 2, 2], vec![0.0; 3]).is_err());
        assert!(Tensor::from_vec([1, 1, 2, 2], vec![0.0; 4]).is_ok());
    }

    #[test]
    fn deserialize_checks_element_count() {
        let short = r#"{"shape":[1,1,2,2],"data":[1.0]}"#;
        assert!(serde_json::from_str::<Tensor>(short).is_err());
        let full = r#"{"shape":[1,1,1,2],"data":[1.0,2.0]}"#;
        let t: Tensor = serde_json::from_str(full).unwrap();
        assert_eq!(t.data(), &[1.0, 2.0]);
    }

    #[test]
    fn offset_is_row_major_nchw() {
        let t = Tensor::from_vec([2, 2, 2, 3], (0..24).map(|x| x as f64).collect()).unwrap();
        assert_eq!(t.at(0, 0, 0, 2), 2.0);
        assert_eq!(t.at(0, 1, 0, 0), 6.0);
        assert_eq!(t.at(1, 0, 1, 1), 16.0);
    }

    #[test]
    fn mse_and_gradient() {
        let a = Tensor::from_vec([1, 1, 1, 2], vec![1.0, 3.0]).unwrap();
        let b = Tensor::from_vec([1, 1, 1, 2], vec![0.0, 1.0]).unwrap();
        assert!((a.mse(&b).unwrap() - 2.5).abs() < 1e-12);
        let g = a.mse_grad(&b).unwrap();
        assert_eq!(g.data(), &[1.0, 2.0]);
    }

    #[test]
    fn mse_rejects_shape_mismatch() {
        let a = Tensor::zeros([1, 3, 2, 2]);
        let b = Tensor::zeros([1, 1, 2, 2]);
        assert!(matches!(a.mse(&b), Err(Error::DataShape(_))));
    }

    #[test]
    fn concat_along_batch() {
        let t = Tensor::from_vec([2, 1, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let one = Tensor::from_vec([1, 1, 1, 2], vec![5.0, 6.0]).unwrap();
        let joined = Tensor::concat(&[&one, &t]).unwrap();
        assert_eq!(joined.shape(), [3, 1, 1, 2]);
        assert_eq!(joined.data(), &[5.0, 6.0, 1.0, 2.0, 3.0, 4.0]);
        let wide = Tensor::zeros([1, 1, 1, 3]);
        assert!(Tensor::concat(&[&one, &wide]).is_err());
        assert!(Tensor::concat(&[]).is_err());
    }

    #[test]
    fn he_init_is_seeded() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        assert_eq!(
            Tensor::he([2, 1, 3, 3], 9, &mut a),
            Tensor::he([2, 1, 3, 3], 9, &mut b)
        );
    }
}
