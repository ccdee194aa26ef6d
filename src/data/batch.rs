use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// An (obfuscated input, clean target) pair of `[batch, channel, height, width]` tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub input: Tensor,
    pub target: Tensor,
}

impl Batch {
    /// Fails with `DataShape` unless input and target have the same shape.
    pub fn new(input: Tensor, target: Tensor) -> Result<Batch> {
        if input.shape() != target.shape() {
            return Err(Error::DataShape(format!(
                "input {:?} and target {:?} differ in shape",
                input.shape(),
                target.shape()
            )));
        }
        Ok(Batch { input, target })
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.input.batch()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenates samples along the batch axis.
    pub fn stack(samples: &[Batch]) -> Result<Batch> {
        let inputs: Vec<&Tensor> = samples.iter().map(|s| &s.input).collect();
        let targets: Vec<&Tensor> = samples.iter().map(|s| &s.target).collect();
        Batch::new(Tensor::concat(&inputs)?, Tensor::concat(&targets)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_pair() {
        let err = Batch::new(Tensor::zeros([2, 3, 4, 4]), Tensor::zeros([2, 1, 4, 4])).unwrap_err();
        assert!(matches!(err, Error::DataShape(_)));
    }

    #[test]
    fn stack_concatenates_items() {
        let a = Batch::new(Tensor::filled([1, 1, 2, 2], 1.0), Tensor::filled([1, 1, 2, 2], 2.0)).unwrap();
        let b = Batch::new(Tensor::filled([2, 1, 2, 2], 3.0), Tensor::filled([2, 1, 2, 2], 4.0)).unwrap();
        let s = Batch::stack(&[a, b]).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(&s.target.data()[8..], &[4.0; 4]);
    }

    #[test]
    fn stack_rejects_mixed_resolutions() {
        let a = Batch::new(Tensor::zeros([1, 1, 2, 2]), Tensor::zeros([1, 1, 2, 2])).unwrap();
        let b = Batch::new(Tensor::zeros([1, 1, 3, 3]), Tensor::zeros([1, 1, 3, 3])).unwrap();
        assert!(matches!(Batch::stack(&[a, b]), Err(Error::DataShape(_))));
    }
}
