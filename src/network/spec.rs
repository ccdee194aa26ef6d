use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::network::{baseline::BaselineCnn, model::Model, resnet::ResidualCnn};

/// Architecture identifier stored in every checkpoint. Rebuilding a model
/// from its `Architecture` gives the same parameter layout, so a checkpoint
/// only needs the tensors on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Architecture {
    /// Head conv, `num_convblocks` conv+ReLU blocks, tail conv.
    Baseline {
        channels: usize,
        hidden: usize,
        kernel: usize,
        num_convblocks: usize,
    },
    /// Head conv, `resnet_blocks` residual blocks, tail conv, global skip.
    Resnet {
        channels: usize,
        hidden: usize,
        kernel: usize,
        resnet_blocks: usize,
    },
}

impl Architecture {
    /// Name used in run identifiers.
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Baseline { .. } => "BaselineCnn",
            Architecture::Resnet { .. } => "ResidualCnn",
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Architecture::Baseline { channels, .. } | Architecture::Resnet { channels, .. } => *channels,
        }
    }

    /// Suffix appended to the run identifier, e.g. `_convblocks=1`.
    pub fn block_suffix(&self) -> String {
        match self {
            Architecture::Baseline { num_convblocks, .. } => format!("_convblocks={}", num_convblocks),
            Architecture::Resnet { resnet_blocks, .. } => format!("_resnetblocks={}", resnet_blocks),
        }
    }

    /// Instantiates a freshly initialised model seeded by `seed`.
    pub fn build(&self, seed: u64) -> Result<Box<dyn Model>> {
        let (channels, hidden, kernel) = match self {
            Architecture::Baseline { channels, hidden, kernel, .. }
            | Architecture::Resnet { channels, hidden, kernel, .. } => (*channels, *hidden, *kernel),
        };
        if channels == 0 || hidden == 0 {
            return Err(Error::Configuration(format!(
                "{} needs non-zero channels (got {} image, {} hidden)",
                self.name(), channels, hidden
            )));
        }
        if kernel % 2 == 0 {
            return Err(Error::Configuration(format!("kernel size must be odd, got {}", kernel)));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(match self {
            Architecture::Baseline { .. } => Box::new(BaselineCnn::new(self.clone(), &mut rng)),
            Architecture::Resnet { .. } => Box::new(ResidualCnn::new(self.clone(), &mut rng)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let arch = Architecture::Baseline { channels: 3, hidden: 8, kernel: 3, num_convblocks: 1 };
        let json = serde_json::to_string(&arch).unwrap();
        assert!(json.contains("\"kind\":\"baseline\""));
        let back: Architecture = serde_json::from_str(&json).unwrap();
        assert_eq!(back, arch);
    }

    #[test]
    fn build_rejects_even_kernels() {
        let arch = Architecture::Resnet { channels: 3, hidden: 8, kernel: 4, resnet_blocks: 2 };
        assert!(matches!(arch.build(0), Err(Error::Configuration(_))));
    }

    #[test]
    fn same_seed_same_weights() {
        let arch = Architecture::Resnet { channels: 1, hidden: 4, kernel: 3, resnet_blocks: 2 };
        assert_eq!(arch.build(9).unwrap().state(), arch.build(9).unwrap().state());
        assert_ne!(arch.build(9).unwrap().state(), arch.build(10).unwrap().state());
    }
}
