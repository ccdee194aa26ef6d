use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::math::conv::{conv2d_backward, conv2d_forward, max_pool2_backward, max_pool2_forward};
use crate::math::tensor::Tensor;

/// Frozen image-to-feature transform used by the perceptual losses.
///
/// Implementations take `&self` everywhere: the extractor's weights are
/// never updated by training.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, image: &Tensor) -> Result<Tensor>;

    /// Vector-Jacobian product: maps ∂L/∂features back to ∂L/∂image.
    fn backward(&self, image: &Tensor, grad_features: &Tensor) -> Result<Tensor>;
}

/// One stage of a VGG-style feature stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ExtractorStage {
    Conv { weights: Tensor, bias: Vec<f64> },
    Relu,
    MaxPool,
}

/// What the backward pass needs to remember about a stage.
enum StageTrace {
    Conv { input: Tensor },
    Relu { input: Tensor },
    MaxPool { input_shape: [usize; 4], winners: Vec<usize> },
}

/// A truncated convolutional feature stack (conv / ReLU / 2×2 max-pool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvFeatureExtractor {
    pub stages: Vec<ExtractorStage>,
}

impl ConvFeatureExtractor {
    pub fn new(stages: Vec<ExtractorStage>) -> Result<ConvFeatureExtractor> {
        if stages.is_empty() {
            return Err(Error::Configuration("feature extractor has no stages".into()));
        }
        Ok(ConvFeatureExtractor { stages })
    }

    /// Shape of the first two VGG blocks (conv-relu-conv-relu-pool-conv-relu)
    /// at reduced width, with seeded He-initialised weights.
    pub fn seeded(in_channels: usize, seed: u64) -> ConvFeatureExtractor {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut conv = |i: usize, o: usize| ExtractorStage::Conv {
            weights: Tensor::he([o, i, 3, 3], i * 9, &mut rng),
            bias: vec![0.0; o],
        };
        let stages = vec![
            conv(in_channels, 8),
            ExtractorStage::Relu,
            conv(8, 8),
            ExtractorStage::Relu,
            ExtractorStage::MaxPool,
            conv(8, 16),
            ExtractorStage::Relu,
        ];
        ConvFeatureExtractor { stages }
    }

    /// Loads pretrained stages previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<ConvFeatureExtractor> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let extractor: ConvFeatureExtractor = serde_json::from_reader(reader)?;
        ConvFeatureExtractor::new(extractor.stages)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    fn run(&self, image: &Tensor, keep_trace: bool) -> Result<(Tensor, Vec<StageTrace>)> {
        let mut current = image.clone();
        let mut traces = Vec::new();
        for stage in &self.stages {
            let next = match stage {
                ExtractorStage::Conv { weights, bias } => {
                    let out = conv2d_forward(&current, weights, bias)?;
                    if keep_trace {
                        traces.push(StageTrace::Conv { input: current });
                    }
                    out
                }
                ExtractorStage::Relu => {
                    let out = current.map(|x| x.max(0.0));
                    if keep_trace {
                        traces.push(StageTrace::Relu { input: current });
                    }
                    out
                }
                ExtractorStage::MaxPool => {
                    let (out, winners) = max_pool2_forward(&current);
                    if keep_trace {
                        traces.push(StageTrace::MaxPool { input_shape: current.shape(), winners });
                    }
                    out
                }
            };
            current = next;
        }
        Ok((current, traces))
    }
}

impl FeatureExtractor for ConvFeatureExtractor {
    fn extract(&self, image: &Tensor) -> Result<Tensor> {
        Ok(self.run(image, false)?.0)
    }

    fn backward(&self, image: &Tensor, grad_features: &Tensor) -> Result<Tensor> {
        let (features, traces) = self.run(image, true)?;
        features.ensure_same_shape(grad_features)?;
        let mut grad = grad_features.clone();
        for (stage, trace) in self.stages.iter().zip(traces.iter()).rev() {
            grad = match (stage, trace) {
                (ExtractorStage::Conv { weights, .. }, StageTrace::Conv { input }) => {
                    conv2d_backward(input, weights, &grad)?.input
                }
                (ExtractorStage::Relu, StageTrace::Relu { input }) => {
                    input.zip_map(&grad, |x, g| if x > 0.0 { g } else { 0.0 })?
                }
                (ExtractorStage::MaxPool, StageTrace::MaxPool { input_shape, winners }) => {
                    max_pool2_backward(*input_shape, winners, &grad)
                }
                _ => return Err(Error::Model("feature extractor trace out of step".into())),
            };
        }
        Ok(grad)
    }
}
