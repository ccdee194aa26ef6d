use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::data::batch::Batch;
use crate::data::image_io::load_image;
use crate::error::{Error, Result};
use crate::network::metadata::{ColorMode, Normalization};

/// Which partition of the data a pass runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Random-access collection of (obfuscated, clean) samples.
///
/// `get` returns a batch of one; the loader stacks samples into batches.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Result<Batch>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Samples held in memory.
pub struct InMemoryDataset {
    samples: Vec<Batch>,
}

impl InMemoryDataset {
    /// Every sample must be a single item; all must share one shape.
    pub fn new(samples: Vec<Batch>) -> Result<InMemoryDataset> {
        if let Some(first) = samples.first() {
            let shape = first.input.shape();
            if let Some(bad) = samples.iter().find(|s| s.len() != 1 || s.input.shape() != shape) {
                return Err(Error::DataShape(format!(
                    "sample of shape {:?} does not match {:?}",
                    bad.input.shape(),
                    shape
                )));
            }
        }
        Ok(InMemoryDataset { samples })
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<Batch> {
        self.samples.get(index).cloned().ok_or_else(|| {
            Error::DataShape(format!("sample {} out of range ({} samples)", index, self.samples.len()))
        })
    }
}

/// Pairs of image files decoded on demand.
///
/// Layout under `root`:
/// `cropped_{color}/{split}/clean/<name>` is the target and
/// `cropped_{color}/{split}/{method}_{size}/<name>` the obfuscated input
/// (`{method}` alone when no size is given).
pub struct ImageFolderDataset {
    pairs: Vec<(PathBuf, PathBuf)>,
    color: ColorMode,
    normalization: Normalization,
}

impl ImageFolderDataset {
    pub fn open(
        root: &Path,
        color: ColorMode,
        split: Split,
        method: &str,
        size: Option<u32>,
    ) -> Result<ImageFolderDataset> {
        let split_dir = root.join(format!("cropped_{}", color.as_str())).join(split.as_str());
        let clean_dir = split_dir.join("clean");
        let obfuscated_dir = match size {
            Some(size) => split_dir.join(format!("{}_{}", method, size)),
            None => split_dir.join(method),
        };

        let mut names: Vec<_> = std::fs::read_dir(&clean_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name())
            .collect();
        names.sort();

        let mut pairs = Vec::with_capacity(names.len());
        for name in names {
            let input = obfuscated_dir.join(&name);
            if !input.is_file() {
                warn!(file = ?input, "missing obfuscated counterpart, skipping");
                continue;
            }
            pairs.push((input, clean_dir.join(&name)));
        }
        if pairs.is_empty() {
            return Err(Error::Configuration(format!(
                "no image pairs found under {} and {}",
                clean_dir.display(),
                obfuscated_dir.display()
            )));
        }
        debug!(split = %split, pairs = pairs.len(), "indexed image folder");

        Ok(ImageFolderDataset {
            pairs,
            color,
            normalization: Normalization::lfw(color),
        })
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> ImageFolderDataset {
        self.normalization = normalization;
        self
    }
}

impl Dataset for ImageFolderDataset {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn get(&self, index: usize) -> Result<Batch> {
        let (input, target) = self.pairs.get(index).ok_or_else(|| {
            Error::DataShape(format!("sample {} out of range ({} samples)", index, self.pairs.len()))
        })?;
        Batch::new(
            load_image(input, self.color, &self.normalization)?,
            load_image(target, self.color, &self.normalization)?,
        )
    }
}
