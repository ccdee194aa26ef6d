use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::network::model::ModelState;

/// Bumped whenever the checkpoint layout changes incompatibly.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

const CHECKPOINT_FILE: &str = "checkpoint.json";
const BEST_FILE: &str = "model_best.json";

/// A model snapshot taken at the end of an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub epoch: usize,
    pub model: ModelState,
}

/// Writes one checkpoint per epoch under `{root}/{run_id}/` and keeps a copy
/// of the best one. Which epoch is best is decided by the caller.
pub struct CheckpointManager {
    root: PathBuf,
}

impl CheckpointManager {
    pub fn new(root: impl Into<PathBuf>) -> CheckpointManager {
        CheckpointManager { root: root.into() }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    pub fn checkpoint_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join(CHECKPOINT_FILE)
    }

    pub fn best_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join(BEST_FILE)
    }

    /// Overwrites the run's checkpoint with `state`; with `is_best` the file
    /// is also copied over the best checkpoint. An I/O failure is retried
    /// once before it is returned. Returns the checkpoint path.
    pub fn save(&self, run_id: &str, epoch: usize, state: &ModelState, is_best: bool) -> Result<PathBuf> {
        let checkpoint = Checkpoint {
            format_version: CHECKPOINT_FORMAT_VERSION,
            epoch,
            model: state.clone(),
        };
        let bytes = serde_json::to_vec(&checkpoint)?;
        let path = self.checkpoint_path(run_id);

        retry_once("write checkpoint", || {
            fs::create_dir_all(self.run_dir(run_id))?;
            fs::write(&path, &bytes)
        })?;
        if is_best {
            let best = self.best_path(run_id);
            retry_once("copy best checkpoint", || fs::copy(&path, &best).map(|_| ()))?;
        }
        debug!(run_id, epoch, is_best, path = %path.display(), "checkpoint saved");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Checkpoint> {
        let file = fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let checkpoint: Checkpoint = serde_json::from_reader(reader)?;
        if checkpoint.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(Error::Model(format!(
                "checkpoint format {} is not supported (expected {})",
                checkpoint.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        Ok(checkpoint)
    }

    /// The run's best checkpoint, or `None` if none has been written.
    pub fn load_best(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        let path = self.best_path(run_id);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(Self::load(&path)?))
    }
}

fn retry_once<F>(what: &str, mut op: F) -> Result<()>
where
    F: FnMut() -> std::io::Result<()>,
{
    match op() {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!(error = %first, "failed to {}, retrying once", what);
            op().map_err(Error::from)
        }
    }
}
