use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crate::data::dataset::{Dataset, ImageFolderDataset, Split};
use crate::data::loader::DataLoader;
use crate::error::Result;
use crate::inference::predictor::Predictor;
use crate::loss::loss_type::LossMode;
use crate::loss::policy::LossPolicy;
use crate::network::extractor::{ConvFeatureExtractor, FeatureExtractor};
use crate::network::metadata::ColorMode;
use crate::network::spec::Architecture;
use crate::optim::{adam::Adam, scheduler::StepLr};
use crate::train::checkpoint::CheckpointManager;
use crate::train::train_config::{RunDescriptor, TrainingConfig};
use crate::train::trainer::{Trainer, TrainingSummary};

/// Learning-rate decay: ×0.1 every 5 epochs.
const LR_STEP_EPOCHS: usize = 5;
const LR_GAMMA: f64 = 0.1;

#[derive(Debug, Parser)]
#[command(name = "ferrite-recon", about = "Facial reconstruction using CNNs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train a model and checkpoint it every epoch.
    Train(TrainArgs),
    /// Reconstruct a blurred copy of an image with a trained model.
    Predict(PredictArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    Baseline,
    Resnet,
}

#[derive(Debug, Clone, Args)]
pub struct TrainArgs {
    /// Type of model to use for facial reconstruction
    #[arg(long, value_enum, default_value = "baseline")]
    pub model: ModelKind,
    /// Type of obfuscation method to use
    #[arg(long, default_value = "blurred")]
    pub method: String,
    /// Size of the obfuscation method applied to images
    #[arg(long)]
    pub size: Option<u32>,
    /// Use grayscale images
    #[arg(long)]
    pub grayscale: bool,
    /// Loss function: pixel (alias mse), perceptual or pixel_perceptual
    #[arg(long, default_value = "pixel")]
    pub loss: String,
    /// Training batch size
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
    /// Validation batch size
    #[arg(long, default_value_t = 10)]
    pub test_batch_size: usize,
    /// Number of epochs to train for
    #[arg(long, default_value_t = 2)]
    pub epochs: usize,
    /// Learning rate
    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,
    /// Weight decay applied by the optimizer
    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,
    /// Request GPU execution (only the CPU backend is available)
    #[arg(long)]
    pub cuda: bool,
    /// Number of data loader worker threads
    #[arg(long, default_value_t = 4)]
    pub threads: usize,
    /// Random seed
    #[arg(long, default_value_t = 123)]
    pub seed: u64,
    /// Append per-epoch metrics to runs/{run_id}.jsonl
    #[arg(long)]
    pub metrics: bool,
    /// Save input/output/target grids while training
    #[arg(long)]
    pub save_img: bool,
    /// Number of conv blocks in the baseline model
    #[arg(long, default_value_t = 1)]
    pub num_convblocks: usize,
    /// Number of residual blocks in the resnet model
    #[arg(long, default_value_t = 5)]
    pub resnet_blocks: usize,
    /// Hidden channel width of either model
    #[arg(long, default_value_t = 32)]
    pub hidden: usize,
    /// Write the validation PSNR of every epoch to val_psnr_scores/{run_id}.txt
    #[arg(long)]
    pub save_val_psnr: bool,
    /// Root of the preprocessed dataset
    #[arg(long, default_value = "./data/lfw_preprocessed")]
    pub data_root: PathBuf,
    /// Pretrained feature-extractor weights (JSON) for perceptual losses
    #[arg(long)]
    pub extractor: Option<PathBuf>,
    #[arg(long, default_value = "saved_models")]
    pub checkpoint_dir: PathBuf,
    #[arg(long, default_value = "images_from_runs")]
    pub image_dir: PathBuf,
    #[arg(long, default_value = "val_psnr_scores")]
    pub results_dir: PathBuf,
    #[arg(long, default_value = "runs")]
    pub runs_dir: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct PredictArgs {
    /// Run identifier of the trained model to evaluate
    #[arg(long)]
    pub model: String,
    /// Clean image passed (after blurring) into the model
    #[arg(long)]
    pub image: PathBuf,
    /// Gaussian blur radius used to obfuscate the image
    #[arg(long, default_value_t = 4.0)]
    pub blur_radius: f32,
    #[arg(long)]
    pub cuda: bool,
    #[arg(long, default_value = "saved_models")]
    pub checkpoint_dir: PathBuf,
}

impl TrainArgs {
    pub fn color(&self) -> ColorMode {
        if self.grayscale { ColorMode::Grayscale } else { ColorMode::Rgb }
    }

    pub fn architecture(&self) -> Architecture {
        let channels = self.color().channels();
        match self.model {
            ModelKind::Baseline => Architecture::Baseline {
                channels,
                hidden: self.hidden,
                kernel: 3,
                num_convblocks: self.num_convblocks,
            },
            ModelKind::Resnet => Architecture::Resnet {
                channels,
                hidden: self.hidden,
                kernel: 3,
                resnet_blocks: self.resnet_blocks,
            },
        }
    }

    pub fn run_id(&self, loss_mode: LossMode) -> String {
        RunDescriptor {
            architecture: &self.architecture(),
            method: &self.method,
            size: self.size,
            loss_mode,
            learning_rate: self.lr,
            epochs: self.epochs,
            batch_size: self.batch_size,
        }
        .run_id()
    }

    pub fn training_config(&self, loss_mode: LossMode) -> TrainingConfig {
        let run_id = self.run_id(loss_mode);
        let mut config = TrainingConfig::new(run_id.clone(), self.epochs, loss_mode);
        config.save_images = self.save_img;
        config.image_dir = self.image_dir.clone();
        config.checkpoint_dir = self.checkpoint_dir.clone();
        config.results_dir = self.save_val_psnr.then(|| self.results_dir.clone());
        config.metrics_path = self.metrics.then(|| self.runs_dir.join(format!("{}.jsonl", run_id)));
        config
    }

    fn feature_extractor(&self, loss_mode: LossMode) -> Result<Option<Arc<dyn FeatureExtractor>>> {
        if !loss_mode.needs_extractor() {
            return Ok(None);
        }
        let extractor = match &self.extractor {
            Some(path) => ConvFeatureExtractor::load_json(path)?,
            None => {
                warn!("no --extractor weights given, perceptual loss uses a randomly initialised feature stack");
                ConvFeatureExtractor::seeded(self.color().channels(), self.seed)
            }
        };
        Ok(Some(Arc::new(extractor)))
    }
}

pub fn run_train(args: &TrainArgs) -> Result<TrainingSummary> {
    let loss_mode: LossMode = args.loss.parse()?;
    if args.cuda {
        warn!("--cuda requested, running on the CPU");
    }
    let config = args.training_config(loss_mode);
    let architecture = args.architecture();

    info!("Hyperparameters:");
    info!("Model: {}", architecture.name());
    info!("Method: {}", args.method);
    info!("Size: {:?}", args.size);
    info!("Loss: {}", loss_mode);
    info!("Learning Rate: {}", args.lr);
    info!("Epochs: {}", args.epochs);
    info!("Batch Size: {}", args.batch_size);

    let loss = LossPolicy::new(loss_mode, args.feature_extractor(loss_mode)?)?;

    let open = |split: Split| -> Result<Arc<dyn Dataset>> {
        let dataset = ImageFolderDataset::open(&args.data_root, args.color(), split, &args.method, args.size)?;
        Ok(Arc::new(dataset))
    };
    let mut train_loader = DataLoader::new(open(Split::Train)?, args.batch_size)?
        .shuffle(args.seed)
        .num_workers(args.threads);
    let mut val_loader = DataLoader::new(open(Split::Val)?, args.test_batch_size)?
        .shuffle(args.seed.wrapping_add(1))
        .num_workers(args.threads);

    info!(
        train_samples = train_loader.samples(),
        val_samples = val_loader.samples(),
        workers = args.threads,
        "datasets indexed"
    );

    let model = architecture.build(args.seed)?;
    let optimizer = Adam::new(args.lr, args.weight_decay);
    let scheduler = StepLr::new(args.lr, LR_STEP_EPOCHS, LR_GAMMA);

    let run_dir = CheckpointManager::new(&config.checkpoint_dir).run_dir(&config.run_id);
    std::fs::create_dir_all(&run_dir)?;
    std::fs::write(run_dir.join("config.json"), serde_json::to_vec_pretty(&config)?)?;

    let mut trainer = Trainer::new(&config, model, Box::new(optimizer), Box::new(scheduler), loss);
    trainer.fit(&mut train_loader, &mut val_loader)
}

/// Returns the written image paths, or `None` when the run has no best checkpoint.
pub fn run_predict(args: &PredictArgs) -> Result<Option<Vec<PathBuf>>> {
    if args.cuda {
        warn!("--cuda requested, running on the CPU");
    }
    let checkpoints = CheckpointManager::new(&args.checkpoint_dir);
    let Some(mut predictor) = Predictor::from_best(&checkpoints, &args.model, args.blur_radius)? else {
        info!("no checkpoint found...");
        return Ok(None);
    };
    let prediction = predictor.predict_file(&args.image)?;
    let written = prediction.save(&checkpoints.run_dir(&args.model))?;
    Ok(Some(written))
}
