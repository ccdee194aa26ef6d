mod common;

use std::fs;
use std::sync::{mpsc, Arc};

use common::{loader, sample};
use ferrite_recon::loss::LossMode;
use ferrite_recon::network::{ConvFeatureExtractor, FeatureExtractor, Model};
use ferrite_recon::optim::{LrScheduler, Optimizer};
use ferrite_recon::train::{CheckpointManager, Trainer, TrainingConfig};
use ferrite_recon::{Adam, Architecture, LossPolicy, Sgd, StepLr};

fn config(root: &std::path::Path, run_id: &str, epochs: usize) -> TrainingConfig {
    let mut cfg = TrainingConfig::new(run_id, epochs, LossMode::Pixel);
    cfg.checkpoint_dir = root.join("saved_models");
    cfg.image_dir = root.join("images_from_runs");
    cfg.results_dir = Some(root.join("val_psnr_scores"));
    cfg.metrics_path = Some(root.join("runs").join(format!("{}.jsonl", run_id)));
    cfg
}

#[test]
fn full_run_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::channel();
    let mut cfg = config(dir.path(), "tiny", 3);
    cfg.progress_tx = Some(tx);
    cfg.save_images = true;
    cfg.train_log_interval = 2;
    cfg.val_log_interval = 1;

    let arch = Architecture::Baseline { channels: 1, hidden: 3, kernel: 3, num_convblocks: 1 };
    let mut train = loader((0..6).map(|i| sample(i, 4, 0.5)).collect(), 3);
    let mut val = loader((6..8).map(|i| sample(i, 4, 0.5)).collect(), 2);

    let mut trainer = Trainer::new(
        &cfg,
        arch.build(1).unwrap(),
        Box::new(Adam::new(0.001, 1e-4)),
        Box::new(StepLr::new(0.001, 5, 0.1)),
        LossPolicy::pixel(),
    );
    let summary = trainer.fit(&mut train, &mut val).unwrap();

    assert_eq!(summary.val_psnrs.len(), 3);
    assert_eq!(summary.history.len(), 3);
    let max = summary.val_psnrs.iter().cloned().fold(f64::MIN, f64::max);
    assert_eq!(summary.best_psnr, max);

    let mgr = CheckpointManager::new(&cfg.checkpoint_dir);
    let latest = CheckpointManager::load(&mgr.checkpoint_path("tiny")).unwrap();
    assert_eq!(latest.epoch, 3);
    assert_eq!(latest.model, trainer.model().state());
    let best = mgr.load_best("tiny").unwrap().unwrap();
    let best_epoch = summary.history.iter().filter(|s| s.is_best).map(|s| s.epoch).max().unwrap();
    assert_eq!(best.epoch, best_epoch);

    let scores = fs::read_to_string(dir.path().join("val_psnr_scores/tiny.txt")).unwrap();
    let parsed: Vec<f64> = scores.lines().map(|l| l.parse().unwrap()).collect();
    assert_eq!(parsed, summary.val_psnrs);

    let jsonl = fs::read_to_string(dir.path().join("runs/tiny.jsonl")).unwrap();
    assert_eq!(jsonl.lines().count(), 3);

    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received, summary.history);

    assert!(dir.path().join("images_from_runs/tiny/train/2_2_iter.jpg").is_file());
    assert!(dir.path().join("images_from_runs/tiny/val/1_1_iter.jpg").is_file());
}

#[test]
fn learning_rate_decays_every_five_epochs() {
    let mut sched = StepLr::new(0.01, 5, 0.1);
    let mut sgd = Sgd::new(0.01);
    for _ in 0..5 {
        let lr = sched.step(0.0);
        sgd.set_learning_rate(lr);
    }
    assert!((sgd.learning_rate() - 0.001).abs() < 1e-15);
}

#[test]
fn trainer_applies_the_schedule_to_the_optimizer() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "sched", 6);
    let arch = Architecture::Baseline { channels: 1, hidden: 2, kernel: 1, num_convblocks: 0 };
    let mut train = loader((0..2).map(|i| sample(i, 2, 0.5)).collect(), 2);
    let mut val = loader(vec![sample(9, 2, 0.5)], 1);

    let mut trainer = Trainer::new(
        &cfg,
        arch.build(0).unwrap(),
        Box::new(Sgd::new(0.01)),
        Box::new(StepLr::new(0.01, 5, 0.1)),
        LossPolicy::pixel(),
    );
    let summary = trainer.fit(&mut train, &mut val).unwrap();
    let lrs: Vec<f64> = summary.history.iter().map(|s| s.learning_rate).collect();
    assert_eq!(&lrs[..4], &[0.01; 4]);
    assert!((lrs[4] - 0.001).abs() < 1e-15);
    assert!((lrs[5] - 0.001).abs() < 1e-15);
}

#[test]
fn pixel_training_reduces_validation_loss() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "learn", 8);
    // 1x1 convolutions can represent y = 0.5 x exactly on positive inputs.
    let arch = Architecture::Baseline { channels: 1, hidden: 4, kernel: 1, num_convblocks: 0 };
    let mut train = loader((0..8).map(|i| sample(i, 4, 0.5)).collect(), 2);
    let mut val = loader((8..10).map(|i| sample(i, 4, 0.5)).collect(), 2);

    let mut trainer = Trainer::new(
        &cfg,
        arch.build(3).unwrap(),
        Box::new(Adam::new(0.01, 0.0)),
        Box::new(StepLr::new(0.01, 5, 0.1)),
        LossPolicy::pixel(),
    );
    let summary = trainer.fit(&mut train, &mut val).unwrap();
    let first = summary.history.first().unwrap().val_loss;
    let last = summary.history.last().unwrap().val_loss;
    assert!(last < first, "val loss went from {} to {}", first, last);
}

#[test]
fn perceptual_run_completes_with_residual_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), "perceptual", 2);
    cfg.loss_mode = LossMode::PixelPerceptual;
    let arch = Architecture::Resnet { channels: 1, hidden: 2, kernel: 3, resnet_blocks: 1 };
    let extractor: Arc<dyn FeatureExtractor> = Arc::new(ConvFeatureExtractor::seeded(1, 17));
    let loss = LossPolicy::new(LossMode::PixelPerceptual, Some(extractor)).unwrap();
    let mut train = loader((0..4).map(|i| sample(i, 4, 0.5)).collect(), 2);
    let mut val = loader((4..6).map(|i| sample(i, 4, 0.5)).collect(), 2);

    let mut trainer = Trainer::new(
        &cfg,
        arch.build(2).unwrap(),
        Box::new(Adam::new(0.001, 1e-4)),
        Box::new(StepLr::new(0.001, 5, 0.1)),
        loss,
    );
    let summary = trainer.fit(&mut train, &mut val).unwrap();
    assert!(summary.history.iter().all(|s| s.val_loss.is_finite() && s.train_loss > 0.0));
    assert!(summary.best_psnr > 0.0);

    let latest = CheckpointManager::load(&trainer.checkpoints().checkpoint_path("perceptual")).unwrap();
    assert_eq!(trainer.into_model().state(), latest.model);
}
