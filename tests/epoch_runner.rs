mod common;

use common::{loader, sample, ScaleModel};
use ferrite_recon::data::Batch;
use ferrite_recon::loss::psnr::DEFAULT_MAX_PSNR_DB;
use ferrite_recon::train::{EpochRunner, Phase};
use ferrite_recon::{Error, LossPolicy, Model, Sgd, Tensor};

#[test]
fn perfect_reconstruction_gives_zero_loss_and_max_psnr() {
    // Two batches, output == target for both.
    let mut source = loader((0..4).map(|i| sample(i, 3, 1.0)).collect(), 2);
    let mut model = ScaleModel::new(1.0);
    let mut sgd = Sgd::new(0.1);

    let result = EpochRunner::new(500)
        .run(1, &mut source, &mut model, &LossPolicy::pixel(), Phase::Train { optimizer: &mut sgd })
        .unwrap();

    assert_eq!(result.batches, 2);
    assert_eq!(result.mean_loss, 0.0);
    assert_eq!(result.mean_psnr, DEFAULT_MAX_PSNR_DB);
    assert_eq!(model.w(), 1.0);
}

#[test]
fn training_moves_weight_towards_target_scale() {
    let mut source = loader((0..8).map(|i| sample(i, 4, 0.5)).collect(), 2);
    let mut model = ScaleModel::new(1.0);
    let mut sgd = Sgd::new(0.5);
    let runner = EpochRunner::new(500);

    let first = runner
        .run(1, &mut source, &mut model, &LossPolicy::pixel(), Phase::Train { optimizer: &mut sgd })
        .unwrap();
    let second = runner
        .run(2, &mut source, &mut model, &LossPolicy::pixel(), Phase::Train { optimizer: &mut sgd })
        .unwrap();

    assert!(model.w() < 1.0 && model.w() > 0.4);
    assert!(second.mean_loss < first.mean_loss);
    assert!(second.mean_psnr > first.mean_psnr);
    assert!(model.is_training());
}

#[test]
fn validation_never_updates_parameters() {
    let mut source = loader((0..6).map(|i| sample(i, 4, 0.5)).collect(), 3);
    let mut model = ScaleModel::new(0.9);
    let before = model.state();

    let result = EpochRunner::new(100)
        .run(1, &mut source, &mut model, &LossPolicy::pixel(), Phase::Validate)
        .unwrap();

    assert_eq!(result.batches, 2);
    assert!(result.mean_loss > 0.0);
    assert_eq!(model.state(), before);
    assert!(!model.is_training());
}

#[test]
fn non_finite_batch_is_skipped() {
    let poisoned = {
        let input = Tensor::filled([1, 1, 2, 2], f64::NAN);
        Batch::new(input.clone(), input).unwrap()
    };
    let clean = |v: f64| {
        let t = Tensor::filled([1, 1, 2, 2], v);
        Batch::new(t.clone(), t.map(|x| x * 0.5)).unwrap()
    };
    let mut source = loader(vec![clean(1.0), poisoned, clean(2.0)], 1);
    let mut model = ScaleModel::new(1.0);
    let mut sgd = Sgd::new(0.01);

    let result = EpochRunner::new(500)
        .run(1, &mut source, &mut model, &LossPolicy::pixel(), Phase::Train { optimizer: &mut sgd })
        .unwrap();

    assert_eq!(result.skipped_batches, 1);
    assert_eq!(result.batches, 2);
    assert!(result.mean_loss.is_finite());
    assert!(model.w().is_finite());
}

#[test]
fn an_epoch_of_only_bad_batches_fails() {
    let bad = {
        let t = Tensor::filled([1, 1, 2, 2], f64::INFINITY);
        Batch::new(t.clone(), t).unwrap()
    };
    let mut source = loader(vec![bad.clone(), bad], 1);
    let mut model = ScaleModel::new(1.0);

    let err = EpochRunner::new(100)
        .run(1, &mut source, &mut model, &LossPolicy::pixel(), Phase::Validate)
        .unwrap_err();
    assert!(matches!(err, Error::Numeric(_)));
}

#[test]
fn sample_grids_follow_the_naming_scheme() {
    let dir = tempfile::tempdir().unwrap();
    let run_dir = dir.path().join("run-a");
    let mut source = loader((0..4).map(|i| sample(i, 4, 0.5)).collect(), 1);
    let mut model = ScaleModel::new(1.0);

    EpochRunner::new(2)
        .with_samples(run_dir.clone())
        .run(3, &mut source, &mut model, &LossPolicy::pixel(), Phase::Validate)
        .unwrap();

    assert!(run_dir.join("val/3_2_iter.jpg").is_file());
    assert!(run_dir.join("val/3_4_iter.jpg").is_file());
    assert!(!run_dir.join("val/3_1_iter.jpg").exists());
}
