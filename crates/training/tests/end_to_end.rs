mod common;

use clap::Parser;
use common::Fixture;
use training::npy::read_npy;
use training::{RunArgs, RunConfig};

#[test]
fn single_fold_train_val_scores_its_one_array() -> anyhow::Result<()> {
    let fx = Fixture::new(5, 3)?;
    let args = RunArgs::try_parse_from(fx.args(&[
        ("--initial-fold", "0"),
        ("--final-fold", "1"),
        ("--job", "train_val"),
    ]))?;
    let cfg = RunConfig::resolve(args)?;
    assert_eq!(cfg.n_examples_train, 16);
    assert_eq!(cfg.steps_per_epoch(), 4);

    let summary = training::run(&cfg)?;

    assert_eq!(summary.folds.len(), 1);
    let fold = &summary.folds[0];
    assert_eq!(fold.fold, 0);
    let fit = fold.fit.as_ref().expect("fold 0 was trained");
    assert!(fit.epochs_run >= 1);

    let checkpoints = Fixture::list(&fx.model_dir());
    assert_eq!(checkpoints.len(), 1, "{checkpoints:?}");
    assert!(checkpoints[0].starts_with("model-f0-e"));
    assert!(checkpoints[0].ends_with(".bin"));
    assert!(fold.checkpoint.ends_with(&checkpoints[0]));

    let preds = Fixture::list(&fx.preds_dir());
    assert_eq!(preds, vec!["cv_scores.json", "y_pred_val_fold_0_tta_0.npy"]);
    let array = read_npy(&fx.preds_dir().join("y_pred_val_fold_0_tta_0.npy"))?;
    assert_eq!((array.rows, array.cols), (common::PER_FOLD, 2));
    for i in 0..array.rows {
        let sum: f32 = array.row(i).iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    let scores = summary.scores.expect("scoring ran");
    assert_eq!(scores.folds.len(), 1);
    assert_eq!(scores.folds[0].fold, 0);
    assert_eq!(scores.folds[0].tta.len(), 1);
    assert_eq!(scores.n_examples, common::PER_FOLD);
    assert!((0.0..=1.0).contains(&scores.oof_acc));
    assert!(summary.submission.is_none());
    Ok(())
}

#[test]
fn skip_reuses_a_checkpoint_once_and_tta_writes_one_array_per_transform() -> anyhow::Result<()> {
    let fx = Fixture::new(5, 3)?;
    let args = RunArgs::try_parse_from(fx.args(&[
        ("--initial-fold", "0"),
        ("--final-fold", "2"),
        ("--job", "skip_val_test"),
        ("--tta-number", "2"),
        ("--n-epochs", "1"),
    ]))?;
    let cfg = RunConfig::resolve(args)?;

    // fold 0 will not be fitted, so it needs a checkpoint from an earlier run
    std::fs::create_dir_all(&cfg.model_dir)?;
    let device = Default::default();
    let model = models::VitClassifier::<training::TrainBackend>::new(&cfg.model, &device)?;
    let path = training::checkpoint::checkpoint_path(&cfg.model_dir, 0, 3, 0.6931, 0.5);
    inference::save_checkpoint(&model, &path, cfg.precision.checkpoint_precision())?;

    let summary = training::run(&cfg)?;
    assert_eq!(summary.folds.len(), 2);
    assert!(summary.folds[0].fit.is_none());
    assert!(summary.folds[1].fit.is_some());
    assert_eq!(summary.folds[0].checkpoint, path);

    let preds = Fixture::list(&fx.preds_dir());
    for fold in 0..2 {
        for split in ["val", "test"] {
            let count = preds
                .iter()
                .filter(|n| n.starts_with(&format!("y_pred_{split}_fold_{fold}_tta_")))
                .count();
            assert_eq!(count, 3, "{split} fold {fold}: {preds:?}");
        }
    }
    assert_eq!(read_npy(&fx.preds_dir().join("y_pred_test_fold_1_tta_2.npy"))?.rows, 3);

    assert_eq!(summary.scores.expect("val implies scoring").folds.len(), 2);
    let submission = summary.submission.expect("test implies submission");
    let text = std::fs::read_to_string(submission)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "image_id,label");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("test_0,"));
    Ok(())
}

#[test]
fn prediction_without_a_checkpoint_fails() -> anyhow::Result<()> {
    let fx = Fixture::new(5, 2)?;
    let args = RunArgs::try_parse_from(fx.args(&[("--final-fold", "1"), ("--job", "val")]))?;
    let cfg = RunConfig::resolve(args)?;
    assert!(training::run(&cfg).is_err());
    Ok(())
}
