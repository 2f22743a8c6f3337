mod common;

use common::Fixture;
use inference::PredictionArray;
use training::npy::write_npy;
use training::{compute_cv_scores, create_submission};

fn one_hot(labels: &[usize], classes: usize) -> PredictionArray {
    let mut data = vec![0.0; labels.len() * classes];
    for (i, l) in labels.iter().enumerate() {
        data[i * classes + l] = 1.0;
    }
    PredictionArray::new(labels.len(), classes, data).unwrap()
}

#[test]
fn scores_only_folds_with_arrays_and_averages_tta() -> anyhow::Result<()> {
    let fx = Fixture::new(3, 2)?;
    let preds = fx.preds_dir();
    std::fs::create_dir_all(&preds)?;
    // fixture labels alternate 0,1,0,1 within each fold
    write_npy(&preds.join("y_pred_val_fold_1_tta_0.npy"), &one_hot(&[0, 1, 0, 1], 2))?;
    write_npy(&preds.join("y_pred_val_fold_1_tta_1.npy"), &one_hot(&[0, 1, 1, 0], 2))?;
    write_npy(&preds.join("y_pred_val_fold_2_tta_0.npy"), &one_hot(&[1, 1, 1, 1], 2))?;

    let scores = compute_cv_scores(&fx.data_dir(), &preds, 3, 1)?;
    let folds: Vec<usize> = scores.folds.iter().map(|f| f.fold).collect();
    assert_eq!(folds, vec![1, 2]);
    assert_eq!(scores.folds[0].tta[0].acc, 1.0);
    assert_eq!(scores.folds[0].tta[1].acc, 0.5);
    // tied rows in the average resolve to class 0
    assert_eq!(scores.folds[0].tta_mean_acc, 0.75);
    assert_eq!(scores.folds[1].tta_mean_acc, 0.5);
    assert_eq!(scores.n_examples, 8);
    assert!((scores.oof_acc - 5.0 / 8.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn scoring_needs_at_least_one_array_with_matching_rows() -> anyhow::Result<()> {
    let fx = Fixture::new(2, 2)?;
    let preds = fx.preds_dir();
    std::fs::create_dir_all(&preds)?;
    assert!(compute_cv_scores(&fx.data_dir(), &preds, 2, 0).is_err());

    write_npy(&preds.join("y_pred_val_fold_0_tta_0.npy"), &one_hot(&[0, 1, 0], 2))?;
    assert!(compute_cv_scores(&fx.data_dir(), &preds, 2, 0).is_err());
    Ok(())
}

#[test]
fn submission_averages_every_test_array() -> anyhow::Result<()> {
    let fx = Fixture::new(2, 2)?;
    let preds = fx.preds_dir();
    std::fs::create_dir_all(&preds)?;
    write_npy(
        &preds.join("y_pred_test_fold_0_tta_0.npy"),
        &PredictionArray::new(2, 3, vec![0.6, 0.3, 0.1, 0.1, 0.2, 0.7])?,
    )?;
    write_npy(
        &preds.join("y_pred_test_fold_1_tta_0.npy"),
        &PredictionArray::new(2, 3, vec![0.0, 0.9, 0.1, 0.1, 0.2, 0.7])?,
    )?;
    let out = fx.path().join("out");
    let path = create_submission(&fx.data_dir(), &preds, 2, 0, &out)?;
    assert_eq!(path, out.join("submission.csv"));
    let text = std::fs::read_to_string(path)?;
    assert_eq!(text, "image_id,label\ntest_0,1\ntest_1,2\n");

    assert!(create_submission(&fx.data_dir(), &fx.path().join("empty"), 2, 0, &out).is_err());
    Ok(())
}
