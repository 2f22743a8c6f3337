//! Cross-validation scoring and submission building from saved prediction arrays.

use crate::npy::read_npy;
use anyhow::{bail, Context};
use data_contracts::{prediction_file_name, Split, SubmissionRow, TestRow, TrainRow};
use inference::PredictionArray;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SUBMISSION_FILE: &str = "submission.csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtaScore {
    pub tta: usize,
    pub acc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldScore {
    pub fold: usize,
    pub n_examples: usize,
    pub tta: Vec<TtaScore>,
    /// Accuracy of the probability average over the available TTA variants.
    pub tta_mean_acc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvScores {
    pub folds: Vec<FoldScore>,
    /// Out-of-fold accuracy over every scored fold.
    pub oof_acc: f64,
    pub n_examples: usize,
}

/// Deserialize every row of a headed CSV file; a bad row is fatal.
pub(crate) fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.with_context(|| format!("bad row in {}", path.display()))?);
    }
    Ok(rows)
}

pub fn mean_arrays(arrays: &[PredictionArray]) -> anyhow::Result<PredictionArray> {
    let Some(first) = arrays.first() else {
        bail!("no arrays to average");
    };
    let mut sum = vec![0f32; first.data.len()];
    for a in arrays {
        if (a.rows, a.cols) != (first.rows, first.cols) {
            bail!(
                "cannot average a {}x{} array with a {}x{} one",
                a.rows,
                a.cols,
                first.rows,
                first.cols
            );
        }
        for (s, v) in sum.iter_mut().zip(&a.data) {
            *s += v;
        }
    }
    let n = arrays.len() as f32;
    sum.iter_mut().for_each(|s| *s /= n);
    Ok(PredictionArray::new(first.rows, first.cols, sum)?)
}

pub fn accuracy(preds: &PredictionArray, labels: &[i32]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let hits = preds
        .argmax()
        .iter()
        .zip(labels)
        .filter(|(p, l)| **p as i64 == **l as i64)
        .count();
    hits as f64 / labels.len() as f64
}

/// Prediction arrays of one (split, fold) that exist on disk, by TTA index.
fn load_tta_arrays(
    preds_dir: &Path,
    split: Split,
    fold: usize,
    tta_number: usize,
) -> anyhow::Result<Vec<(usize, PredictionArray)>> {
    let mut out = Vec::new();
    for tta in 0..=tta_number {
        let path = preds_dir.join(prediction_file_name(split, fold, tta));
        if path.is_file() {
            out.push((tta, read_npy(&path)?));
        }
    }
    Ok(out)
}

/// Score every fold that has validation arrays against `train.csv`; folds without
/// arrays are skipped, having none at all is an error.
pub fn compute_cv_scores(
    data_dir: &Path,
    preds_dir: &Path,
    n_folds: usize,
    tta_number: usize,
) -> anyhow::Result<CvScores> {
    let rows: Vec<TrainRow> = read_csv(&data_dir.join("train.csv"))?;
    let mut folds = Vec::new();
    let mut oof_preds = Vec::new();
    let mut oof_labels = Vec::new();

    for fold in 0..n_folds {
        let arrays = load_tta_arrays(preds_dir, Split::Val, fold, tta_number)?;
        if arrays.is_empty() {
            continue;
        }
        let labels: Vec<i32> = rows
            .iter()
            .filter(|r| r.fold_id == fold)
            .map(|r| r.label)
            .collect();
        let mut tta = Vec::new();
        for (id, array) in &arrays {
            if array.rows != labels.len() {
                bail!(
                    "fold {fold} tta {id}: {} predictions but {} ground-truth rows",
                    array.rows,
                    labels.len()
                );
            }
            let acc = accuracy(array, &labels);
            info!("fold {fold} tta {id}: acc {acc:.6}");
            tta.push(TtaScore { tta: *id, acc });
        }
        let owned: Vec<PredictionArray> = arrays.into_iter().map(|(_, a)| a).collect();
        let mean = mean_arrays(&owned)?;
        let tta_mean_acc = accuracy(&mean, &labels);
        info!("fold {fold} tta-mean: acc {tta_mean_acc:.6}");

        oof_preds.extend(mean.argmax());
        oof_labels.extend(labels.iter().copied());
        folds.push(FoldScore {
            fold,
            n_examples: labels.len(),
            tta,
            tta_mean_acc,
        });
    }
    if folds.is_empty() {
        bail!(
            "no validation prediction arrays found in {}",
            preds_dir.display()
        );
    }

    let hits = oof_preds
        .iter()
        .zip(&oof_labels)
        .filter(|(p, l)| **p as i64 == **l as i64)
        .count();
    let oof_acc = hits as f64 / oof_labels.len().max(1) as f64;
    info!(
        "OOF acc {oof_acc:.6} over {} examples from {} fold(s)",
        oof_labels.len(),
        folds.len()
    );
    Ok(CvScores {
        folds,
        oof_acc,
        n_examples: oof_labels.len(),
    })
}

/// Average every available test array, take the argmax and write `submission.csv`
/// into `out_dir`; returns the written path.
pub fn create_submission(
    data_dir: &Path,
    preds_dir: &Path,
    n_folds: usize,
    tta_number: usize,
    out_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let rows: Vec<TestRow> = read_csv(&data_dir.join("test.csv"))?;
    let mut arrays = Vec::new();
    for fold in 0..n_folds {
        for (tta, array) in load_tta_arrays(preds_dir, Split::Test, fold, tta_number)? {
            if array.rows != rows.len() {
                bail!(
                    "fold {fold} tta {tta}: {} test predictions but {} rows in test.csv",
                    array.rows,
                    rows.len()
                );
            }
            arrays.push(array);
        }
    }
    if arrays.is_empty() {
        bail!("no test prediction arrays found in {}", preds_dir.display());
    }
    info!("averaging {} test prediction array(s)", arrays.len());
    let mean = mean_arrays(&arrays)?;

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(SUBMISSION_FILE);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for (row, label) in rows.into_iter().zip(mean.argmax()) {
        writer.serialize(SubmissionRow {
            image_id: row.image_id,
            label: label as i32,
        })?;
    }
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_then_argmax() {
        let a = PredictionArray::new(2, 2, vec![0.9, 0.1, 0.4, 0.6]).unwrap();
        let b = PredictionArray::new(2, 2, vec![0.2, 0.8, 0.3, 0.7]).unwrap();
        let mean = mean_arrays(&[a, b]).unwrap();
        assert_eq!(mean.argmax(), vec![0, 1]);
        assert!((mean.data[0] - 0.55).abs() < 1e-6);
        assert!((accuracy(&mean, &[0, 0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mismatched_shapes_do_not_average() {
        let a = PredictionArray::new(1, 2, vec![0.5, 0.5]).unwrap();
        let b = PredictionArray::new(2, 1, vec![0.5, 0.5]).unwrap();
        assert!(mean_arrays(&[a, b]).is_err());
        assert!(mean_arrays(&[]).is_err());
    }

    #[test]
    fn csv_rows_keep_file_order_and_bad_rows_are_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("train.csv");
        std::fs::write(&path, "image_id,label,fold_id\nb.jpg,1,0\na.jpg,0,2\n").unwrap();
        let rows: Vec<TrainRow> = read_csv(&path).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.image_id.as_str()).collect();
        assert_eq!(ids, ["b.jpg", "a.jpg"]);
        assert_eq!(rows[1].fold_id, 2);

        std::fs::write(&path, "image_id,label,fold_id\nb.jpg,cat,0\n").unwrap();
        let err = read_csv::<TrainRow>(&path).unwrap_err();
        assert!(err.to_string().contains("bad row"));
        assert!(read_csv::<TestRow>(&tmp.path().join("missing.csv")).is_err());
    }
}
