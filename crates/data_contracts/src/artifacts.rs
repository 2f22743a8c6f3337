//! File naming for checkpoints and prediction arrays.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

/// `model-f{fold}-e{epoch:03}-{val_loss:.4}-{val_metric:.4}.bin`
///
/// The zero-padded epoch keeps lexicographic order equal to save order within a fold.
pub fn checkpoint_file_name(fold: usize, epoch: usize, val_loss: f64, val_metric: f64) -> String {
    format!("model-f{fold}-e{epoch:03}-{val_loss:.4}-{val_metric:.4}.bin")
}

/// Wildcard matching every checkpoint of one fold.
pub fn checkpoint_wildcard(fold: usize) -> String {
    format!("model-f{fold}-e*.bin")
}

pub fn prediction_file_name(split: Split, fold: usize, tta: usize) -> String {
    format!("y_pred_{}_fold_{fold}_tta_{tta}.npy", split.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_names_sort_by_epoch() {
        let a = checkpoint_file_name(0, 9, 0.51234, 0.8);
        let b = checkpoint_file_name(0, 10, 0.49, 0.81);
        assert_eq!(a, "model-f0-e009-0.5123-0.8000.bin");
        assert!(a < b);
    }

    #[test]
    fn prediction_names_carry_split_fold_and_tta() {
        assert_eq!(
            prediction_file_name(Split::Test, 3, 2),
            "y_pred_test_fold_3_tta_2.npy"
        );
    }
}
