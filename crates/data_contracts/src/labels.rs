//! Row schemas for the ground-truth and test listing CSV files.
//!
//! Rows of one fold appear in the same order as the records in that fold's shards,
//! which is what lets prediction arrays be compared row by row.

use serde::{Deserialize, Serialize};

/// `train.csv`: `image_id,label,fold_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainRow {
    pub image_id: String,
    pub label: i32,
    pub fold_id: usize,
}

/// `test.csv`: `image_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRow {
    pub image_id: String,
}

/// `submission.csv`: `image_id,label`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub image_id: String,
    pub label: i32,
}
