//! Core types and error definitions for burn_dataset.

use data_contracts::RecordError;
use image::DynamicImage;
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, BurnDatasetError>;

#[derive(Debug, Error)]
pub enum BurnDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("image decode error in {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid glob pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("no files match {patterns:?}")]
    NoFiles { patterns: Vec<String> },
    #[error("dataset {patterns:?} yielded no complete batch")]
    Empty { patterns: Vec<String> },
    #[error("unsupported channel count {0} (expected 1 or 3)")]
    Channels(u8),
    #[error("{0}")]
    Other(String),
}

/// A decoded record: 8-bit luma or RGB image plus integer class id.
#[derive(Debug, Clone)]
pub struct Example {
    pub image: DynamicImage,
    pub label: i32,
}

/// An example ready for batching: CHW floats in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct NormalizedExample {
    pub image_chw: Vec<f32>,
    pub label: i32,
}
