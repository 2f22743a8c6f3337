#![recursion_limit = "256"]

pub mod factory;
pub mod predict;

use std::path::PathBuf;
use thiserror::Error;

#[cfg(feature = "backend-wgpu")]
pub type InferenceBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type InferenceBackend = burn_ndarray::NdArray<f32>;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Dataset(#[from] burn_dataset::BurnDatasetError),
    #[error(transparent)]
    Model(#[from] models::ModelError),
    #[error("checkpoint {path:?}: {message}")]
    Checkpoint { path: PathBuf, message: String },
    #[error("tensor readback failed: {0}")]
    Tensor(String),
    #[error("prediction produced no rows")]
    Empty,
}

pub use factory::{save_checkpoint, CheckpointPrecision, InferenceFactory};
pub use predict::{predict_probs, PredictionArray};

pub mod prelude {
    pub use crate::factory::{CheckpointPrecision, InferenceFactory};
    pub use crate::predict::{predict_probs, PredictionArray};
    pub use crate::{InferenceBackend, InferenceError, InferenceResult};
}
