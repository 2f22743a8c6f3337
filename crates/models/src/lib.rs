//! Burn image classifiers for the k-fold training driver.
//!
//! This crate defines the vision-transformer used for classification:
//! - `VitBackbone`: patch embedding, class token, learned position embedding and a
//!   pre-norm transformer encoder; produces one feature vector per image.
//! - `VitClassifier`: a backbone plus a freshly initialized linear head.
//!
//! These are pure Burn Modules. Checkpoint handling lives in the `training` and
//! `inference` crates; this crate only knows how to load pretrained backbone weights.

mod pretrained;
mod vit;

pub use pretrained::{build_classifier, PretrainedWeights, WEIGHTS_EXT};
pub use vit::{VitBackbone, VitClassifier, VitConfig, VitVariant};

use std::path::PathBuf;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown model variant '{0}' (expected one of nano, tiny, small, base, large)")]
    UnknownVariant(String),
    #[error("image dim {dim} is not divisible by patch size {patch}")]
    PatchMismatch { dim: usize, patch: usize },
    #[error("n_channels must be 1 or 3, got {0}")]
    Channels(usize),
    #[error("n_classes must be at least 2, got {0}")]
    Classes(usize),
    #[error("pretrained weights '{name}' not found (looked for {candidates:?})")]
    WeightsNotFound {
        name: String,
        candidates: Vec<PathBuf>,
    },
    #[error("failed to load weights from {path:?}: {message}")]
    Load { path: PathBuf, message: String },
    #[error("failed to save weights to {path:?}: {message}")]
    Save { path: PathBuf, message: String },
}

pub mod prelude {
    pub use super::{
        build_classifier, ModelError, ModelResult, PretrainedWeights, VitBackbone,
        VitClassifier, VitConfig, VitVariant,
    };
}
