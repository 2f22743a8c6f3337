//! Record-shard loading, augmentation, and Burn-compatible batching for fold-based training.
//!
//! This crate provides utilities for:
//! - Selecting train/validation shards per cross-validation fold
//! - Decoding serialized examples into fixed-size images
//! - Train-time augmentation and test-time transform selection
//! - Normalization and batch iteration into Burn tensors

pub mod aug;
pub mod batch;
pub mod decode;
pub mod folds;
pub mod norm;
pub mod types;

pub use aug::{tta_transforms, AugPolicy, Transform};
pub use batch::{prepare_example, Augment, BatchIter, DatasetConfig, ImageBatch};
pub use decode::{decode_image, decode_record, DecodeConfig};
pub use folds::{discover_shards, fold_pattern, test_pattern, FoldSelection};
pub use norm::{normalize, resize, NormConfig};
pub use types::*;
