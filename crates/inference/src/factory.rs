use crate::{InferenceError, InferenceResult};
use burn::module::Module;
use burn::record::{BinFileRecorder, FileRecorder, FullPrecisionSettings, HalfPrecisionSettings};
use burn::tensor::backend::Backend;
use models::{VitClassifier, VitConfig};
use std::path::Path;

/// Storage precision for checkpoint records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckpointPrecision {
    #[default]
    Full,
    /// f16 records, used for the mixed-precision policies.
    Half,
}

fn save_with<B: Backend, FR: FileRecorder<B>>(
    model: &VitClassifier<B>,
    path: &Path,
    recorder: &FR,
) -> InferenceResult<()> {
    model
        .clone()
        .save_file(path.to_path_buf(), recorder)
        .map_err(|err| InferenceError::Checkpoint {
            path: path.to_path_buf(),
            message: format!("{err:?}"),
        })
}

fn load_with<B: Backend, FR: FileRecorder<B>>(
    model: VitClassifier<B>,
    path: &Path,
    recorder: &FR,
    device: &B::Device,
) -> InferenceResult<VitClassifier<B>> {
    model
        .load_file(path.to_path_buf(), recorder, device)
        .map_err(|err| InferenceError::Checkpoint {
            path: path.to_path_buf(),
            message: format!("{err:?}"),
        })
}

/// Write `model` to `path`; the path must already carry the `.bin` extension.
pub fn save_checkpoint<B: Backend>(
    model: &VitClassifier<B>,
    path: &Path,
    precision: CheckpointPrecision,
) -> InferenceResult<()> {
    match precision {
        CheckpointPrecision::Full => {
            save_with(model, path, &BinFileRecorder::<FullPrecisionSettings>::new())
        }
        CheckpointPrecision::Half => {
            save_with(model, path, &BinFileRecorder::<HalfPrecisionSettings>::new())
        }
    }
}

/// Builds inference models from checkpoints written during fitting.
#[derive(Debug, Clone)]
pub struct InferenceFactory {
    pub model: VitConfig,
    pub precision: CheckpointPrecision,
}

impl InferenceFactory {
    pub fn new(model: VitConfig, precision: CheckpointPrecision) -> Self {
        Self { model, precision }
    }

    /// Fresh model with the checkpoint weights; a missing file is an error.
    pub fn load<B: Backend>(&self, path: &Path, device: &B::Device) -> InferenceResult<VitClassifier<B>> {
        if !path.is_file() {
            return Err(InferenceError::Checkpoint {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }
        let fresh = VitClassifier::<B>::new(&self.model, device)?;
        let model = match self.precision {
            CheckpointPrecision::Full => load_with(
                fresh,
                path,
                &BinFileRecorder::<FullPrecisionSettings>::new(),
                device,
            )?,
            CheckpointPrecision::Half => load_with(
                fresh,
                path,
                &BinFileRecorder::<HalfPrecisionSettings>::new(),
                device,
            )?,
        };
        tracing::info!("loaded checkpoint {}", path.display());
        Ok(model)
    }
}
