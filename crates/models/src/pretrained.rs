//! Pretrained backbone weights, addressed by name or path.

use crate::{ModelError, ModelResult, VitBackbone, VitClassifier, VitConfig};
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use std::path::{Path, PathBuf};

pub const WEIGHTS_EXT: &str = "bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PretrainedWeights {
    None,
    File(PathBuf),
}

impl PretrainedWeights {
    /// `none` disables loading; otherwise `name` is tried as a file path, then as
    /// `<weights_dir>/<name>.bin`.
    pub fn resolve(name: &str, weights_dir: &Path) -> ModelResult<Self> {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("none") {
            return Ok(PretrainedWeights::None);
        }
        let direct = PathBuf::from(name);
        let named = weights_dir.join(format!("{name}.{WEIGHTS_EXT}"));
        for candidate in [&direct, &named] {
            if candidate.is_file() {
                return Ok(PretrainedWeights::File(candidate.clone()));
            }
        }
        Err(ModelError::WeightsNotFound {
            name: name.to_string(),
            candidates: vec![direct, named],
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            PretrainedWeights::None => None,
            PretrainedWeights::File(p) => Some(p),
        }
    }
}

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
}

impl<B: Backend> VitBackbone<B> {
    pub fn load_pretrained(self, path: &Path, device: &B::Device) -> ModelResult<Self> {
        self.load_file(path.to_path_buf(), &recorder(), device)
            .map_err(|err| ModelError::Load {
                path: path.to_path_buf(),
                message: format!("{err:?}"),
            })
    }

    /// Write the backbone alone so it can be reused as `--weights`.
    pub fn save_pretrained(&self, path: &Path) -> ModelResult<()> {
        self.clone()
            .save_file(path.to_path_buf(), &recorder())
            .map_err(|err| ModelError::Save {
                path: path.to_path_buf(),
                message: format!("{err:?}"),
            })
    }
}

/// Fresh classifier for one fold; pretrained weights go into the backbone only and the
/// head stays freshly initialized for `cfg.n_classes`.
pub fn build_classifier<B: Backend>(
    cfg: &VitConfig,
    weights: &PretrainedWeights,
    device: &B::Device,
) -> ModelResult<VitClassifier<B>> {
    let model = VitClassifier::new(cfg, device)?;
    let Some(path) = weights.path() else {
        return Ok(model);
    };
    tracing::info!(
        "loading pretrained {} backbone from {}",
        cfg.variant,
        path.display()
    );
    let backbone = model.backbone().clone().load_pretrained(path, device)?;
    Ok(model.with_backbone(backbone))
}
