//! Accelerator (burn backend) and precision policy selection.

use crate::TrainBackend;
use burn::tensor::backend::Backend;
use clap::ValueEnum;
use inference::CheckpointPrecision;
use tracing::{info, warn};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    #[value(name = "ndarray")]
    NdArray,
    Wgpu,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecisionPolicy {
    #[default]
    None,
    #[value(name = "mixed_float16")]
    MixedFloat16,
    #[value(name = "mixed_bfloat16")]
    MixedBfloat16,
}

impl PrecisionPolicy {
    pub fn checkpoint_precision(self) -> CheckpointPrecision {
        match self {
            PrecisionPolicy::None => CheckpointPrecision::Full,
            PrecisionPolicy::MixedFloat16 | PrecisionPolicy::MixedBfloat16 => {
                CheckpointPrecision::Half
            }
        }
    }
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray accelerator")
        }
        (BackendKind::NdArray, true) => {
            warn!("built with backend-wgpu; training will still use the WGPU backend despite --accelerator ndarray");
        }
        _ => {}
    }
    Ok(())
}

/// Ready-to-use execution context for one fold.
#[derive(Debug, Clone)]
pub struct AccelContext {
    pub kind: BackendKind,
    pub precision: PrecisionPolicy,
    pub device: <TrainBackend as Backend>::Device,
}

impl AccelContext {
    pub fn checkpoint_precision(&self) -> CheckpointPrecision {
        self.precision.checkpoint_precision()
    }
}

pub fn init_accelerator(kind: BackendKind, precision: PrecisionPolicy) -> anyhow::Result<AccelContext> {
    validate_backend_choice(kind)?;
    let device = <TrainBackend as Backend>::Device::default();
    match precision {
        PrecisionPolicy::None => info!("accelerator {kind:?}: f32 compute, f32 checkpoints"),
        policy => info!(
            "accelerator {kind:?}: {policy:?} policy, f32 compute with half-precision checkpoints"
        ),
    }
    Ok(AccelContext {
        kind,
        precision,
        device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_names_match_the_cli_surface() {
        let parsed = PrecisionPolicy::from_str("mixed_bfloat16", false).unwrap();
        assert_eq!(parsed, PrecisionPolicy::MixedBfloat16);
        assert_eq!(
            PrecisionPolicy::from_str("none", false).unwrap(),
            PrecisionPolicy::None
        );
        assert_eq!(BackendKind::from_str("ndarray", false).unwrap(), BackendKind::NdArray);
    }

    #[test]
    fn mixed_policies_store_half_precision_checkpoints() {
        assert_eq!(
            PrecisionPolicy::None.checkpoint_precision(),
            CheckpointPrecision::Full
        );
        assert_eq!(
            PrecisionPolicy::MixedFloat16.checkpoint_precision(),
            CheckpointPrecision::Half
        );
    }

    #[cfg(not(feature = "backend-wgpu"))]
    #[test]
    fn wgpu_requires_the_feature() {
        assert!(init_accelerator(BackendKind::Wgpu, PrecisionPolicy::None).is_err());
        assert!(init_accelerator(BackendKind::NdArray, PrecisionPolicy::None).is_ok());
    }
}
