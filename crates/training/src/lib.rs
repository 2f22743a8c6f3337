#![recursion_limit = "256"]

pub mod accel;
pub mod checkpoint;
pub mod config;
pub mod driver;
pub mod fold;
pub mod job;
pub mod npy;
pub mod pack;
pub mod policy;
pub mod scoring;

pub use accel::{init_accelerator, AccelContext, BackendKind, PrecisionPolicy};
pub use config::{RunArgs, RunConfig};
pub use driver::{run, RunSummary};
pub use fold::{FoldOutcome, FoldRunner, FoldStage};
pub use job::JobFlags;
pub use scoring::{compute_cv_scores, create_submission, CvScores};

/// Backend alias for training/prediction (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

/// `tracing` subscriber for the binaries; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
