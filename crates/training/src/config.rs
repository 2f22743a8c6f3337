//! Command-line surface and the resolved, immutable run configuration.

use crate::accel::{BackendKind, PrecisionPolicy};
use crate::job::JobFlags;
use crate::policy::Monitor;
use anyhow::{bail, Context};
use burn_dataset::{AugPolicy, DecodeConfig, NormConfig, Transform};
use clap::{ArgAction, Parser};
use models::{PretrainedWeights, VitConfig, VitVariant};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "run",
    about = "k-fold ViT training with TTA prediction, CV scoring and submission"
)]
pub struct RunArgs {
    /// Directory containing fold.<id>.rec* and test.rec* shards.
    #[arg(long, default_value = "../../data/rec")]
    pub data_rec_dir: PathBuf,
    /// Directory containing train.csv and test.csv.
    #[arg(long, default_value = "../../data")]
    pub data_dir: PathBuf,
    /// Where prediction arrays are written.
    #[arg(long, default_value = "preds")]
    pub data_preds_dir: PathBuf,
    /// Where checkpoints and submission.csv are written.
    #[arg(long, default_value = ".")]
    pub model_dir: PathBuf,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub accelerator: BackendKind,
    #[arg(long, value_enum, default_value_t = PrecisionPolicy::None)]
    pub mixed_precision: PrecisionPolicy,
    /// Combination of train, val, test, score, subm; `skip` instead of `train` skips
    /// fitting in the first fold only.
    #[arg(long, default_value = "train_val_test_score_subm")]
    pub job: String,
    #[arg(long, default_value = "acc")]
    pub metric_name: String,
    /// val_loss or val_<metric_name>.
    #[arg(long, default_value = "val_loss")]
    pub monitor: String,
    #[arg(long, default_value_t = 5)]
    pub n_folds: usize,
    #[arg(long, default_value_t = 0)]
    pub initial_fold: usize,
    /// Exclusive; defaults to n_folds.
    #[arg(long)]
    pub final_fold: Option<usize>,
    #[arg(long, default_value_t = 3)]
    pub n_channels: u8,
    /// Side passed to the model.
    #[arg(long, default_value_t = 512)]
    pub dim: u32,
    /// Side after decoding, before augmentation.
    #[arg(long, default_value_t = 512)]
    pub dim_pre: u32,
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub image_inverted: bool,
    /// Training examples across all folds; defines the epoch length.
    #[arg(long, default_value_t = 12803)]
    pub n_examples_total: usize,
    #[arg(long, default_value_t = 200)]
    pub n_epochs: usize,
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub drop_remainder: bool,
    #[arg(long, default_value_t = 5e-5)]
    pub lr: f64,
    /// ViT preset: nano, tiny, small, base, large.
    #[arg(long, default_value = "large")]
    pub model: VitVariant,
    /// `none`, a weights name looked up in --weights-dir, or a path.
    #[arg(long, default_value = "none")]
    pub weights: String,
    #[arg(long, default_value = "weights")]
    pub weights_dir: PathBuf,
    /// Probability of an augmented example, whatever the number of transforms.
    #[arg(long, default_value_t = 0.5)]
    pub aug_percentage: f64,
    /// Train-time transforms in use (0 disables augmentation).
    #[arg(long, default_value_t = 9)]
    pub aug_number: usize,
    /// Test-time transforms; tta_number + 1 predictions per split and fold.
    #[arg(long, default_value_t = 0)]
    pub tta_number: usize,
    #[arg(long, default_value_t = 2265)]
    pub n_classes: usize,
    /// Shuffle buffer size; 0 disables shuffling.
    #[arg(long, default_value_t = 256)]
    pub buffer_size: usize,
    /// Seed for shuffling and augmentation; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Parameters resolved once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_rec_dir: PathBuf,
    pub data_dir: PathBuf,
    pub data_preds_dir: PathBuf,
    pub model_dir: PathBuf,
    pub accelerator: BackendKind,
    pub precision: PrecisionPolicy,
    pub job: JobFlags,
    pub metric_name: String,
    pub monitor: Monitor,
    pub n_folds: usize,
    pub initial_fold: usize,
    pub final_fold: usize,
    pub decode: DecodeConfig,
    pub norm: NormConfig,
    pub n_examples_total: usize,
    pub n_examples_train: usize,
    pub n_epochs: usize,
    pub batch_size: usize,
    pub drop_remainder: bool,
    pub lr: f64,
    pub model: VitConfig,
    pub weights: PretrainedWeights,
    pub aug: AugPolicy,
    pub tta: &'static [Transform],
    pub shuffle_buffer: Option<usize>,
    pub seed: Option<u64>,
    pub test_pattern: String,
    pub timestamp: String,
}

impl RunConfig {
    pub fn resolve(args: RunArgs) -> anyhow::Result<Self> {
        let job: JobFlags = args.job.parse().map_err(anyhow::Error::msg)?;
        let final_fold = args.final_fold.unwrap_or(args.n_folds);
        if args.n_folds < 2 {
            bail!("n_folds must be at least 2, got {}", args.n_folds);
        }
        if args.initial_fold > args.n_folds - 1 {
            bail!(
                "initial_fold {} must be at most n_folds - 1 = {}",
                args.initial_fold,
                args.n_folds - 1
            );
        }
        if final_fold > args.n_folds || final_fold <= args.initial_fold {
            bail!(
                "final_fold {final_fold} must satisfy initial_fold ({}) < final_fold <= n_folds ({})",
                args.initial_fold,
                args.n_folds
            );
        }
        if args.n_channels != 1 && args.n_channels != 3 {
            bail!("n_channels must be 1 or 3, got {}", args.n_channels);
        }
        if args.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if args.lr.is_nan() || args.lr <= 0.0 {
            bail!("lr must be positive, got {}", args.lr);
        }
        let monitor = Monitor::parse(&args.monitor, &args.metric_name)?;
        let aug = AugPolicy::new(args.aug_number, args.aug_percentage)?;
        let tta = burn_dataset::tta_transforms(args.tta_number)?;
        let model = VitConfig::preset(
            args.model,
            args.dim as usize,
            args.n_channels as usize,
            args.n_classes,
        )?;
        let fits_any = job.train || (job.skip && final_fold - args.initial_fold > 1);
        let weights = if fits_any {
            PretrainedWeights::resolve(&args.weights, &args.weights_dir)
                .with_context(|| format!("resolving --weights {}", args.weights))?
        } else {
            PretrainedWeights::None
        };

        Ok(Self {
            test_pattern: burn_dataset::test_pattern(&args.data_rec_dir),
            data_rec_dir: args.data_rec_dir,
            data_dir: args.data_dir,
            data_preds_dir: args.data_preds_dir,
            model_dir: args.model_dir,
            accelerator: args.accelerator,
            precision: args.mixed_precision,
            job,
            metric_name: args.metric_name,
            monitor,
            n_folds: args.n_folds,
            initial_fold: args.initial_fold,
            final_fold,
            decode: DecodeConfig {
                dim_pre: args.dim_pre,
                channels: args.n_channels,
            },
            norm: NormConfig {
                dim: args.dim,
                inverted: args.image_inverted,
            },
            n_examples_total: args.n_examples_total,
            n_examples_train: args.n_examples_total - args.n_examples_total / args.n_folds,
            n_epochs: args.n_epochs,
            batch_size: args.batch_size,
            drop_remainder: args.drop_remainder,
            lr: args.lr,
            model,
            weights,
            aug,
            tta,
            shuffle_buffer: (args.buffer_size > 0).then_some(args.buffer_size),
            seed: args.seed,
            timestamp: chrono::Local::now().format("%Y%m%d-%H%M%S-%6f").to_string(),
        })
    }

    pub fn tta_number(&self) -> usize {
        self.tta.len() - 1
    }

    /// Optimizer steps per epoch over the repeating training set.
    pub fn steps_per_epoch(&self) -> usize {
        (self.n_examples_train / self.batch_size).max(1)
    }

    /// Settings block logged once at startup.
    pub fn describe(&self) -> String {
        let lines = [
            format!("timestamp:        {}", self.timestamp),
            format!("data_rec_dir:     {}", self.data_rec_dir.display()),
            format!("data_dir:         {}", self.data_dir.display()),
            format!("data_preds_dir:   {}", self.data_preds_dir.display()),
            format!("model_dir:        {}", self.model_dir.display()),
            format!("accelerator:      {:?} ({:?})", self.accelerator, self.precision),
            format!("job:              {}", self.job),
            format!("monitor:          {} (metric {})", self.monitor, self.metric_name),
            format!(
                "folds:            {}..{} of {}",
                self.initial_fold, self.final_fold, self.n_folds
            ),
            format!(
                "image:            {} ch, dim_pre {}, dim {}, inverted {}",
                self.decode.channels, self.decode.dim_pre, self.norm.dim, self.norm.inverted
            ),
            format!(
                "examples:         {} total, {} per training split",
                self.n_examples_total, self.n_examples_train
            ),
            format!(
                "schedule:         {} epochs x {} steps, batch {}, lr {:e}, drop_remainder {}",
                self.n_epochs,
                self.steps_per_epoch(),
                self.batch_size,
                self.lr,
                self.drop_remainder
            ),
            format!(
                "model:            vit-{} patch {} -> {} classes, weights {:?}",
                self.model.variant,
                self.model.patch_size,
                self.model.n_classes,
                self.weights.path()
            ),
            format!(
                "aug:              {} (maxval {})",
                self.aug.describe(),
                self.aug.maxval()
            ),
            format!("tta_number:       {}", self.tta_number()),
            format!("shuffle_buffer:   {:?}, seed {:?}", self.shuffle_buffer, self.seed),
            format!("test shards:      {}", self.test_pattern),
        ];
        lines.join("\n")
    }
}
