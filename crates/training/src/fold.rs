//! One cross-validation fold: fit, reload the retained checkpoint, predict under TTA.

use crate::accel::AccelContext;
use crate::checkpoint::{best_checkpoint, checkpoint_path, keep_last_checkpoint};
use crate::config::RunConfig;
use crate::npy::write_npy;
use crate::policy::{EpochPolicies, PolicyConfig};
use crate::TrainBackend;
use anyhow::Context;
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use burn_dataset::{BatchIter, DatasetConfig, FoldSelection, Transform};
use data_contracts::{checkpoint_wildcard, prediction_file_name, Split};
use inference::{predict_probs, save_checkpoint, InferenceFactory};
use models::{build_classifier, VitClassifier};
use std::path::PathBuf;
use tracing::{debug, info};

type ADBackend = Autodiff<TrainBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldStage {
    Init,
    Fitting,
    Reload,
    Tta,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitReport {
    pub epochs_run: usize,
    pub best: Option<f64>,
    pub final_lr: f64,
    pub early_stopped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub fold: usize,
    pub fit: Option<FitReport>,
    pub checkpoint: PathBuf,
    pub predictions: Vec<PathBuf>,
}

pub struct FoldRunner<'a> {
    cfg: &'a RunConfig,
    ctx: &'a AccelContext,
    selection: FoldSelection,
    stage: FoldStage,
}

impl<'a> FoldRunner<'a> {
    pub fn new(cfg: &'a RunConfig, ctx: &'a AccelContext, fold: usize) -> anyhow::Result<Self> {
        let selection = FoldSelection::new(&cfg.data_rec_dir, cfg.n_folds, fold)?;
        info!("TRAIN GLOB: {}", selection.describe_train());
        info!("VAL   GLOB: {}", selection.val);
        info!("TEST  GLOB: {}", cfg.test_pattern);
        Ok(Self {
            cfg,
            ctx,
            selection,
            stage: FoldStage::Init,
        })
    }

    pub fn fold(&self) -> usize {
        self.selection.fold
    }

    pub fn stage(&self) -> FoldStage {
        self.stage
    }

    fn advance(&mut self, next: FoldStage) {
        debug!("fold {}: {:?} -> {:?}", self.fold(), self.stage, next);
        self.stage = next;
    }

    /// Drive the fold to `Done`; `fit = false` goes straight to reloading an
    /// existing checkpoint.
    pub fn run(mut self, fit: bool) -> anyhow::Result<FoldOutcome> {
        let mut report = None;
        let mut model = None;
        let mut checkpoint = PathBuf::new();
        let mut predictions = Vec::new();
        loop {
            match self.stage {
                FoldStage::Init => {
                    if !fit {
                        info!("skipping fit for fold {}", self.fold());
                    }
                    self.advance(if fit {
                        FoldStage::Fitting
                    } else {
                        FoldStage::Reload
                    });
                }
                FoldStage::Fitting => {
                    report = Some(self.fit()?);
                    self.advance(FoldStage::Reload);
                }
                FoldStage::Reload => {
                    checkpoint = best_checkpoint(&self.cfg.model_dir, self.fold())?;
                    info!("load model (fold {}): {}", self.fold(), checkpoint.display());
                    let factory =
                        InferenceFactory::new(self.cfg.model.clone(), self.ctx.checkpoint_precision());
                    model = Some(factory.load::<TrainBackend>(&checkpoint, &self.ctx.device)?);
                    self.advance(FoldStage::Tta);
                }
                FoldStage::Tta => {
                    let model = model.as_ref().context("no model loaded before prediction")?;
                    predictions = self.predict_tta(model)?;
                    self.advance(FoldStage::Done);
                }
                FoldStage::Done => break,
            }
        }
        Ok(FoldOutcome {
            fold: self.fold(),
            fit: report,
            checkpoint,
            predictions,
        })
    }

    fn fit(&self) -> anyhow::Result<FitReport> {
        let cfg = self.cfg;
        let fold = self.fold();
        let device = &self.ctx.device;

        let mut train = BatchIter::from_patterns(
            &self.selection.train,
            DatasetConfig::train(
                cfg.decode,
                cfg.norm,
                cfg.batch_size,
                cfg.aug,
                cfg.shuffle_buffer,
                cfg.drop_remainder,
            )
            .with_seed(cfg.seed),
        )?;
        let mut val = BatchIter::from_pattern(
            &self.selection.val,
            DatasetConfig::eval(cfg.decode, cfg.norm, cfg.batch_size, None, cfg.drop_remainder),
        )?;

        let mut model = build_classifier::<ADBackend>(&cfg.model, &cfg.weights, device)?;
        let mut optim = AdamConfig::new().init();
        let loss_fn = CrossEntropyLossConfig::new().init(device);
        let mut policies = EpochPolicies::new(cfg.monitor, cfg.lr, PolicyConfig::default());
        let wildcard = checkpoint_wildcard(fold);
        let steps = cfg.steps_per_epoch();
        let mut report = FitReport {
            final_lr: cfg.lr,
            ..Default::default()
        };

        info!("fit (fold {fold}): {} epochs x {steps} steps", cfg.n_epochs);
        for epoch in 1..=cfg.n_epochs {
            let mut loss_sum = 0.0f64;
            let mut hits = 0usize;
            let mut seen = 0usize;
            for _ in 0..steps {
                let batch = train
                    .next_batch::<ADBackend>(device)?
                    .context("training dataset ended before the epoch did")?;
                let n = batch.len();
                let logits = model.forward(batch.images);
                let loss = loss_fn.forward(logits.clone(), batch.labels.clone());
                let loss_val: f64 = loss.clone().detach().into_scalar().elem();
                let batch_hits: i64 = logits
                    .detach()
                    .argmax(1)
                    .reshape([n])
                    .equal(batch.labels)
                    .int()
                    .sum()
                    .into_scalar()
                    .elem();

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(policies.lr(), model, grads);

                loss_sum += loss_val * n as f64;
                hits += batch_hits as usize;
                seen += n;
            }

            let (val_loss, val_acc) = evaluate(&model.valid(), &mut val, device)?;
            let seen = seen.max(1) as f64;
            info!(
                "fold {fold} epoch {epoch}/{}: loss {:.4} {} {:.4} | val_loss {val_loss:.4} val_{} {val_acc:.4}",
                cfg.n_epochs,
                loss_sum / seen,
                cfg.metric_name,
                hits as f64 / seen,
                cfg.metric_name
            );

            let monitored = cfg.monitor.pick(val_loss, val_acc);
            let previous_best = policies.history().best();
            let decision = policies.end_epoch(monitored);
            report.epochs_run = epoch;

            if decision.save_checkpoint {
                let path = checkpoint_path(&cfg.model_dir, fold, epoch, val_loss, val_acc);
                info!(
                    "epoch {epoch}: {} improved from {previous_best:?} to {monitored:.5}, saving {}",
                    cfg.monitor,
                    path.display()
                );
                save_checkpoint(&model, &path, self.ctx.checkpoint_precision())?;
                keep_last_checkpoint(&cfg.model_dir, &wildcard)?;
            }
            if let Some(lr) = decision.new_lr {
                info!("epoch {epoch}: reducing learning rate to {lr:e}");
            }
            if decision.stop {
                info!("epoch {epoch}: early stopping");
                report.early_stopped = true;
                break;
            }
        }
        report.best = policies.history().best();
        report.final_lr = policies.lr();
        Ok(report)
    }

    fn predict_tta(&self, model: &VitClassifier<TrainBackend>) -> anyhow::Result<Vec<PathBuf>> {
        let cfg = self.cfg;
        let fold = self.fold();
        let mut written = Vec::new();
        for (tta_id, transform) in cfg.tta.iter().enumerate() {
            info!(
                "predict (fold {fold}, tta {tta_id}: {})",
                transform.name()
            );
            if cfg.job.val {
                written.push(self.predict_split(model, Split::Val, &self.selection.val, tta_id, *transform)?);
            }
            if cfg.job.test {
                written.push(self.predict_split(model, Split::Test, &cfg.test_pattern, tta_id, *transform)?);
            }
        }
        Ok(written)
    }

    fn predict_split(
        &self,
        model: &VitClassifier<TrainBackend>,
        split: Split,
        pattern: &str,
        tta_id: usize,
        transform: Transform,
    ) -> anyhow::Result<PathBuf> {
        let cfg = self.cfg;
        let mut batches = BatchIter::from_pattern(
            pattern,
            DatasetConfig::eval(
                cfg.decode,
                cfg.norm,
                cfg.batch_size,
                Some(transform),
                cfg.drop_remainder,
            ),
        )?;
        let probs = predict_probs(model, &mut batches, &self.ctx.device)?;
        let path = cfg
            .data_preds_dir
            .join(prediction_file_name(split, self.fold(), tta_id));
        write_npy(&path, &probs)?;
        info!(
            "{} predictions {}x{} -> {}",
            split.as_str(),
            probs.rows,
            probs.cols,
            path.display()
        );
        Ok(path)
    }
}

/// Mean cross-entropy and accuracy over one pass of `batches`.
pub fn evaluate<B: Backend>(
    model: &VitClassifier<B>,
    batches: &mut BatchIter,
    device: &B::Device,
) -> anyhow::Result<(f64, f64)> {
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    batches.reset();
    let mut loss_sum = 0.0f64;
    let mut hits = 0usize;
    let mut seen = 0usize;
    while let Some(batch) = batches.next_batch::<B>(device)? {
        let n = batch.len();
        let logits = model.forward(batch.images);
        let loss: f64 = loss_fn
            .forward(logits.clone(), batch.labels.clone())
            .into_scalar()
            .elem();
        let batch_hits: i64 = logits
            .argmax(1)
            .reshape([n])
            .equal(batch.labels)
            .int()
            .sum()
            .into_scalar()
            .elem();
        loss_sum += loss * n as f64;
        hits += batch_hits as usize;
        seen += n;
    }
    if seen == 0 {
        anyhow::bail!("validation dataset produced no batches");
    }
    Ok((loss_sum / seen as f64, hits as f64 / seen as f64))
}
