//! Whole-run orchestration: fold loop, then scoring and submission.

use crate::accel::init_accelerator;
use crate::config::RunConfig;
use crate::fold::{FoldOutcome, FoldRunner};
use crate::scoring::{compute_cv_scores, create_submission, CvScores};
use anyhow::Context;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub const CV_SCORES_FILE: &str = "cv_scores.json";

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub folds: Vec<FoldOutcome>,
    pub scores: Option<CvScores>,
    pub submission: Option<PathBuf>,
}

pub fn run(cfg: &RunConfig) -> anyhow::Result<RunSummary> {
    info!("Settings:\n{}", cfg.describe());
    fs::create_dir_all(&cfg.data_preds_dir)
        .with_context(|| format!("failed to create {}", cfg.data_preds_dir.display()))?;
    fs::create_dir_all(&cfg.model_dir)
        .with_context(|| format!("failed to create {}", cfg.model_dir.display()))?;

    let mut summary = RunSummary::default();
    if cfg.job.runs_folds() {
        let mut skip_used = false;
        for fold in cfg.initial_fold..cfg.final_fold {
            info!("***** Fold {fold} *****");
            let ctx = init_accelerator(cfg.accelerator, cfg.precision)?;
            let fit = cfg.job.should_fit(&mut skip_used);
            let outcome = FoldRunner::new(cfg, &ctx, fold)?
                .run(fit)
                .with_context(|| format!("fold {fold} failed"))?;
            summary.folds.push(outcome);
        }
    }

    if cfg.job.runs_scoring() {
        info!("VAL scores");
        let scores = compute_cv_scores(
            &cfg.data_dir,
            &cfg.data_preds_dir,
            cfg.n_folds,
            cfg.tta_number(),
        )?;
        let path = cfg.data_preds_dir.join(CV_SCORES_FILE);
        fs::write(&path, serde_json::to_vec_pretty(&scores)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        summary.scores = Some(scores);
    }

    if cfg.job.runs_submission() {
        info!("Create submission CSV");
        let path = create_submission(
            &cfg.data_dir,
            &cfg.data_preds_dir,
            cfg.n_folds,
            cfg.tta_number(),
            &cfg.model_dir,
        )?;
        info!("Submission was saved to: {}", path.display());
        summary.submission = Some(path);
    }
    Ok(summary)
}
