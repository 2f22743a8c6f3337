//! End-of-epoch policies: best-checkpoint saving, LR reduction on plateau and
//! early stopping, all driven by one monitored validation value.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Min,
    Max,
}

/// Validation quantity the policies watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monitor {
    ValLoss,
    ValMetric,
}

impl Monitor {
    /// `val_loss`, or `val_<metric>` for the configured metric name.
    pub fn parse(name: &str, metric_name: &str) -> anyhow::Result<Self> {
        if name == "val_loss" {
            Ok(Monitor::ValLoss)
        } else if name == format!("val_{metric_name}") {
            Ok(Monitor::ValMetric)
        } else {
            anyhow::bail!("monitor must be val_loss or val_{metric_name}, got {name}")
        }
    }

    pub fn mode(self) -> MonitorMode {
        match self {
            Monitor::ValLoss => MonitorMode::Min,
            Monitor::ValMetric => MonitorMode::Max,
        }
    }

    pub fn pick(self, val_loss: f64, val_metric: f64) -> f64 {
        match self {
            Monitor::ValLoss => val_loss,
            Monitor::ValMetric => val_metric,
        }
    }
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Monitor::ValLoss => f.write_str("val_loss"),
            Monitor::ValMetric => f.write_str("val_metric"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub min_delta: f64,
    pub lr_factor: f64,
    pub lr_patience: usize,
    pub min_lr: f64,
    pub stop_patience: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_delta: 1e-4,
            lr_factor: 0.5,
            lr_patience: 4,
            min_lr: 1e-8,
            stop_patience: 8,
        }
    }
}

/// True when `current` beats `best` by more than `min_delta`; NaN never improves.
pub fn is_improvement(mode: MonitorMode, current: f64, best: Option<f64>, min_delta: f64) -> bool {
    let Some(best) = best else {
        return !current.is_nan();
    };
    match mode {
        MonitorMode::Min => current < best - min_delta,
        MonitorMode::Max => current > best + min_delta,
    }
}

/// New learning rate once `wait` stagnant epochs reach the patience, if `lr` can still drop.
pub fn plateau_lr(wait: usize, lr: f64, cfg: &PolicyConfig) -> Option<f64> {
    if wait >= cfg.lr_patience && lr > cfg.min_lr {
        Some((lr * cfg.lr_factor).max(cfg.min_lr))
    } else {
        None
    }
}

pub fn should_stop(stagnant: usize, epoch: usize, cfg: &PolicyConfig) -> bool {
    epoch > 0 && stagnant >= cfg.stop_patience
}

/// Monitored values seen so far and where the best one was.
#[derive(Debug, Clone)]
pub struct MetricHistory {
    mode: MonitorMode,
    min_delta: f64,
    values: Vec<f64>,
    best: Option<f64>,
    last_improvement: Option<usize>,
}

impl MetricHistory {
    pub fn new(mode: MonitorMode, min_delta: f64) -> Self {
        Self {
            mode,
            min_delta,
            values: Vec::new(),
            best: None,
            last_improvement: None,
        }
    }

    /// Record one epoch; returns whether it improved on the best.
    pub fn push(&mut self, value: f64) -> bool {
        let improved = is_improvement(self.mode, value, self.best, self.min_delta);
        if improved {
            self.best = Some(value);
            self.last_improvement = Some(self.values.len());
        }
        self.values.push(value);
        improved
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn improved_last(&self) -> bool {
        !self.values.is_empty() && self.last_improvement == Some(self.values.len() - 1)
    }

    /// Epochs since the last improvement (all of them if none improved).
    pub fn stagnant_epochs(&self) -> usize {
        match self.last_improvement {
            Some(i) => self.values.len() - 1 - i,
            None => self.values.len(),
        }
    }

    fn epochs_since(&self, epoch: Option<usize>) -> usize {
        match epoch {
            Some(i) => self.values.len() - 1 - i,
            None => self.values.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochDecision {
    pub save_checkpoint: bool,
    pub new_lr: Option<f64>,
    pub stop: bool,
}

/// The three policies over one shared history.
#[derive(Debug, Clone)]
pub struct EpochPolicies {
    cfg: PolicyConfig,
    history: MetricHistory,
    lr: f64,
    last_reduction: Option<usize>,
}

impl EpochPolicies {
    pub fn new(monitor: Monitor, lr: f64, cfg: PolicyConfig) -> Self {
        Self {
            history: MetricHistory::new(monitor.mode(), cfg.min_delta),
            cfg,
            lr,
            last_reduction: None,
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn history(&self) -> &MetricHistory {
        &self.history
    }

    pub fn end_epoch(&mut self, value: f64) -> EpochDecision {
        let save_checkpoint = self.history.push(value);
        let epoch = self.history.values().len() - 1;

        let anchor = match (self.history.last_improvement, self.last_reduction) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let wait = self.history.epochs_since(anchor);
        let new_lr = plateau_lr(wait, self.lr, &self.cfg);
        if let Some(lr) = new_lr {
            self.lr = lr;
            self.last_reduction = Some(epoch);
        }

        EpochDecision {
            save_checkpoint,
            new_lr,
            stop: should_stop(self.history.stagnant_epochs(), epoch, &self.cfg),
        }
    }
}
