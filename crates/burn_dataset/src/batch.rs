//! Dataset assembly: shard streaming, shuffling, augmentation, normalization, batching.

use crate::aug::{AugPolicy, Transform};
use crate::decode::{decode_record, DecodeConfig};
use crate::folds::discover_shards;
use crate::norm::{normalize, NormConfig};
use crate::types::{BurnDatasetError, DatasetResult, Example, NormalizedExample};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use data_contracts::{ExampleRecord, RecordReader};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

/// Which transform each example receives before normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Augment {
    None,
    /// Train-time: one transform drawn per example.
    Random(AugPolicy),
    /// Test-time: the same transform for every example.
    Fixed(Transform),
}

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub decode: DecodeConfig,
    pub norm: NormConfig,
    pub batch_size: usize,
    /// Keep shard order fixed across passes. Required for val/test so rows line up with labels.
    pub deterministic: bool,
    /// Bounded shuffle buffer; `None` disables shuffling.
    pub shuffle_buffer: Option<usize>,
    pub augment: Augment,
    pub drop_remainder: bool,
    /// Keep the first complete pass in memory and replay it afterwards.
    pub cache: bool,
    /// Restart from the first shard forever instead of ending.
    pub repeat: bool,
    pub seed: Option<u64>,
}

impl DatasetConfig {
    /// Training preset: shuffled, augmented, repeating, relaxed ordering.
    pub fn train(
        decode: DecodeConfig,
        norm: NormConfig,
        batch_size: usize,
        policy: AugPolicy,
        shuffle_buffer: Option<usize>,
        drop_remainder: bool,
    ) -> Self {
        Self {
            decode,
            norm,
            batch_size,
            deterministic: false,
            shuffle_buffer,
            augment: Augment::Random(policy),
            drop_remainder,
            cache: false,
            repeat: true,
            seed: None,
        }
    }

    /// Validation/test preset: ordered, cached, single pass, optional fixed TTA transform.
    pub fn eval(
        decode: DecodeConfig,
        norm: NormConfig,
        batch_size: usize,
        tta: Option<Transform>,
        drop_remainder: bool,
    ) -> Self {
        Self {
            decode,
            norm,
            batch_size,
            deterministic: true,
            shuffle_buffer: None,
            augment: tta.map_or(Augment::None, Augment::Fixed),
            drop_remainder,
            cache: true,
            repeat: false,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

pub struct ImageBatch<B: Backend> {
    /// `[batch, channels, dim, dim]`, values in `[0, 1]`.
    pub images: Tensor<B, 4>,
    pub labels: Tensor<B, 1, Int>,
    /// Host copy of `labels`.
    pub targets: Vec<i32>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

struct PendingRecord {
    record: ExampleRecord,
    file: usize,
    index: u64,
}

pub struct BatchIter {
    patterns: Vec<String>,
    files: Vec<PathBuf>,
    cfg: DatasetConfig,
    rng: StdRng,
    base_seed: u64,
    file_order: Vec<usize>,
    file_cursor: usize,
    reader: Option<RecordReader>,
    reader_file: usize,
    shuffle_buf: Vec<PendingRecord>,
    next_index: u64,
    pass_yielded: usize,
    pass_batches: usize,
    passes: usize,
    cache: Vec<NormalizedExample>,
    cache_complete: bool,
    cache_cursor: usize,
    processed_samples: usize,
    processed_batches: usize,
    total_load_time: Duration,
    started: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
}

impl BatchIter {
    pub fn from_patterns(patterns: &[String], cfg: DatasetConfig) -> DatasetResult<Self> {
        if cfg.batch_size == 0 {
            return Err(BurnDatasetError::Other("batch_size must be > 0".to_string()));
        }
        let files = discover_shards(patterns)?;
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let base_seed = cfg.seed.unwrap_or_else(|| rng.random());
        let log_every_samples = match std::env::var("BURN_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let mut iter = Self {
            patterns: patterns.to_vec(),
            files,
            cfg,
            rng,
            base_seed,
            file_order: Vec::new(),
            file_cursor: 0,
            reader: None,
            reader_file: 0,
            shuffle_buf: Vec::new(),
            next_index: 0,
            pass_yielded: 0,
            pass_batches: 0,
            passes: 0,
            cache: Vec::new(),
            cache_complete: false,
            cache_cursor: 0,
            processed_samples: 0,
            processed_batches: 0,
            total_load_time: Duration::ZERO,
            started: Instant::now(),
            last_logged_samples: 0,
            log_every_samples,
        };
        iter.start_pass();
        Ok(iter)
    }

    pub fn from_pattern(pattern: &str, cfg: DatasetConfig) -> DatasetResult<Self> {
        Self::from_patterns(&[pattern.to_string()], cfg)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.cfg
    }

    /// Whether the first pass has been cached and later passes replay it.
    pub fn is_cached(&self) -> bool {
        self.cache_complete
    }

    /// Begin a new pass from the start (cache replay if available).
    pub fn reset(&mut self) {
        self.start_pass();
    }

    fn start_pass(&mut self) {
        self.passes += 1;
        self.pass_yielded = 0;
        self.pass_batches = 0;
        self.cache_cursor = 0;
        if self.cache_complete {
            return;
        }
        self.cache.clear();
        self.shuffle_buf.clear();
        self.reader = None;
        self.file_cursor = 0;
        self.file_order = (0..self.files.len()).collect();
        if !self.cfg.deterministic {
            self.file_order.shuffle(&mut self.rng);
        }
    }

    pub fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<ImageBatch<B>>> {
        let batch_size = self.cfg.batch_size;
        loop {
            let examples = if self.cache_complete {
                self.next_cached(batch_size)
            } else {
                self.next_streamed(batch_size)?
            };

            if examples.is_empty() {
                if !self.cache_complete && self.cfg.cache && self.pass_yielded > 0 {
                    self.cache_complete = true;
                    // the pass just ended; replay starts only after a reset
                    self.cache_cursor = self.cache.len();
                    debug!(
                        examples = self.cache.len(),
                        "dataset cached after first full pass"
                    );
                }
                if self.cfg.repeat {
                    // a pass whose records never fill a batch would repeat forever
                    if self.pass_batches == 0 {
                        return Err(BurnDatasetError::Empty {
                            patterns: self.patterns.clone(),
                        });
                    }
                    self.start_pass();
                    continue;
                }
                return Ok(None);
            }

            self.pass_yielded += examples.len();
            if self.cfg.drop_remainder && examples.len() < batch_size {
                continue;
            }
            let batch = assemble::<B>(&examples, &self.cfg, device);
            self.pass_batches += 1;
            self.processed_samples += examples.len();
            self.processed_batches += 1;
            self.maybe_log_progress();
            return Ok(Some(batch));
        }
    }

    fn next_cached(&mut self, batch_size: usize) -> Vec<NormalizedExample> {
        let end = (self.cache_cursor + batch_size).min(self.cache.len());
        let out = self.cache[self.cache_cursor..end].to_vec();
        self.cache_cursor = end;
        out
    }

    fn next_streamed(&mut self, batch_size: usize) -> DatasetResult<Vec<NormalizedExample>> {
        let mut pending = Vec::with_capacity(batch_size);
        while pending.len() < batch_size {
            match self.next_raw()? {
                Some(p) => pending.push(p),
                None => break,
            }
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let t_load = Instant::now();
        let files = &self.files;
        let cfg = &self.cfg;
        let base_seed = self.base_seed;
        let examples = pending
            .into_par_iter()
            .map(|p| {
                let mut rng = StdRng::seed_from_u64(base_seed ^ p.index);
                prepare_example(p.record, &files[p.file], cfg, &mut rng)
            })
            .collect::<DatasetResult<Vec<_>>>()?;
        self.total_load_time += t_load.elapsed();

        if self.cfg.cache {
            self.cache.extend(examples.iter().cloned());
        }
        Ok(examples)
    }

    fn next_raw(&mut self) -> DatasetResult<Option<PendingRecord>> {
        let cap = match self.cfg.shuffle_buffer {
            Some(cap) if cap > 1 => cap,
            _ => return self.pull_record(),
        };
        while self.shuffle_buf.len() < cap {
            match self.pull_record()? {
                Some(p) => self.shuffle_buf.push(p),
                None => break,
            }
        }
        if self.shuffle_buf.is_empty() {
            return Ok(None);
        }
        let pick = self.rng.random_range(0..self.shuffle_buf.len());
        Ok(Some(self.shuffle_buf.swap_remove(pick)))
    }

    fn pull_record(&mut self) -> DatasetResult<Option<PendingRecord>> {
        loop {
            if self.reader.is_none() {
                let Some(&file) = self.file_order.get(self.file_cursor) else {
                    return Ok(None);
                };
                self.file_cursor += 1;
                self.reader = Some(RecordReader::open(&self.files[file])?);
                self.reader_file = file;
            }
            let Some(reader) = self.reader.as_mut() else {
                continue;
            };
            match reader.next_record()? {
                Some(record) => {
                    let index = self.next_index;
                    self.next_index += 1;
                    return Ok(Some(PendingRecord {
                        record,
                        file: self.reader_file,
                        index,
                    }));
                }
                None => self.reader = None,
            }
        }
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        if self.processed_samples.saturating_sub(self.last_logged_samples) < threshold {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let avg_load_ms =
            (self.total_load_time.as_secs_f64() * 1000.0) / self.processed_batches.max(1) as f64;
        debug!(
            batches = self.processed_batches,
            samples = self.processed_samples,
            passes = self.passes,
            cached = self.cache_complete,
            rate = format!("{:.1} img/s", self.processed_samples as f32 / secs),
            avg_load_ms = format!("{avg_load_ms:.2}"),
            "[dataset] progress"
        );
        self.last_logged_samples = self.processed_samples;
    }
}

/// Decode → transform → normalize for one record.
pub fn prepare_example<R: Rng + ?Sized>(
    record: ExampleRecord,
    path: &Path,
    cfg: &DatasetConfig,
    rng: &mut R,
) -> DatasetResult<NormalizedExample> {
    let example = decode_record(record, &cfg.decode, path)?;
    let transform = match cfg.augment {
        Augment::None => Transform::Identity,
        Augment::Random(policy) => policy.choose(rng),
        Augment::Fixed(t) => t,
    };
    let example = match transform {
        Transform::Identity => example,
        t => Example {
            image: t.apply(&example.image),
            label: example.label,
        },
    };
    normalize(&example, &cfg.norm)
}

fn assemble<B: Backend>(
    examples: &[NormalizedExample],
    cfg: &DatasetConfig,
    device: &B::Device,
) -> ImageBatch<B> {
    let n = examples.len();
    let dim = cfg.norm.dim as usize;
    let channels = cfg.decode.channels as usize;
    let mut images_buf = Vec::with_capacity(n * channels * dim * dim);
    let mut targets = Vec::with_capacity(n);
    for ex in examples {
        images_buf.extend_from_slice(&ex.image_chw);
        targets.push(ex.label);
    }
    let images = Tensor::<B, 1>::from_floats(images_buf.as_slice(), device)
        .reshape([n, channels, dim, dim]);
    let label_data: Vec<i64> = targets.iter().map(|v| i64::from(*v)).collect();
    let labels = Tensor::<B, 1, Int>::from_data(TensorData::new(label_data, [n]), device);
    ImageBatch {
        images,
        labels,
        targets,
    }
}
