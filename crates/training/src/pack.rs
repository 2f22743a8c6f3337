//! Pack CSV-listed image files into fold and test record shards.

use crate::scoring::read_csv;
use anyhow::{bail, Context};
use clap::Parser;
use data_contracts::{ExampleRecord, RecordWriter, TestRow, TrainRow};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(name = "pack", about = "Pack train/test images into fold.<id>.rec / test.rec shards")]
pub struct PackArgs {
    /// Directory containing train.csv and test.csv.
    #[arg(long, default_value = "../../data")]
    pub data_dir: PathBuf,
    /// Directory with the training images named by image_id.
    #[arg(long, default_value = "../../data/train")]
    pub train_images_dir: PathBuf,
    /// Directory with the test images named by image_id.
    #[arg(long, default_value = "../../data/test")]
    pub test_images_dir: PathBuf,
    /// Output directory for the shards.
    #[arg(long, default_value = "../../data/rec")]
    pub out_dir: PathBuf,
    /// Extension appended to image_id when the bare id is not a file.
    #[arg(long, default_value = "jpg")]
    pub image_ext: String,
    /// Split a fold into several shards of at most this many records (0 = one shard).
    #[arg(long, default_value_t = 0)]
    pub max_per_shard: usize,
    /// Skip test.csv.
    #[arg(long, default_value_t = false)]
    pub no_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSummary {
    /// (shard, records) in write order.
    pub shards: Vec<(PathBuf, usize)>,
}

impl PackSummary {
    pub fn total_records(&self) -> usize {
        self.shards.iter().map(|(_, n)| n).sum()
    }
}

fn image_path(dir: &Path, image_id: &str, ext: &str) -> anyhow::Result<PathBuf> {
    let bare = dir.join(image_id);
    if bare.is_file() {
        return Ok(bare);
    }
    let with_ext = dir.join(format!("{image_id}.{ext}"));
    if with_ext.is_file() {
        return Ok(with_ext);
    }
    bail!("image {image_id} not found in {}", dir.display())
}

fn read_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    image::guess_format(&bytes)
        .with_context(|| format!("{} is not a recognised image", path.display()))?;
    Ok(bytes)
}

/// Shard names for `stem`: `<stem>` alone, or `<stem>-00000`, `<stem>-00001`, ... so that
/// sorted shard order equals write order.
fn shard_name(stem: &str, index: usize, chunked: bool) -> String {
    if chunked {
        format!("{stem}-{index:05}")
    } else {
        stem.to_string()
    }
}

fn write_shards(
    out_dir: &Path,
    stem: &str,
    items: &[(PathBuf, i64)],
    max_per_shard: usize,
) -> anyhow::Result<Vec<(PathBuf, usize)>> {
    let chunked = max_per_shard > 0 && items.len() > max_per_shard;
    let chunk = if chunked { max_per_shard } else { items.len().max(1) };
    let mut written = Vec::new();
    for (index, group) in items.chunks(chunk).enumerate() {
        let path = out_dir.join(shard_name(stem, index, chunked));
        let mut writer = RecordWriter::create(&path)?;
        for (image, label) in group {
            writer.write(&ExampleRecord::new(read_image(image)?, *label))?;
        }
        let n = writer.finish()?;
        info!("wrote {n} records to {}", path.display());
        written.push((path, n));
    }
    Ok(written)
}

pub fn run_pack(args: &PackArgs) -> anyhow::Result<PackSummary> {
    fs::create_dir_all(&args.out_dir)?;
    let train: Vec<TrainRow> = read_csv(&args.data_dir.join("train.csv"))?;
    let mut by_fold: BTreeMap<usize, Vec<(PathBuf, i64)>> = BTreeMap::new();
    for row in &train {
        let path = image_path(&args.train_images_dir, &row.image_id, &args.image_ext)?;
        by_fold
            .entry(row.fold_id)
            .or_default()
            .push((path, row.label as i64));
    }

    let mut summary = PackSummary::default();
    for (fold, items) in &by_fold {
        let stem = format!("fold.{fold}.{}", burn_dataset::folds::SHARD_EXT);
        summary
            .shards
            .extend(write_shards(&args.out_dir, &stem, items, args.max_per_shard)?);
    }

    if !args.no_test {
        let test: Vec<TestRow> = read_csv(&args.data_dir.join("test.csv"))?;
        let items = test
            .iter()
            .map(|row| Ok((image_path(&args.test_images_dir, &row.image_id, &args.image_ext)?, 0)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let stem = format!("test.{}", burn_dataset::folds::SHARD_EXT);
        summary
            .shards
            .extend(write_shards(&args.out_dir, &stem, &items, args.max_per_shard)?);
    }
    info!(
        "packed {} records into {} shard(s) under {}",
        summary.total_records(),
        summary.shards.len(),
        args.out_dir.display()
    );
    Ok(summary)
}
