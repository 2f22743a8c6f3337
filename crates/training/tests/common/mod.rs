#![allow(dead_code)]

use data_contracts::{ExampleRecord, RecordWriter};
use image::{Rgb, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const PER_FOLD: usize = 4;

pub fn png(label: i64, variant: usize) -> Vec<u8> {
    let base = if label == 0 { 30u8 } else { 220u8 };
    let img = RgbImage::from_fn(8, 8, |x, y| {
        Rgb([base, base.wrapping_add((x * 3 + y) as u8), (variant * 20) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub struct Fixture {
    pub root: tempfile::TempDir,
}

impl Fixture {
    /// `n_folds` fold shards of `PER_FOLD` alternating-label records, a test shard of
    /// `n_test` records, and the matching train.csv / test.csv.
    pub fn new(n_folds: usize, n_test: usize) -> anyhow::Result<Self> {
        let root = tempfile::tempdir()?;
        let fx = Self { root };
        fs::create_dir_all(fx.rec_dir())?;
        fs::create_dir_all(fx.data_dir())?;

        let mut train_csv = csv::Writer::from_path(fx.data_dir().join("train.csv"))?;
        train_csv.write_record(["image_id", "label", "fold_id"])?;
        for fold in 0..n_folds {
            let mut writer = RecordWriter::create(&fx.rec_dir().join(format!("fold.{fold}.rec")))?;
            for i in 0..PER_FOLD {
                let label = (i % 2) as i64;
                writer.write(&ExampleRecord::new(png(label, fold * PER_FOLD + i), label))?;
                train_csv.write_record([
                    format!("img_{fold}_{i}"),
                    label.to_string(),
                    fold.to_string(),
                ])?;
            }
            writer.finish()?;
        }
        train_csv.flush()?;

        let mut test_csv = csv::Writer::from_path(fx.data_dir().join("test.csv"))?;
        test_csv.write_record(["image_id"])?;
        let mut writer = RecordWriter::create(&fx.rec_dir().join("test.rec"))?;
        for i in 0..n_test {
            writer.write(&ExampleRecord::new(png((i % 2) as i64, 100 + i), 0))?;
            test_csv.write_record([format!("test_{i}")])?;
        }
        writer.finish()?;
        test_csv.flush()?;
        Ok(fx)
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn rec_dir(&self) -> PathBuf {
        self.path().join("rec")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn preds_dir(&self) -> PathBuf {
        self.path().join("preds")
    }

    pub fn model_dir(&self) -> PathBuf {
        self.path().join("models")
    }

    /// CLI arguments for a tiny nano-ViT run over this fixture; `overrides` replace or
    /// extend the defaults.
    pub fn args(&self, overrides: &[(&str, &str)]) -> Vec<String> {
        let dir = |p: PathBuf| p.to_string_lossy().into_owned();
        let mut pairs: Vec<(String, String)> = vec![
            ("--data-rec-dir".into(), dir(self.rec_dir())),
            ("--data-dir".into(), dir(self.data_dir())),
            ("--data-preds-dir".into(), dir(self.preds_dir())),
            ("--model-dir".into(), dir(self.model_dir())),
        ];
        let fixed = [
            ("--n-folds", "5"),
            ("--n-channels", "3"),
            ("--dim", "8"),
            ("--dim-pre", "8"),
            ("--n-examples-total", "20"),
            ("--n-epochs", "2"),
            ("--batch-size", "4"),
            ("--lr", "0.001"),
            ("--model", "nano"),
            ("--weights", "none"),
            ("--aug-number", "0"),
            ("--tta-number", "0"),
            ("--n-classes", "2"),
            ("--buffer-size", "4"),
            ("--seed", "7"),
        ];
        pairs.extend(fixed.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        for (key, value) in overrides {
            match pairs.iter_mut().find(|(k, _)| k.as_str() == *key) {
                Some(pair) => pair.1 = value.to_string(),
                None => pairs.push((key.to_string(), value.to_string())),
            }
        }
        let mut args = vec!["run".to_string()];
        for (k, v) in pairs {
            args.push(k);
            args.push(v);
        }
        args
    }

    pub fn list(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}
