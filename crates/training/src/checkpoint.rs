//! Checkpoint naming, retention and lookup inside the model directory.

use anyhow::Context;
use data_contracts::{checkpoint_file_name, checkpoint_wildcard};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn checkpoint_path(
    model_dir: &Path,
    fold: usize,
    epoch: usize,
    val_loss: f64,
    val_metric: f64,
) -> PathBuf {
    model_dir.join(checkpoint_file_name(fold, epoch, val_loss, val_metric))
}

/// Sorted files in `dir` whose names match `wildcard`.
fn sorted_matches(dir: &Path, wildcard: &str) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = format!("{}/{wildcard}", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("bad pattern {pattern}"))? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Delete every match of `wildcard` except the lexicographically last one; returns the
/// survivor.
pub fn keep_last_checkpoint(dir: &Path, wildcard: &str) -> anyhow::Result<Option<PathBuf>> {
    let mut files = sorted_matches(dir, wildcard)?;
    let last = files.pop();
    for stale in files {
        fs::remove_file(&stale)
            .with_context(|| format!("failed to remove checkpoint {}", stale.display()))?;
        debug!("removed checkpoint {}", stale.display());
    }
    Ok(last)
}

/// The retained checkpoint of `fold`; having none is an error.
pub fn best_checkpoint(dir: &Path, fold: usize) -> anyhow::Result<PathBuf> {
    let wildcard = checkpoint_wildcard(fold);
    sorted_matches(dir, &wildcard)?
        .pop()
        .with_context(|| format!("no checkpoint matching {wildcard} in {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"w").unwrap();
    }

    #[test]
    fn pruning_keeps_exactly_the_newest_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        for (epoch, loss) in [(1, 0.9), (2, 0.7), (5, 0.65)] {
            let path = checkpoint_path(tmp.path(), 0, epoch, loss, 0.5);
            fs::write(&path, b"w").unwrap();
        }
        touch(tmp.path(), "model-f1-e001-0.9000-0.5000.bin");

        let kept = keep_last_checkpoint(tmp.path(), &checkpoint_wildcard(0))
            .unwrap()
            .unwrap();
        assert_eq!(
            kept.file_name().unwrap().to_string_lossy(),
            "model-f0-e005-0.6500-0.5000.bin"
        );
        let mut left: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec!["model-f0-e005-0.6500-0.5000.bin", "model-f1-e001-0.9000-0.5000.bin"]
        );
    }

    #[test]
    fn lookup_does_not_confuse_fold_one_with_fold_ten() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "model-f1-e003-0.5000-0.5000.bin");
        touch(tmp.path(), "model-f10-e009-0.4000-0.6000.bin");
        let best = best_checkpoint(tmp.path(), 1).unwrap();
        assert!(best.ends_with("model-f1-e003-0.5000-0.5000.bin"));
        assert!(best_checkpoint(tmp.path(), 2).is_err());
    }
}
