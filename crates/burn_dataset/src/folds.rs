//! Fold-based shard selection and shard discovery.

use crate::types::{BurnDatasetError, DatasetResult};
use std::path::{Path, PathBuf};

pub const SHARD_EXT: &str = "rec";

fn escaped_dir(dir: &Path) -> String {
    glob::Pattern::escape(&dir.to_string_lossy())
}

/// Pattern for every shard of one fold: `<dir>/fold.<id>.rec*`.
pub fn fold_pattern(dir: &Path, fold: usize) -> String {
    format!("{}/fold.{fold}.{SHARD_EXT}*", escaped_dir(dir))
}

/// Pattern for the test shards: `<dir>/test.rec*`.
pub fn test_pattern(dir: &Path) -> String {
    format!("{}/test.{SHARD_EXT}*", escaped_dir(dir))
}

/// Train/validation shard patterns for one cross-validation iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSelection {
    pub fold: usize,
    /// One pattern per training fold, every fold except `fold`.
    pub train: Vec<String>,
    pub val: String,
    train_ids: Vec<usize>,
}

impl FoldSelection {
    pub fn new(dir: &Path, n_folds: usize, fold: usize) -> DatasetResult<Self> {
        if n_folds < 2 || fold >= n_folds {
            return Err(BurnDatasetError::Other(format!(
                "fold {fold} is not valid for n_folds={n_folds}"
            )));
        }
        let train_ids: Vec<usize> = (0..n_folds).filter(|id| *id != fold).collect();
        Ok(Self {
            fold,
            train: train_ids.iter().map(|id| fold_pattern(dir, *id)).collect(),
            val: fold_pattern(dir, fold),
            train_ids,
        })
    }

    pub fn train_ids(&self) -> &[usize] {
        &self.train_ids
    }

    /// Compact form for logs, e.g. `fold.[0234].rec*` (`fold.{0,2,...}` above ten folds).
    pub fn describe_train(&self) -> String {
        if self.train_ids.iter().all(|id| *id < 10) {
            let digits: String = self.train_ids.iter().map(|id| id.to_string()).collect();
            format!("fold.[{digits}].{SHARD_EXT}*")
        } else {
            let ids: Vec<String> = self.train_ids.iter().map(|id| id.to_string()).collect();
            format!("fold.{{{}}}.{SHARD_EXT}*", ids.join(","))
        }
    }
}

/// Expand patterns into a sorted, de-duplicated file list; no match is fatal.
pub fn discover_shards(patterns: &[String]) -> DatasetResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let paths = glob::glob(pattern).map_err(|source| BurnDatasetError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        for entry in paths {
            let path = entry.map_err(|e| BurnDatasetError::Io {
                path: e.path().to_path_buf(),
                source: std::io::Error::new(e.error().kind(), e.error().to_string()),
            })?;
            if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    files.dedup();
    if files.is_empty() {
        return Err(BurnDatasetError::NoFiles {
            patterns: patterns.to_vec(),
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn train_selection_excludes_only_the_validation_fold() {
        let dir = Path::new("data");
        for n_folds in 2..=12 {
            for fold in 0..n_folds {
                let sel = FoldSelection::new(dir, n_folds, fold).unwrap();
                assert_eq!(sel.train.len(), n_folds - 1);
                assert!(!sel.train.contains(&sel.val));
                for other in (0..n_folds).filter(|id| *id != fold) {
                    let pat = fold_pattern(dir, other);
                    assert_eq!(sel.train.iter().filter(|p| **p == pat).count(), 1);
                }
            }
        }
    }

    #[test]
    fn describe_uses_char_class_for_single_digit_folds() {
        let sel = FoldSelection::new(Path::new("d"), 5, 1).unwrap();
        assert_eq!(sel.describe_train(), "fold.[0234].rec*");
        let sel = FoldSelection::new(Path::new("d"), 12, 0).unwrap();
        assert!(sel.describe_train().starts_with("fold.{1,2,"));
    }

    #[test]
    fn invalid_fold_is_rejected() {
        assert!(FoldSelection::new(Path::new("d"), 5, 5).is_err());
        assert!(FoldSelection::new(Path::new("d"), 1, 0).is_err());
    }

    #[test]
    fn fold_one_pattern_does_not_match_fold_ten() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["fold.1.rec", "fold.10.rec", "fold.1.rec-00001"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        let files = discover_shards(&[fold_pattern(tmp.path(), 1)]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["fold.1.rec", "fold.1.rec-00001"]);
    }

    #[test]
    fn no_matching_files_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_shards(&[test_pattern(tmp.path())]),
            Err(BurnDatasetError::NoFiles { .. })
        ));
    }
}
