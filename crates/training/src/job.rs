//! Job-mode flags parsed from an underscore-separated job string.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobFlags {
    pub train: bool,
    /// Skip fitting for the first processed fold only.
    pub skip: bool,
    pub val: bool,
    pub test: bool,
    pub score: bool,
    pub subm: bool,
}

impl JobFlags {
    /// Whether the per-fold loop (fit, reload, predict) runs at all.
    pub fn runs_folds(&self) -> bool {
        self.train || self.skip || self.val || self.test
    }

    pub fn runs_scoring(&self) -> bool {
        self.val || self.score
    }

    pub fn runs_submission(&self) -> bool {
        self.test || self.subm
    }

    /// Fitting decision for the next fold; consumes the one-shot skip.
    pub fn should_fit(&self, skip_used: &mut bool) -> bool {
        if self.skip && !*skip_used {
            *skip_used = true;
            return false;
        }
        self.train || self.skip
    }
}

impl FromStr for JobFlags {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = JobFlags::default();
        for word in s.split(['_', ',', '+']).map(str::trim).filter(|w| !w.is_empty()) {
            match word.to_ascii_lowercase().as_str() {
                "train" => flags.train = true,
                "skip" => flags.skip = true,
                "val" => flags.val = true,
                "test" => flags.test = true,
                "score" => flags.score = true,
                "subm" => flags.subm = true,
                other => return Err(format!("unknown job word '{other}' in '{s}'")),
            }
        }
        if flags == JobFlags::default() {
            return Err(format!("job '{s}' selects nothing"));
        }
        Ok(flags)
    }
}

impl fmt::Display for JobFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = [
            (self.train, "train"),
            (self.skip, "skip"),
            (self.val, "val"),
            (self.test, "test"),
            (self.score, "score"),
            (self.subm, "subm"),
        ];
        let on: Vec<&str> = words.iter().filter(|(b, _)| *b).map(|(_, w)| *w).collect();
        f.write_str(&on.join("_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_job_enables_everything_but_skip() {
        let flags: JobFlags = "train_val_test_score_subm".parse().unwrap();
        assert!(flags.train && flags.val && flags.test && flags.score && flags.subm);
        assert!(!flags.skip);
        assert_eq!(flags.to_string(), "train_val_test_score_subm");
    }

    #[test]
    fn skip_applies_to_the_first_fold_only() {
        let flags: JobFlags = "skip_val_test".parse().unwrap();
        let mut used = false;
        let decisions: Vec<bool> = (0..4).map(|_| flags.should_fit(&mut used)).collect();
        assert_eq!(decisions, vec![false, true, true, true]);
        assert!(used);
    }

    #[test]
    fn prediction_only_jobs_never_fit() {
        let flags: JobFlags = "val_test".parse().unwrap();
        let mut used = false;
        assert!(flags.runs_folds());
        assert!(!flags.should_fit(&mut used));
        assert!(!used);
    }

    #[test]
    fn aggregation_only_jobs_skip_the_fold_loop() {
        for job in ["score", "subm", "score_subm"] {
            let flags: JobFlags = job.parse().unwrap();
            assert!(!flags.runs_folds(), "{job}");
        }
        let flags: JobFlags = "score_subm".parse().unwrap();
        assert!(flags.runs_scoring() && flags.runs_submission());
    }

    #[test]
    fn stage_selection_follows_flags() {
        let flags: JobFlags = "train_val".parse().unwrap();
        assert!(flags.runs_scoring());
        assert!(!flags.runs_submission());
        let flags: JobFlags = "train_test".parse().unwrap();
        assert!(!flags.runs_scoring());
        assert!(flags.runs_submission());
    }

    #[test]
    fn unknown_words_are_rejected() {
        assert!("train_predict".parse::<JobFlags>().is_err());
        assert!("".parse::<JobFlags>().is_err());
    }
}
