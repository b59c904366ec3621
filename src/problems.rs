use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::Error;
use crate::instance::Instance;

/// Something that went wrong with one input file while a batch kept going.
#[derive(Debug)]
pub enum Problem {
    /// The file was skipped entirely.
    Skipped { path: PathBuf, error: Error },

    /// An instance was kept even though its window does not contain its event.
    Inconsistent { path: PathBuf, instance: Instance },
}

impl Problem {
    pub fn path(&self) -> &Path {
        match self {
            Problem::Skipped { path, .. } | Problem::Inconsistent { path, .. } => path,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Problem::Skipped { .. })
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Skipped { path, error } => {
                write!(f, "{}: skipped: {error}", path.display())
            }
            Problem::Inconsistent { path, instance } => write!(
                f,
                "{}: window [{:.3}, {:.3}] does not contain event [{:.3}, {:.3}]",
                path.display(),
                instance.window_min,
                instance.window_max,
                instance.event_min,
                instance.event_max
            ),
        }
    }
}

/// Append-only record of per-file problems, summarized at the end of a run.
#[derive(Debug, Default)]
pub struct ProblemList {
    problems: Vec<Problem>,
}

impl ProblemList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(&mut self, path: impl Into<PathBuf>, error: Error) {
        let path = path.into();
        error!(path = %path.display(), error = %error, "skipping file");
        self.problems.push(Problem::Skipped { path, error });
    }

    pub fn inconsistent(&mut self, path: impl Into<PathBuf>, instance: Instance) {
        let path = path.into();
        warn!(
            path = %path.display(),
            window_min = instance.window_min,
            window_max = instance.window_max,
            event_min = instance.event_min,
            event_max = instance.event_max,
            "window does not contain its event"
        );
        self.problems.push(Problem::Inconsistent { path, instance });
    }

    pub fn extend(&mut self, other: ProblemList) {
        self.problems.extend(other.problems);
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Problem> {
        self.problems.iter()
    }

    /// Number of files that were skipped outright.
    pub fn skipped(&self) -> usize {
        self.problems.iter().filter(|p| p.is_skip()).count()
    }

    /// Log every recorded problem once more, as an end-of-run summary.
    pub fn log_summary(&self) {
        if self.problems.is_empty() {
            return;
        }
        warn!(
            problems = self.problems.len(),
            skipped_files = self.skipped(),
            "run finished with problems"
        );
        for problem in &self.problems {
            warn!("{problem}");
        }
    }
}

impl<'a> IntoIterator for &'a ProblemList {
    type Item = &'a Problem;
    type IntoIter = std::slice::Iter<'a, Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_skips_separately_from_inconsistencies() {
        let mut problems = ProblemList::new();
        problems.skip("a.TextGrid", Error::TierNotFound("vot".into()));
        problems.inconsistent(
            "b.TextGrid",
            Instance {
                audio: "b.wav".into(),
                textgrid: "b.TextGrid".into(),
                window_min: 1.0,
                window_max: 1.1,
                event_min: 0.9,
                event_max: 1.0,
            },
        );

        assert_eq!(problems.len(), 2);
        assert_eq!(problems.skipped(), 1);
        assert!(problems.iter().next().unwrap().to_string().contains("tier 'vot' not found"));
    }
}
