//! Paired feature list + labels file, as produced by the front end and consumed by training.
//!
//! The labels file starts with a `<count> <dims>` header; line `i + 1` labels the feature
//! file on line `i` of the feature list. Shuffling and splitting keep the pairs together.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Error, Result};

/// Share of shuffled instances kept for training when cross-validation is automatic.
pub const AUTO_TRAINING_SHARE: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSet {
    /// Second header field of the labels file, passed through untouched.
    dims: String,
    features: Vec<String>,
    labels: Vec<String>,
}

impl TrainingSet {
    /// Read a feature list and its labels file, checking the header count.
    pub fn read(feature_list: &Path, labels: &Path) -> Result<Self> {
        let features: Vec<String> = non_blank_lines(&fs::read_to_string(feature_list)?);
        let mut label_lines = non_blank_lines(&fs::read_to_string(labels)?).into_iter();

        let header = label_lines.next().ok_or_else(|| {
            Error::format(format!("{}: labels file is empty", labels.display()))
        })?;
        let (count, dims) = parse_header(&header).ok_or_else(|| {
            Error::format(format!(
                "{}: expected a '<count> <dims>' header, found '{header}'",
                labels.display()
            ))
        })?;
        let labels_body: Vec<String> = label_lines.collect();

        if labels_body.len() != count {
            return Err(Error::format(format!(
                "{}: header announces {count} labels but {} are present",
                labels.display(),
                labels_body.len()
            )));
        }
        if features.len() != labels_body.len() {
            return Err(Error::length_mismatch(
                feature_list.display().to_string(),
                features.len(),
                labels.display().to_string(),
                labels_body.len(),
            ));
        }

        Ok(Self {
            dims,
            features,
            labels: labels_body,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Shuffle the instances, keeping each feature file with its label.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut pairs: Vec<(String, String)> = self
            .features
            .drain(..)
            .zip(self.labels.drain(..))
            .collect();
        pairs.shuffle(rng);
        (self.features, self.labels) = pairs.into_iter().unzip();
    }

    /// Split off everything after the first `share` of the instances.
    ///
    /// Returns `(head, tail)`. Either side may be empty for very small sets.
    pub fn split(self, share: f64) -> (TrainingSet, TrainingSet) {
        let at = (((self.len() as f64) * share).floor() as usize).min(self.len());

        let mut head = self;
        let tail = TrainingSet {
            dims: head.dims.clone(),
            features: head.features.split_off(at),
            labels: head.labels.split_off(at),
        };
        (head, tail)
    }

    /// Write the set back out, regenerating the labels header.
    pub fn write(&self, feature_list: &Path, labels: &Path) -> Result<()> {
        let mut f = BufWriter::new(File::create(feature_list)?);
        for line in &self.features {
            writeln!(f, "{line}")?;
        }
        f.flush()?;

        let mut l = BufWriter::new(File::create(labels)?);
        writeln!(l, "{} {}", self.labels.len(), self.dims)?;
        for line in &self.labels {
            writeln!(l, "{line}")?;
        }
        l.flush()?;
        Ok(())
    }
}

fn non_blank_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_header(header: &str) -> Option<(usize, String)> {
    let mut fields = header.split_whitespace();
    let count = fields.next()?.parse().ok()?;
    let dims = fields.next()?.to_owned();
    Some((count, dims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn write_set(dir: &Path, n: usize, header: &str) -> anyhow::Result<()> {
        let features: String = (0..n).map(|i| format!("/f/{i}.txt\n")).collect();
        let labels: String = (0..n).map(|i| format!("{i} {}\n", i + 10)).collect();
        fs::write(dir.join("list"), features)?;
        fs::write(dir.join("labels"), format!("{header}\n{labels}"))?;
        Ok(())
    }

    #[test]
    fn shuffle_keeps_pairs_together() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_set(dir.path(), 20, "20 2")?;

        let mut set = TrainingSet::read(&dir.path().join("list"), &dir.path().join("labels"))?;
        set.shuffle(&mut StdRng::seed_from_u64(7));

        for (feature, label) in set.features.iter().zip(&set.labels) {
            let i = feature.trim_start_matches("/f/").trim_end_matches(".txt");
            assert!(label.starts_with(&format!("{i} ")), "{feature} paired with {label}");
        }
        Ok(())
    }

    #[test]
    fn header_count_must_match() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_set(dir.path(), 3, "4 2")?;

        let err = TrainingSet::read(&dir.path().join("list"), &dir.path().join("labels"))
            .unwrap_err();
        assert!(err.to_string().contains("announces 4"));
        Ok(())
    }

    #[test]
    fn split_writes_fresh_headers() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_set(dir.path(), 10, "10 2")?;
        let set = TrainingSet::read(&dir.path().join("list"), &dir.path().join("labels"))?;

        let (train, test) = set.split(AUTO_TRAINING_SHARE);
        assert_eq!((train.len(), test.len()), (8, 2));

        test.write(&dir.path().join("test.list"), &dir.path().join("test.labels"))?;
        let labels = fs::read_to_string(dir.path().join("test.labels"))?;
        assert!(labels.starts_with("2 2\n8 18\n"));
        Ok(())
    }

    #[test]
    fn tiny_sets_leave_nothing_to_train_on() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_set(dir.path(), 1, "1 2")?;
        let set = TrainingSet::read(&dir.path().join("list"), &dir.path().join("labels"))?;

        let (train, test) = set.split(AUTO_TRAINING_SHARE);
        assert_eq!((train.len(), test.len()), (0, 1));
        Ok(())
    }
}
