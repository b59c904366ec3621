//! High-level API for running AutoVOT over batches of files.
//!
//! We expose a single entry point (`AutoVot`) that wires the pieces together:
//! derivation → front-end files → classifier → predictions → reintegration → encoder.
//!
//! The intent is:
//! - The classifier is chosen once and reused for every batch.
//! - Every batch operation keeps going past bad input files and returns the problems it saw.
//! - Only run-level failures (configuration, unreadable list files, a missing external
//!   program) come back as `Err`.
//!
//! This module is deliberately "high level": each step stays testable in its own module.

use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, ExternalClassifier, ExternalTools};
use crate::csv_encoder::CsvEncoder;
use crate::inputs::SourcePair;
use crate::instance::{FrontEndFiles, read_instance_file};
use crate::json_array_encoder::JsonArrayEncoder;
use crate::opts::{CrossValidation, DecodeOpts, TierDefinitions, TrainOpts};
use crate::output_type::OutputType;
use crate::prediction::read_predictions;
use crate::problems::ProblemList;
use crate::reintegrate::{PredictedVot, TierOutcome, predicted_vots, reintegrate};
use crate::textgrid;
use crate::training::{AUTO_TRAINING_SHARE, TrainingSet};
use crate::vot_encoder::{VotEncoder, VotRecord};
use crate::windows::{derive_batch, derive_file, load_textgrid};
use crate::{Error, Result};

/// Outcome of a feature-extraction batch.
#[derive(Debug, Default)]
pub struct Extraction {
    pub instances: usize,
    pub problems: ProblemList,
}

/// Outcome of a training run.
#[derive(Debug, Default)]
pub struct TrainReport {
    /// Instances the model was trained on.
    pub trained_on: usize,

    /// Instances used for the cross-validation decode pass.
    pub held_out: usize,

    pub problems: ProblemList,
}

/// Outcome of a decoding batch.
#[derive(Debug, Default)]
pub struct DecodeReport {
    /// Files that went through the decoder.
    pub files_decoded: usize,

    /// Files that received a prediction tier.
    pub tiers_written: usize,

    pub predictions: usize,
    pub problems: ProblemList,
}

/// Result of writing one file's predictions back.
#[derive(Debug, Clone, PartialEq)]
pub struct Reintegrated {
    pub outcome: TierOutcome,
    pub vots: Vec<PredictedVot>,
}

/// The main high-level entry point.
///
/// Typical usage:
/// - Construct once with the external programs (or any other [`Classifier`]).
/// - Call `train` or `decode` for each batch.
pub struct AutoVot<C: Classifier = ExternalClassifier> {
    classifier: C,
}

impl AutoVot<ExternalClassifier> {
    /// Use the AutoVOT command-line programs.
    pub fn new(tools: ExternalTools) -> Self {
        Self::with_classifier(ExternalClassifier::new(tools))
    }
}

impl<C: Classifier> AutoVot<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Derive instances from every pair, write the front-end files and run the front end.
    ///
    /// When no file yields an instance the front end is not run and no labels file exists.
    pub fn extract_features(
        &self,
        pairs: &[SourcePair],
        defs: &TierDefinitions,
        files: &FrontEndFiles,
    ) -> Result<Extraction> {
        let batch = derive_batch(pairs, defs)?;
        files.write(&batch.instances)?;

        if batch.instances.is_empty() {
            warn!(files = pairs.len(), "no instances found, front end not run");
            return Ok(Extraction {
                instances: 0,
                problems: batch.problems,
            });
        }

        info!(
            instances = batch.instances.len(),
            files = batch.files_used,
            "extracting features"
        );
        self.classifier.extract_features(files)?;
        require_output(&files.labels, "front end", "labels file")?;

        Ok(Extraction {
            instances: batch.instances.len(),
            problems: batch.problems,
        })
    }

    /// Extract features from labeled data and train `model` on them.
    pub fn train(
        &self,
        pairs: &[SourcePair],
        defs: &TierDefinitions,
        model: &Path,
        opts: &TrainOpts,
    ) -> Result<TrainReport> {
        let scratch = Scratch::new(opts.work_dir.as_deref(), false)?;
        let files = FrontEndFiles::in_dir(scratch.path(), "training");

        let extraction = self.extract_features(pairs, defs, &files)?;
        let mut problems = extraction.problems;
        if extraction.instances == 0 {
            problems.log_summary();
            return Err(Error::msg("no training instances found in any input file"));
        }

        let held_out = match &opts.cross_validation {
            CrossValidation::Files(cv_pairs) => {
                let mut cv_files = FrontEndFiles::in_dir(scratch.path(), "cross_validation");
                cv_files.features_dir = scratch.path().join("cross_validation_features");

                let cv = self.extract_features(cv_pairs, defs, &cv_files)?;
                problems.extend(cv.problems);
                if cv.instances == 0 {
                    warn!("no cross-validation instances found, skipping evaluation");
                    None
                } else {
                    Some((cv_files.feature_list, cv_files.labels))
                }
            }
            CrossValidation::None | CrossValidation::Auto => None,
        };

        let mut report = self.train_from_features(
            &files.feature_list,
            &files.labels,
            model,
            matches!(opts.cross_validation, CrossValidation::Auto),
        )?;

        if let Some((feature_list, labels)) = held_out {
            report.held_out = TrainingSet::read(&feature_list, &labels)?.len();
            info!(instances = report.held_out, "evaluating on cross-validation files");
            self.classifier.decode(&feature_list, &labels, model, None)?;
        }

        report.problems = problems;
        Ok(report)
    }

    /// Train on features that were already extracted.
    ///
    /// The instances are shuffled first. With `auto_cross_validation`, 20% of them are held
    /// out and decoded with the freshly trained model.
    pub fn train_from_features(
        &self,
        feature_list: &Path,
        labels: &Path,
        model: &Path,
        auto_cross_validation: bool,
    ) -> Result<TrainReport> {
        let mut set = TrainingSet::read(feature_list, labels)?;
        set.shuffle(&mut rand::thread_rng());

        let (train_set, held_out) = if auto_cross_validation && set.len() >= 2 {
            let (train, test) = set.split(AUTO_TRAINING_SHARE);
            debug!(train = train.len(), test = test.len(), "automatic cross-validation split");
            (train, Some(test))
        } else {
            if auto_cross_validation {
                warn!(instances = set.len(), "too few instances to hold any out for cross-validation");
            }
            (set, None)
        };

        let train_list = with_suffix(feature_list, ".rs");
        let train_labels = with_suffix(labels, ".rs");
        train_set.write(&train_list, &train_labels)?;

        info!(instances = train_set.len(), model = %model.display(), "training");
        self.classifier.train(&train_list, &train_labels, model)?;
        require_output(model, "trainer", "model")?;

        let mut report = TrainReport {
            trained_on: train_set.len(),
            ..TrainReport::default()
        };

        if let Some(test) = held_out {
            let test_list = with_suffix(feature_list, ".rs.test");
            let test_labels = with_suffix(labels, ".rs.test");
            test.write(&test_list, &test_labels)?;

            info!(instances = test.len(), "evaluating on held-out instances");
            self.classifier.decode(&test_list, &test_labels, model, None)?;
            report.held_out = test.len();
        }

        Ok(report)
    }

    /// Predict VOTs for every pair and append them to each TextGrid as a new tier.
    ///
    /// The TextGrid files are rewritten in place. Each predicted VOT is also passed to
    /// `encoder` when given; the caller owns the encoder and closes it.
    pub fn decode(
        &self,
        pairs: &[SourcePair],
        defs: &TierDefinitions,
        model: &Path,
        opts: &DecodeOpts,
        mut encoder: Option<&mut dyn VotEncoder>,
    ) -> Result<DecodeReport> {
        defs.validate()?;
        if !model.is_file() {
            return Err(Error::Config(format!(
                "model file {} not found",
                model.display()
            )));
        }

        let mut report = DecodeReport::default();
        for pair in pairs {
            match self.decode_file(pair, defs, model, opts, &mut report.problems) {
                Ok(done) => {
                    report.files_decoded += 1;
                    if done.outcome.is_appended() {
                        report.tiers_written += 1;
                    }
                    report.predictions += done.vots.len();

                    if let Some(encoder) = encoder.as_deref_mut() {
                        for vot in &done.vots {
                            encoder.write_vot(&VotRecord::new(&pair.audio, vot))?;
                        }
                    }
                }
                Err(err @ (Error::Process { .. } | Error::Config(_))) => return Err(err),
                Err(err) => report.problems.skip(&pair.textgrid, err),
            }
        }

        info!(
            files = report.files_decoded,
            tiers = report.tiers_written,
            predictions = report.predictions,
            "decoding finished"
        );
        Ok(report)
    }

    /// Like [`AutoVot::decode`], streaming one record per predicted VOT to `w`.
    pub fn decode_to_writer<W: Write>(
        &self,
        pairs: &[SourcePair],
        defs: &TierDefinitions,
        model: &Path,
        opts: &DecodeOpts,
        output_type: OutputType,
        w: W,
    ) -> Result<DecodeReport> {
        let writer = BufWriter::new(w);

        // Select an encoder based on the requested output type.
        match output_type {
            OutputType::Csv => {
                let mut encoder = CsvEncoder::new(writer);
                let sink: &mut dyn VotEncoder = &mut encoder;
                let run_res = self.decode(pairs, defs, model, opts, Some(sink));
                merge_run_and_close(run_res, encoder.close())
            }
            OutputType::Json => {
                let mut encoder = JsonArrayEncoder::new(writer);
                let sink: &mut dyn VotEncoder = &mut encoder;
                let run_res = self.decode(pairs, defs, model, opts, Some(sink));
                merge_run_and_close(run_res, encoder.close())
            }
        }
    }

    fn decode_file(
        &self,
        pair: &SourcePair,
        defs: &TierDefinitions,
        model: &Path,
        opts: &DecodeOpts,
        problems: &mut ProblemList,
    ) -> Result<Reintegrated> {
        let derivation = derive_file(pair, defs)?;
        for &i in &derivation.inconsistent {
            problems.inconsistent(&pair.textgrid, derivation.instances[i].clone());
        }

        let scratch = Scratch::new(None, opts.keep_work_dir)?;
        let stem = pair
            .audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_owned());
        let files = FrontEndFiles::in_dir(scratch.path(), &stem);
        let predictions = scratch.path().join(format!("{stem}.preds"));

        debug!(
            audio = %pair.audio.display(),
            instances = derivation.instances.len(),
            work_dir = %scratch.path().display(),
            "decoding file"
        );

        files.write(&derivation.instances)?;
        self.classifier.extract_features(&files)?;
        require_output(&files.labels, "front end", "labels file")?;

        self.classifier
            .decode(&files.feature_list, &files.labels, model, Some(&predictions))?;
        require_output(&predictions, "decoder", "predictions")?;

        // The front end saw the rounded times of the instance file; predictions are
        // relative to those, so reintegrate from the file rather than from memory.
        reintegrate_files(&pair.textgrid, &files.input, &predictions, opts)
    }
}

/// Append the predictions of an already decoded instance file to its TextGrid.
///
/// The TextGrid is rewritten in place unless the prediction tier is skipped because a
/// similarly named tier already exists.
pub fn reintegrate_files(
    textgrid_path: &Path,
    instance_file: &Path,
    predictions_file: &Path,
    opts: &DecodeOpts,
) -> Result<Reintegrated> {
    let instances = read_instance_file(instance_file, textgrid_path)?;
    let predictions = read_predictions(predictions_file)?;
    let mut grid = load_textgrid(textgrid_path)?;

    let vots = predicted_vots(&instances, &predictions)?;
    let outcome = reintegrate(
        &mut grid,
        &instances,
        &predictions,
        &opts.tier_name,
        opts.allow_duplicate_tier,
    )?;

    if outcome.is_appended() {
        textgrid::write(&grid, textgrid_path)?;
    } else {
        warn!(
            textgrid = %textgrid_path.display(),
            tier = %opts.tier_name,
            "prediction tier not written (allow duplicate tiers to add it anyway)"
        );
    }

    Ok(Reintegrated { outcome, vots })
}

fn merge_run_and_close<T>(run_res: Result<T>, close_res: Result<()>) -> Result<T> {
    match (run_res, close_res) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "failed to close prediction output");
            Err(err)
        }
    }
}

fn require_output(path: &Path, program: &str, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::msg(format!(
            "{program} produced no {what} at {}",
            path.display()
        )))
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Working directory for intermediate files.
///
/// A caller-supplied directory is used as is and never removed. Otherwise a temporary
/// directory is created and removed on drop, unless it is kept for inspection.
enum Scratch {
    Temp(TempDir),
    Kept(PathBuf),
}

impl Scratch {
    fn new(dir: Option<&Path>, keep: bool) -> Result<Self> {
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir)?;
            return Ok(Scratch::Kept(dir.to_path_buf()));
        }

        let temp = tempfile::Builder::new().prefix("autovot-").tempdir()?;
        if keep {
            let path = temp.keep();
            info!(path = %path.display(), "keeping working directory");
            return Ok(Scratch::Kept(path));
        }
        Ok(Scratch::Temp(temp))
    }

    fn path(&self) -> &Path {
        match self {
            Scratch::Temp(temp) => temp.path(),
            Scratch::Kept(path) => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_appended_to_full_file_name() {
        assert_eq!(
            with_suffix(Path::new("/w/training.labels"), ".rs.test"),
            PathBuf::from("/w/training.labels.rs.test")
        );
    }

    #[test]
    fn close_error_surfaces_only_when_run_succeeded() {
        let ok: Result<u8> = merge_run_and_close(Ok(1), Err(Error::msg("close")));
        assert_eq!(ok.unwrap_err().to_string(), "close");

        let both: Result<u8> = merge_run_and_close(Err(Error::msg("run")), Err(Error::msg("close")));
        assert_eq!(both.unwrap_err().to_string(), "run");
    }

    #[test]
    fn caller_work_dir_is_created_and_kept() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("work");
        {
            let scratch = Scratch::new(Some(&dir), false)?;
            assert_eq!(scratch.path(), dir);
        }
        assert!(dir.is_dir());
        Ok(())
    }
}
