//! The acoustic side of AutoVOT: feature extraction, training and decoding.
//!
//! These are implemented by external programs; this crate only prepares their input files
//! and consumes their output files. [`Classifier`] is the seam that lets the pipelines in
//! [`crate::autovot`] run against something else (tests use an in-process fake).

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::instance::FrontEndFiles;
use crate::{Error, Result};

/// Feature extraction, training and decoding over the front-end file formats.
///
/// Implementations report success by producing their output files; callers check for
/// those files rather than trusting a status.
pub trait Classifier {
    /// Read `files.input` and `files.feature_list`; write one feature file per instance and
    /// the labels file `files.labels`.
    fn extract_features(&self, files: &FrontEndFiles) -> Result<()>;

    /// Train a model from a feature list and its labels file.
    fn train(&self, feature_list: &Path, labels: &Path, model: &Path) -> Result<()>;

    /// Decode every instance of a feature list.
    ///
    /// With `predictions`, one `<confidence> <onset_ms> <offset_ms>` line per instance is
    /// written there. Without, the decoder only reports its loss against `labels`
    /// (cross-validation).
    fn decode(
        &self,
        feature_list: &Path,
        labels: &Path,
        model: &Path,
        predictions: Option<&Path>,
    ) -> Result<()>;
}

/// Names and parameters of the external programs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTools {
    pub front_end: PathBuf,
    pub trainer: PathBuf,
    pub decoder: PathBuf,

    /// Passed through as `-verbose` (DEBUG, INFO, WARNING or ERROR).
    pub verbosity: String,

    /// Decoder search limits (milliseconds).
    pub min_vot_length: u32,
    pub max_vot_length: u32,
    pub max_onset: u32,

    /// Trainer settings.
    pub epochs: u32,
    pub loss_eps: u32,
    pub train_min_vot_length: u32,
    pub regularization: u32,
}

impl Default for ExternalTools {
    fn default() -> Self {
        Self {
            front_end: PathBuf::from("VotFrontEnd2"),
            trainer: PathBuf::from("VotTrain"),
            decoder: PathBuf::from("VotDecode"),
            verbosity: "INFO".to_owned(),
            min_vot_length: 15,
            max_vot_length: 250,
            max_onset: 200,
            epochs: 2,
            loss_eps: 4,
            train_min_vot_length: 5,
            regularization: 50,
        }
    }
}

/// A [`Classifier`] backed by the AutoVOT command-line programs.
#[derive(Debug, Clone, Default)]
pub struct ExternalClassifier {
    tools: ExternalTools,
}

impl ExternalClassifier {
    pub fn new(tools: ExternalTools) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ExternalTools {
        &self.tools
    }
}

impl Classifier for ExternalClassifier {
    fn extract_features(&self, files: &FrontEndFiles) -> Result<()> {
        let t = &self.tools;
        let args: Vec<OsString> = vec![
            "-verbose".into(),
            t.verbosity.clone().into(),
            files.input.clone().into(),
            files.feature_list.clone().into(),
            files.labels.clone().into(),
        ];
        run(&t.front_end, args)
    }

    fn train(&self, feature_list: &Path, labels: &Path, model: &Path) -> Result<()> {
        let t = &self.tools;
        let args: Vec<OsString> = vec![
            "-verbose".into(),
            t.verbosity.clone().into(),
            "-pos_only".into(),
            "-vot_loss".into(),
            "-epochs".into(),
            t.epochs.to_string().into(),
            "-loss_eps".into(),
            t.loss_eps.to_string().into(),
            "-min_vot_length".into(),
            t.train_min_vot_length.to_string().into(),
            "-C".into(),
            t.regularization.to_string().into(),
            feature_list.into(),
            labels.into(),
            model.into(),
        ];
        run(&t.trainer, args)
    }

    fn decode(
        &self,
        feature_list: &Path,
        labels: &Path,
        model: &Path,
        predictions: Option<&Path>,
    ) -> Result<()> {
        let t = &self.tools;
        let mut args: Vec<OsString> = vec!["-verbose".into(), t.verbosity.clone().into()];

        match predictions {
            Some(out) => {
                let limits: [OsString; 8] = [
                    "-max_onset".into(),
                    t.max_onset.to_string().into(),
                    "-min_vot_length".into(),
                    t.min_vot_length.to_string().into(),
                    "-max_vot_length".into(),
                    t.max_vot_length.to_string().into(),
                    "-output_predictions".into(),
                    out.into(),
                ];
                args.extend(limits);
            }
            None => args.push("-pos_only".into()),
        }

        let files: [OsString; 3] = [feature_list.into(), labels.into(), model.into()];
        args.extend(files);
        run(&t.decoder, args)
    }
}

/// Run a program to completion.
///
/// A program that cannot be started, exits with 127 (shell "command not found"), or is
/// killed by a signal aborts the run. Any other non-zero exit is only logged; the caller
/// decides from the files left behind.
pub(crate) fn run<I>(program: &Path, args: I) -> Result<()>
where
    I: IntoIterator<Item = OsString>,
{
    let args: Vec<OsString> = args.into_iter().collect();
    debug!(command = %command_line(program, &args), "running");

    let status = Command::new(program).args(&args).status().map_err(|err| {
        let message = match err.kind() {
            io::ErrorKind::NotFound => "command not found (is it on PATH?)".to_owned(),
            _ => err.to_string(),
        };
        Error::Process {
            program: program.display().to_string(),
            message,
        }
    })?;

    match status.code() {
        Some(0) => Ok(()),
        Some(127) => Err(Error::Process {
            program: program.display().to_string(),
            message: "command not found (exit code 127)".to_owned(),
        }),
        Some(code) => {
            warn!(program = %program.display(), code, "program exited with non-zero status");
            Ok(())
        }
        None => Err(Error::Process {
            program: program.display().to_string(),
            message: "terminated by signal".to_owned(),
        }),
    }
}

fn command_line(program: &Path, args: &[OsString]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        let arg = arg.to_string_lossy();
        line.push(' ');
        if arg.contains(char::is_whitespace) {
            line.push('"');
            line.push_str(&arg);
            line.push('"');
        } else {
            line.push_str(&arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_fatal() {
        let err = run(Path::new("autovot-no-such-program"), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Process { .. }));
        assert!(err.to_string().contains("command not found"));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_not_fatal_but_127_is() {
        assert!(run(Path::new("false"), Vec::new()).is_ok());
        let args: Vec<OsString> = vec!["-c".into(), "exit 127".into()];
        let err = run(Path::new("sh"), args).unwrap_err();
        assert!(err.to_string().contains("127"));
    }

    #[test]
    fn command_line_quotes_arguments_with_spaces() {
        let line = command_line(
            Path::new("VotFrontEnd2"),
            &["-verbose".into(), "/tmp/my data/x.input".into()],
        );
        assert_eq!(line, "VotFrontEnd2 -verbose \"/tmp/my data/x.input\"");
    }

    #[test]
    fn defaults_match_the_stock_programs() {
        let tools = ExternalTools::default();
        assert_eq!(tools.front_end, PathBuf::from("VotFrontEnd2"));
        assert_eq!((tools.min_vot_length, tools.max_vot_length, tools.max_onset), (15, 250, 200));
    }
}
