//! Candidate instances and the files that hand them to the acoustic front end.
//!
//! The front end reads an *instance file* (one quoted audio path plus four times per line)
//! and a *feature list* naming where each instance's features should be written.
//! Both files are positional: line `i` of each describes instance `i`.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// One candidate occurrence submitted for feature extraction.
///
/// Invariant: `window_min <= event_min <= event_max <= window_max` and `window_min >= 0`
/// (the derivation engine reports instances that violate it instead of dropping them).
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Audio file the times refer to.
    pub audio: PathBuf,

    /// TextGrid the instance was derived from; names the feature file.
    pub textgrid: PathBuf,

    pub window_min: f64,
    pub window_max: f64,
    pub event_min: f64,
    pub event_max: f64,
}

impl Instance {
    pub fn is_consistent(&self) -> bool {
        self.window_min <= self.event_min
            && self.event_min <= self.event_max
            && self.event_max <= self.window_max
    }

    /// `<dir>/<textgrid-stem>_<window_min:.3f>.txt`
    pub fn feature_file(&self, features_dir: &Path) -> PathBuf {
        let stem = self
            .textgrid
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        features_dir.join(format!("{stem}_{:.3}.txt", self.window_min))
    }
}

/// The instance-file line: `"<audio>" <window_min> <window_max> <event_min> <event_max>`.
impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" {:.3} {:.3} {:.3} {:.3}",
            self.audio.display(),
            self.window_min,
            self.window_max,
            self.event_min,
            self.event_max
        )
    }
}

/// Paths of the files exchanged with the front end.
#[derive(Debug, Clone)]
pub struct FrontEndFiles {
    /// Instance file (input to the front end).
    pub input: PathBuf,

    /// One feature-file path per instance (input to the front end).
    pub feature_list: PathBuf,

    /// Labels file (written by the front end).
    pub labels: PathBuf,

    /// Directory the per-instance feature files go into.
    pub features_dir: PathBuf,
}

impl FrontEndFiles {
    /// Conventional layout inside `dir`, with every file named after `basename`.
    pub fn in_dir(dir: &Path, basename: &str) -> Self {
        Self {
            input: dir.join(format!("{basename}.input")),
            feature_list: dir.join(format!("{basename}.feature_filelist")),
            labels: dir.join(format!("{basename}.labels")),
            features_dir: dir.join("features"),
        }
    }

    /// Write the instance file and the feature list for `instances`.
    pub fn write(&self, instances: &[Instance]) -> Result<()> {
        fs::create_dir_all(&self.features_dir)?;
        write_instance_file(&self.input, instances)?;
        write_feature_list(&self.feature_list, &self.features_dir, instances)?;
        Ok(())
    }
}

pub fn write_instance_file(path: &Path, instances: &[Instance]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for instance in instances {
        writeln!(w, "{instance}")?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_feature_list(path: &Path, features_dir: &Path, instances: &[Instance]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for instance in instances {
        writeln!(w, "{}", instance.feature_file(features_dir).display())?;
    }
    w.flush()?;
    Ok(())
}

/// Read an instance file back.
///
/// The TextGrid is not recorded in the file, so `textgrid` is supplied by the caller.
pub fn read_instance_file(path: &Path, textgrid: &Path) -> Result<Vec<Instance>> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            parse_instance_line(line, textgrid).map_err(|message| {
                Error::format(format!("{}:{}: {message}", path.display(), idx + 1))
            })
        })
        .collect()
}

fn parse_instance_line(line: &str, textgrid: &Path) -> std::result::Result<Instance, String> {
    let line = line.trim();
    let (audio, rest) = match line.strip_prefix('"') {
        Some(quoted) => quoted
            .split_once('"')
            .ok_or_else(|| "unterminated quoted audio path".to_owned())?,
        // Older front ends wrote bare paths without spaces.
        None => line
            .split_once(char::is_whitespace)
            .ok_or_else(|| "missing window and event times".to_owned())?,
    };

    let times = rest
        .split_whitespace()
        .take_while(|token| !token.starts_with('['))
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| format!("'{token}' is not a time"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let [window_min, window_max, event_min, event_max] = times[..] else {
        return Err(format!("expected 4 times, found {}", times.len()));
    };

    Ok(Instance {
        audio: PathBuf::from(audio),
        textgrid: textgrid.to_path_buf(),
        window_min,
        window_max,
        event_min,
        event_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(audio: &str) -> Instance {
        Instance {
            audio: PathBuf::from(audio),
            textgrid: PathBuf::from("/data/speaker 1.TextGrid"),
            window_min: 0.95,
            window_max: 1.85,
            event_min: 1.0,
            event_max: 1.05,
        }
    }

    #[test]
    fn formats_instance_line_with_quoted_path() {
        assert_eq!(
            instance("/data/speaker 1.wav").to_string(),
            "\"/data/speaker 1.wav\" 0.950 1.850 1.000 1.050"
        );
    }

    #[test]
    fn feature_file_uses_textgrid_stem_and_window_start() {
        let path = instance("a.wav").feature_file(Path::new("/tmp/features"));
        assert_eq!(path, PathBuf::from("/tmp/features/speaker 1_0.950.txt"));
    }

    #[test]
    fn instance_file_reads_back() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x.input");
        let original = vec![instance("/data/speaker 1.wav"), instance("/data/b.wav")];
        write_instance_file(&path, &original)?;

        let back = read_instance_file(&path, Path::new("/data/speaker 1.TextGrid"))?;
        assert_eq!(back, original);
        Ok(())
    }

    #[test]
    fn tolerates_unit_suffix_and_rejects_short_lines() {
        let tg = Path::new("a.TextGrid");
        let ok = parse_instance_line("\"a.wav\" 0.1 0.9 0.2 0.3 [seconds]", tg).unwrap();
        assert_eq!(ok.window_max, 0.9);

        let err = parse_instance_line("\"a.wav\" 0.1 0.9", tg).unwrap_err();
        assert!(err.contains("expected 4 times"));
    }
}
