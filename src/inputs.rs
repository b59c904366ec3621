//! Resolving command-line inputs into (audio, TextGrid) pairs.
//!
//! Every command accepts either a single WAV + TextGrid, or two list files with one path
//! per line. Both lists must have the same number of lines; a mismatch aborts the run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::textgrid::is_textgrid_file;
use crate::wav::is_valid_wav;
use crate::{Error, Result};

/// One audio file and its annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePair {
    pub audio: PathBuf,
    pub textgrid: PathBuf,
}

impl SourcePair {
    pub fn new(audio: impl Into<PathBuf>, textgrid: impl Into<PathBuf>) -> Self {
        Self {
            audio: audio.into(),
            textgrid: textgrid.into(),
        }
    }
}

/// Read a list file: one path per line, surrounding whitespace trimmed.
///
/// Blank lines are kept as empty entries so line counts stay comparable between lists.
pub fn read_list_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|err| {
        Error::Config(format!("unable to read list file {}: {err}", path.display()))
    })?;
    Ok(text.lines().map(|line| line.trim().to_owned()).collect())
}

/// Read two list files and zip them, requiring equal line counts.
///
/// Entries where either side is blank are dropped (typically a trailing empty line).
pub fn read_paired_lists(
    left: impl AsRef<Path>,
    right: impl AsRef<Path>,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let (left, right) = (left.as_ref(), right.as_ref());
    let left_lines = read_list_file(left)?;
    let right_lines = read_list_file(right)?;

    if left_lines.len() != right_lines.len() {
        return Err(Error::length_mismatch(
            left.display().to_string(),
            left_lines.len(),
            right.display().to_string(),
            right_lines.len(),
        ));
    }

    Ok(left_lines
        .into_iter()
        .zip(right_lines)
        .filter(|(l, r)| !l.is_empty() && !r.is_empty())
        .map(|(l, r)| (PathBuf::from(l), PathBuf::from(r)))
        .collect())
}

/// Turn the `audio` / `textgrid` arguments of a command into pairs.
///
/// - a valid WAV and a TextGrid: a single pair
/// - exactly one of them valid: configuration error (the other one is probably mistyped)
/// - otherwise: both are list files
pub fn resolve_pairs(
    audio: impl AsRef<Path>,
    textgrid: impl AsRef<Path>,
) -> Result<Vec<SourcePair>> {
    let (audio, textgrid) = (audio.as_ref(), textgrid.as_ref());

    match (is_valid_wav(audio), is_textgrid_file(textgrid)) {
        (true, true) => Ok(vec![SourcePair::new(audio, textgrid)]),
        (true, false) => Err(Error::Config(format!(
            "{} is a valid WAV file but {} is not a valid TextGrid",
            audio.display(),
            textgrid.display()
        ))),
        (false, true) => Err(Error::Config(format!(
            "{} is not a valid WAV file but {} is a TextGrid",
            audio.display(),
            textgrid.display()
        ))),
        (false, false) => Ok(read_paired_lists(audio, textgrid)?
            .into_iter()
            .map(|(a, t)| SourcePair::new(a, t))
            .collect()),
    }
}

/// Like [`resolve_pairs`] for two annotation inputs (single TextGrids or list files).
pub fn resolve_textgrid_pairs(
    left: impl AsRef<Path>,
    right: impl AsRef<Path>,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let (left, right) = (left.as_ref(), right.as_ref());
    if is_textgrid_file(left) && is_textgrid_file(right) {
        return Ok(vec![(left.to_path_buf(), right.to_path_buf())]);
    }
    read_paired_lists(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_list_lengths_abort() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let wavs = dir.path().join("wavs.txt");
        let grids = dir.path().join("grids.txt");
        fs::write(&wavs, "a.wav\nb.wav\n")?;
        fs::write(&grids, "a.TextGrid\n")?;

        let err = resolve_pairs(&wavs, &grids).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { left_len: 2, right_len: 1, .. }));
        Ok(())
    }

    #[test]
    fn blank_entries_are_skipped_after_count_check() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let wavs = dir.path().join("wavs.txt");
        let grids = dir.path().join("grids.txt");
        fs::write(&wavs, "a.wav\n\nc.wav\n")?;
        fs::write(&grids, "a.TextGrid\nb.TextGrid\nc.TextGrid\n")?;

        let pairs = resolve_pairs(&wavs, &grids)?;
        assert_eq!(
            pairs,
            vec![
                SourcePair::new("a.wav", "a.TextGrid"),
                SourcePair::new("c.wav", "c.TextGrid"),
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_list_file_is_a_config_error() {
        let err = resolve_pairs("/nope/wavs.txt", "/nope/grids.txt").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
