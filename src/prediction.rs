use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// One decoder output line: `<confidence> <onset_ms> <offset_ms>`.
///
/// Onset and offset are milliseconds relative to the instance's `window_min`. An offset
/// before the onset denotes a negative (pre-voiced) VOT.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub confidence: f64,

    /// The confidence exactly as the decoder wrote it; this becomes the interval mark.
    pub confidence_text: String,

    pub onset_ms: f64,
    pub offset_ms: f64,
}

impl Prediction {
    pub fn new(confidence: f64, onset_ms: f64, offset_ms: f64) -> Self {
        Self {
            confidence,
            confidence_text: confidence.to_string(),
            onset_ms,
            offset_ms,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.offset_ms <= self.onset_ms
    }

    /// Signed VOT in milliseconds.
    pub fn vot_ms(&self) -> f64 {
        self.offset_ms - self.onset_ms
    }
}

/// Parse a single prediction line.
pub fn parse_line(line: &str) -> Result<Prediction> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [confidence, onset, offset] = fields[..] else {
        return Err(Error::format(format!(
            "expected 3 fields (confidence onset offset), found {}: '{}'",
            fields.len(),
            line.trim()
        )));
    };

    let number = |field: &str| {
        field
            .parse::<f64>()
            .map_err(|_| Error::format(format!("'{field}' is not a number")))
    };

    Ok(Prediction {
        confidence: number(confidence)?,
        confidence_text: confidence.to_owned(),
        onset_ms: number(onset)?,
        offset_ms: number(offset)?,
    })
}

/// Read a predictions file, one prediction per non-blank line, in instance order.
pub fn read_predictions(path: impl AsRef<Path>) -> Result<Vec<Prediction>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            parse_line(line).map_err(|err| match err {
                Error::Format(message) => {
                    Error::format(format!("{}:{}: {message}", path.display(), idx + 1))
                }
                other => other,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_and_negative_lines() -> anyhow::Result<()> {
        let p = parse_line("0.9 30 80")?;
        assert_eq!(p, Prediction::new(0.9, 30.0, 80.0));
        assert!(!p.is_negative());
        assert_eq!(p.vot_ms(), 50.0);

        let n = parse_line("  0.41\t80 30 ")?;
        assert!(n.is_negative());
        Ok(())
    }

    #[test]
    fn rejects_wrong_field_count_with_location() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("preds");
        std::fs::write(&path, "0.9 30 80\n\n0.5 12\n")?;

        let err = read_predictions(&path).unwrap_err();
        let s = err.to_string();
        assert!(matches!(err, Error::Format(_)));
        assert!(s.contains(":3:"), "{s}");
        assert!(s.contains("found 2"), "{s}");
        Ok(())
    }

    #[test]
    fn keeps_confidence_as_written() -> anyhow::Result<()> {
        let p = parse_line("0.90 30 80")?;
        assert_eq!(p.confidence, 0.9);
        assert_eq!(p.confidence_text, "0.90");

        let e = parse_line("-1.25e-3 30 80")?;
        assert_eq!(e.confidence, -0.00125);
        assert_eq!(e.confidence_text, "-1.25e-3");
        Ok(())
    }

    #[test]
    fn rejects_non_numeric_fields() {
        assert!(matches!(parse_line("high 30 80"), Err(Error::Format(_))));
    }
}
