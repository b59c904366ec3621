use std::error::Error as StdError;

use thiserror::Error;

/// AutoVOT's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// AutoVOT's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
///
/// Batch pipelines catch most of these per file and record them as problems; see
/// [`crate::problems::ProblemList`].
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unsupported annotation file.
    #[error("format error: {0}")]
    Format(String),

    #[error("tier index {index} out of range (document has {len} tiers)")]
    Index { index: usize, len: usize },

    /// An interval was appended out of order.
    #[error("interval starting at {min_time} precedes the end of the previous interval ({previous_max})")]
    Ordering { min_time: f64, previous_max: f64 },

    #[error("invalid interval [{min_time}, {max_time}]: start must be before end")]
    InvalidInterval { min_time: f64, max_time: f64 },

    /// A tier exists but is not an interval tier.
    #[error("tier '{name}' is a {kind}, only interval tiers are supported here")]
    UnsupportedTier { name: String, kind: &'static str },

    #[error("tier '{0}' not found")]
    TierNotFound(String),

    /// The mark filter matched nothing in the tier.
    #[error("mark '{mark}' not found in tier '{tier}'")]
    MarkNotFound { mark: String, tier: String },

    /// Reconstructed predictions are not strictly increasing in time.
    #[error(
        "predicted interval {index} starts at {min_time:.3}s, before the previous prediction ends ({previous_max:.3}s)"
    )]
    Overlap {
        index: usize,
        min_time: f64,
        previous_max: f64,
    },

    #[error(
        "predicted interval {index} [{min_time:.3}, {max_time:.3}] falls outside the document range [{range_min}, {range_max}]"
    )]
    PredictionOutOfRange {
        index: usize,
        min_time: f64,
        max_time: f64,
        range_min: f64,
        range_max: f64,
    },

    /// Sample rate / width / channel mismatch.
    #[error("audio format error: {0}")]
    AudioFormat(String),

    /// Paired inputs of unequal length.
    #[error("{left} has {left_len} entries but {right} has {right_len}")]
    LengthMismatch {
        left: String,
        left_len: usize,
        right: String,
        right_len: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// An external tool could not be run at all.
    #[error("failed to run '{program}': {message}")]
    Process { program: String, message: String },

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub(crate) fn length_mismatch(
        left: impl Into<String>,
        left_len: usize,
        right: impl Into<String>,
        right_len: usize,
    ) -> Self {
        Self::LengthMismatch {
            left: left.into(),
            left_len,
            right: right.into(),
            right_len,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Self::Other(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mismatch_names_both_sides() {
        let err = Error::length_mismatch("instances", 3, "predictions", 2);
        let s = err.to_string();
        assert!(s.contains("instances has 3"));
        assert!(s.contains("predictions has 2"));
    }

    #[test]
    fn anyhow_errors_keep_their_context_chain() {
        let err: Error = anyhow::anyhow!("inner").context("outer").into();
        assert_eq!(err.to_string(), "outer: inner");
    }
}
