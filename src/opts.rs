use std::fmt;
use std::path::PathBuf;

use crate::inputs::SourcePair;
use crate::{Error, Result};

/// Name of the tier decoding appends to each TextGrid unless told otherwise.
pub const DEFAULT_PREDICTION_TIER: &str = "AutoVOT";

/// Default search window, relative to the labeled VOT interval (seconds).
pub const DEFAULT_WINDOW_MIN_OFFSET: f64 = -0.05;
pub const DEFAULT_WINDOW_MAX_OFFSET: f64 = 0.8;

/// Which intervals of a tier are selected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MarkFilter {
    /// `"*"`: any mark containing a non-whitespace character.
    #[default]
    Any,

    /// Exact, case-sensitive string equality.
    Exact(String),
}

impl MarkFilter {
    pub fn matches(&self, mark: &str) -> bool {
        match self {
            MarkFilter::Any => !mark.trim().is_empty(),
            MarkFilter::Exact(wanted) => mark == wanted,
        }
    }
}

impl From<&str> for MarkFilter {
    fn from(value: &str) -> Self {
        if value == "*" {
            MarkFilter::Any
        } else {
            MarkFilter::Exact(value.to_owned())
        }
    }
}

impl fmt::Display for MarkFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkFilter::Any => f.write_str("*"),
            MarkFilter::Exact(mark) => f.write_str(mark),
        }
    }
}

/// Which tiers and marks describe the instances of a TextGrid.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI maps user input (window offsets in milliseconds) into this type, so the
/// library works in seconds throughout.
#[derive(Debug, Clone, PartialEq)]
pub struct TierDefinitions {
    /// Tier holding manually labeled VOT intervals.
    pub vot_tier: Option<String>,
    pub vot_mark: MarkFilter,

    /// Tier holding explicit search windows.
    ///
    /// Its matching intervals are instances as they stand. Alongside `vot_tier`, both
    /// contribute and the VOT windows are not corrected for neighbors.
    pub window_tier: Option<String>,
    pub window_mark: MarkFilter,

    /// Window start relative to the VOT interval's start (seconds, usually negative).
    pub window_min_offset: f64,

    /// Window end relative to the VOT interval's end (seconds, usually positive).
    pub window_max_offset: f64,

    /// Keep only the first N instances of each file; 0 keeps everything.
    pub max_instances_per_file: usize,
}

impl Default for TierDefinitions {
    fn default() -> Self {
        Self {
            vot_tier: None,
            vot_mark: MarkFilter::Any,
            window_tier: None,
            window_mark: MarkFilter::Any,
            window_min_offset: DEFAULT_WINDOW_MIN_OFFSET,
            window_max_offset: DEFAULT_WINDOW_MAX_OFFSET,
            max_instances_per_file: 0,
        }
    }
}

impl TierDefinitions {
    /// Definitions driven by a labeled VOT tier.
    pub fn for_vot_tier(name: impl Into<String>) -> Self {
        Self {
            vot_tier: Some(name.into()),
            ..Self::default()
        }
    }

    /// Definitions driven by a tier of explicit windows.
    pub fn for_window_tier(name: impl Into<String>) -> Self {
        Self {
            window_tier: Some(name.into()),
            ..Self::default()
        }
    }

    /// At least one tier must be named, and offsets must be finite.
    pub fn validate(&self) -> Result<()> {
        let named = |tier: &Option<String>| tier.as_deref().is_some_and(|t| !t.is_empty());
        if !named(&self.vot_tier) && !named(&self.window_tier) {
            return Err(Error::Config(
                "either a VOT tier or a window tier must be given".to_owned(),
            ));
        }
        if !self.window_min_offset.is_finite() || !self.window_max_offset.is_finite() {
            return Err(Error::Config("window offsets must be finite".to_owned()));
        }
        Ok(())
    }

    /// Whether explicit windows are used instead of offsets around labeled VOTs.
    pub fn uses_window_tier(&self) -> bool {
        self.window_tier.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Options for writing predictions back into TextGrids.
#[derive(Debug, Clone)]
pub struct DecodeOpts {
    /// Name of the tier holding predictions.
    pub tier_name: String,

    /// Append the prediction tier even if a tier with a similar name already exists.
    pub allow_duplicate_tier: bool,

    /// Keep each file's scratch directory (instance file, features, predictions) for inspection.
    pub keep_work_dir: bool,
}

impl Default for DecodeOpts {
    fn default() -> Self {
        Self {
            tier_name: DEFAULT_PREDICTION_TIER.to_owned(),
            allow_duplicate_tier: false,
            keep_work_dir: false,
        }
    }
}

/// How training holds out data for a cross-validation decode pass.
#[derive(Debug, Clone, Default)]
pub enum CrossValidation {
    /// Train on everything, no evaluation pass.
    #[default]
    None,

    /// Hold out a random share of the training instances.
    Auto,

    /// Evaluate on a separate set of files.
    Files(Vec<SourcePair>),
}

/// Options for training.
#[derive(Debug, Clone, Default)]
pub struct TrainOpts {
    pub cross_validation: CrossValidation,

    /// Where to keep intermediate files; a temporary directory is used when `None`.
    pub work_dir: Option<PathBuf>,
}
