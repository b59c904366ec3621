use std::path::Path;

use serde::Serialize;

use crate::Result;
use crate::reintegrate::PredictedVot;

/// One predicted VOT as reported to the user.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct VotRecord {
    /// Audio file the prediction belongs to.
    pub wav_file: String,

    /// Start of the predicted interval (seconds).
    pub time: f64,

    /// Signed VOT (seconds); negative for pre-voiced stops.
    pub vot: f64,

    pub confidence: f64,
}

impl VotRecord {
    pub fn new(wav_file: &Path, vot: &PredictedVot) -> Self {
        Self {
            wav_file: wav_file.display().to_string(),
            time: vot.min_time,
            vot: vot.vot(),
            confidence: vot.confidence,
        }
    }
}

/// A sink for predicted VOTs, written as they are produced.
pub trait VotEncoder {
    fn write_vot(&mut self, record: &VotRecord) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
