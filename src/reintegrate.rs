//! Writing decoder predictions back into a TextGrid as a new tier.
//!
//! Predictions are local to their instance's window (milliseconds after `window_min`); this
//! module maps them to absolute seconds and lays them out as a tier that covers the whole
//! document: `"" | vot₀ | "" | vot₁ | … | vot_n | ""`, i.e. `2N+1` intervals.
//!
//! Nothing touches the document until every prediction has been placed successfully.

use tracing::{debug, warn};

use crate::instance::Instance;
use crate::prediction::Prediction;
use crate::textgrid::{IntervalTier, TextGrid};
use crate::{Error, Result};

/// Mark prefix of a negative (pre-voiced) VOT.
pub const NEGATIVE_PREFIX: &str = "neg ";

/// A prediction placed on the document's time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedVot {
    pub min_time: f64,
    pub max_time: f64,
    pub confidence: f64,

    /// Decoder's own rendering of `confidence`.
    pub confidence_text: String,

    pub negative: bool,
}

impl PredictedVot {
    /// Interval mark: the confidence as the decoder wrote it, prefixed with `"neg "` for
    /// negative VOTs.
    pub fn mark(&self) -> String {
        if self.negative {
            format!("{NEGATIVE_PREFIX}{}", self.confidence_text)
        } else {
            self.confidence_text.clone()
        }
    }

    /// Signed duration in seconds.
    pub fn vot(&self) -> f64 {
        let duration = self.max_time - self.min_time;
        if self.negative { -duration } else { duration }
    }
}

/// Map one prediction to absolute time.
pub fn absolute_interval(instance: &Instance, prediction: &Prediction) -> PredictedVot {
    let onset = instance.window_min + prediction.onset_ms / 1000.0;
    let offset = instance.window_min + prediction.offset_ms / 1000.0;
    let negative = prediction.is_negative();

    PredictedVot {
        min_time: onset.min(offset),
        max_time: onset.max(offset),
        confidence: prediction.confidence,
        confidence_text: prediction.confidence_text.clone(),
        negative,
    }
}

/// Zip instances with predictions, refusing lists of unequal length.
pub fn predicted_vots(instances: &[Instance], predictions: &[Prediction]) -> Result<Vec<PredictedVot>> {
    if instances.len() != predictions.len() {
        return Err(Error::length_mismatch(
            "instances",
            instances.len(),
            "predictions",
            predictions.len(),
        ));
    }

    Ok(instances
        .iter()
        .zip(predictions)
        .map(|(instance, prediction)| absolute_interval(instance, prediction))
        .collect())
}

/// Build the prediction tier spanning `[grid.min_time, grid.max_time]`.
pub fn build_prediction_tier(
    grid: &TextGrid,
    tier_name: &str,
    vots: &[PredictedVot],
) -> Result<IntervalTier> {
    let (range_min, range_max) = (grid.min_time(), grid.max_time());

    for (index, vot) in vots.iter().enumerate() {
        if vot.min_time <= range_min || vot.max_time >= range_max {
            return Err(Error::PredictionOutOfRange {
                index,
                min_time: vot.min_time,
                max_time: vot.max_time,
                range_min,
                range_max,
            });
        }
    }

    for (index, pair) in vots.windows(2).enumerate() {
        if pair[1].min_time <= pair[0].max_time {
            return Err(Error::Overlap {
                index: index + 1,
                min_time: pair[1].min_time,
                previous_max: pair[0].max_time,
            });
        }
    }

    let mut tier = IntervalTier::new(tier_name, range_min, range_max);
    let mut cursor = range_min;
    for vot in vots {
        tier.add_interval(cursor, vot.min_time, "")?;
        tier.add_interval(vot.min_time, vot.max_time, vot.mark())?;
        cursor = vot.max_time;
    }
    tier.add_interval(cursor, range_max, "")?;

    Ok(tier)
}

/// What happened to the prediction tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierOutcome {
    Appended,

    /// A tier with a similar name existed and duplicates were allowed.
    AppendedDuplicate,

    /// A tier with a similar name existed; the document was left unchanged.
    SkippedDuplicate,
}

impl TierOutcome {
    pub fn is_appended(self) -> bool {
        !matches!(self, TierOutcome::SkippedDuplicate)
    }
}

/// Append a tier holding `predictions` to `grid`.
///
/// Fails without modifying `grid` on length mismatch, overlap or out-of-range predictions.
/// Saving the document is left to the caller.
pub fn reintegrate(
    grid: &mut TextGrid,
    instances: &[Instance],
    predictions: &[Prediction],
    tier_name: &str,
    allow_duplicate_tier: bool,
) -> Result<TierOutcome> {
    let vots = predicted_vots(instances, predictions)?;
    let tier = build_prediction_tier(grid, tier_name, &vots)?;

    let outcome = if grid.has_similar_tier(tier_name) {
        if !allow_duplicate_tier {
            warn!(
                tier = tier_name,
                "a tier with a similar name already exists, predictions not added"
            );
            return Ok(TierOutcome::SkippedDuplicate);
        }
        warn!(tier = tier_name, "appending duplicate tier");
        TierOutcome::AppendedDuplicate
    } else {
        TierOutcome::Appended
    };

    grid.append_tier(tier);
    debug!(tier = tier_name, predictions = vots.len(), "prediction tier appended");
    Ok(outcome)
}
