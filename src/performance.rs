//! Agreement between manually labeled and predicted VOT tiers.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::problems::ProblemList;
use crate::textgrid::Interval;
use crate::windows::load_textgrid;
use crate::{Error, Result};

/// Tolerances (milliseconds) reported in [`PerformanceReport::within`].
pub const THRESHOLDS_MS: [u32; 7] = [2, 5, 10, 15, 20, 25, 50];

/// One labeled VOT matched with its prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotPair {
    pub labeled_file: PathBuf,
    pub predicted_file: PathBuf,
    pub labeled_min: f64,
    pub labeled_max: f64,
    pub predicted_min: f64,
    pub predicted_max: f64,
}

impl VotPair {
    pub fn labeled_vot(&self) -> f64 {
        self.labeled_max - self.labeled_min
    }

    pub fn predicted_vot(&self) -> f64 {
        self.predicted_max - self.predicted_min
    }
}

/// Share of pairs whose VOTs differ by less than `threshold_ms`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agreement {
    pub threshold_ms: u32,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub count: usize,

    /// Pearson correlation of the left edges (burst onset).
    pub onset_correlation: f64,

    /// Pearson correlation of the right edges (voicing onset).
    pub offset_correlation: f64,

    /// Pearson correlation of the durations.
    pub vot_correlation: f64,

    /// Mean and standard deviation of `|labeled - predicted|` VOT, in milliseconds.
    pub mean_abs_difference_ms: f64,
    pub std_abs_difference_ms: f64,

    pub within: Vec<Agreement>,
}

impl PerformanceReport {
    pub fn from_pairs(pairs: &[VotPair]) -> Self {
        let column = |f: fn(&VotPair) -> f64| pairs.iter().map(f).collect::<Vec<_>>();
        let labeled_min = column(|p| p.labeled_min);
        let predicted_min = column(|p| p.predicted_min);
        let labeled_max = column(|p| p.labeled_max);
        let predicted_max = column(|p| p.predicted_max);
        let labeled_vot = column(VotPair::labeled_vot);
        let predicted_vot = column(VotPair::predicted_vot);

        let diffs: Vec<f64> = labeled_vot
            .iter()
            .zip(&predicted_vot)
            .map(|(x, y)| (x - y).abs())
            .collect();
        let (mean, std) = mean_std(&diffs);

        let within = THRESHOLDS_MS
            .iter()
            .map(|&threshold_ms| {
                let limit = f64::from(threshold_ms) / 1000.0;
                let hits = diffs.iter().filter(|&&d| d < limit).count();
                let percent = if diffs.is_empty() {
                    0.0
                } else {
                    100.0 * hits as f64 / diffs.len() as f64
                };
                Agreement {
                    threshold_ms,
                    percent,
                }
            })
            .collect();

        Self {
            count: pairs.len(),
            onset_correlation: pearson(&labeled_min, &predicted_min),
            offset_correlation: pearson(&labeled_max, &predicted_max),
            vot_correlation: pearson(&labeled_vot, &predicted_vot),
            mean_abs_difference_ms: mean * 1000.0,
            std_abs_difference_ms: std * 1000.0,
            within,
        }
    }
}

/// Pearson's r. Zero when either series has no variance (or is empty).
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let (mean_x, _) = mean_std(x);
    let (mean_y, _) = mean_std(y);

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let den = (sum_x2 * sum_y2).sqrt();
    if den == 0.0 { 0.0 } else { sum_xy / den }
}

/// Population mean and standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Labeled (non-blank) intervals of one tier.
pub fn labeled_intervals(path: &Path, tier: &str) -> Result<Vec<Interval>> {
    let grid = load_textgrid(path)?;
    Ok(grid
        .interval_tier(tier)?
        .iter()
        .filter(|interval| interval.is_labeled())
        .cloned()
        .collect())
}

/// Pair up labeled and predicted VOTs across file pairs.
///
/// A file pair whose tiers hold different numbers of VOTs cannot be matched up and is
/// recorded as a problem (`LengthMismatch`), as is any unreadable file.
pub fn collect_pairs(
    files: &[(PathBuf, PathBuf)],
    labeled_tier: &str,
    predicted_tier: &str,
) -> (Vec<VotPair>, ProblemList) {
    let mut pairs = Vec::new();
    let mut problems = ProblemList::new();

    for (labeled_file, predicted_file) in files {
        let matched = labeled_intervals(labeled_file, labeled_tier).and_then(|labeled| {
            let predicted = labeled_intervals(predicted_file, predicted_tier)?;
            if labeled.len() != predicted.len() {
                return Err(Error::length_mismatch(
                    format!("{} ({labeled_tier})", labeled_file.display()),
                    labeled.len(),
                    format!("{} ({predicted_tier})", predicted_file.display()),
                    predicted.len(),
                ));
            }
            Ok(labeled.into_iter().zip(predicted).collect::<Vec<_>>())
        });

        match matched {
            Ok(matched) => {
                debug!(file = %labeled_file.display(), vots = matched.len(), "matched VOTs");
                pairs.extend(matched.into_iter().map(|(l, p)| VotPair {
                    labeled_file: labeled_file.clone(),
                    predicted_file: predicted_file.clone(),
                    labeled_min: l.min_time,
                    labeled_max: l.max_time,
                    predicted_min: p.min_time,
                    predicted_max: p.max_time,
                }));
            }
            Err(err) => problems.skip(labeled_file, err),
        }
    }

    (pairs, problems)
}
