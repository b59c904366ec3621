//! In-memory model of a Praat TextGrid.
//!
//! A `TextGrid` owns an ordered list of tiers; each tier owns its intervals (or points).
//! This module holds invariants only, no I/O:
//! - intervals are appended in time order and never overlap
//! - an interval tier is expected to cover its `[min_time, max_time]` range without gaps
//!
//! Coverage is not enforced on every mutation. It is checked when a document crosses the
//! file boundary, in [`reader`] and [`writer`].

pub mod reader;
pub mod writer;

pub use reader::{is_textgrid_file, read, read_from_str};
pub use writer::{write, write_to};

use crate::{Error, Result};

/// Tolerance used when comparing boundaries parsed from text.
pub(crate) const TIME_EPSILON: f64 = 1e-9;

/// A labeled time span. An empty `mark` is a filler interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub min_time: f64,
    pub max_time: f64,
    pub mark: String,
}

impl Interval {
    pub fn duration(&self) -> f64 {
        self.max_time - self.min_time
    }

    /// Whether the mark carries any non-whitespace text.
    pub fn is_labeled(&self) -> bool {
        !self.mark.trim().is_empty()
    }
}

/// A tier of contiguous, non-overlapping intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalTier {
    name: String,
    min_time: f64,
    max_time: f64,
    intervals: Vec<Interval>,
}

impl IntervalTier {
    pub fn new(name: impl Into<String>, min_time: f64, max_time: f64) -> Self {
        Self {
            name: name.into(),
            min_time,
            max_time,
            intervals: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_time(&self) -> f64 {
        self.min_time
    }

    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }

    /// Append an interval at the end of the tier.
    ///
    /// The contract is append-only and monotonically increasing: the new interval may touch
    /// the previous one but must not start before it ends.
    pub fn add_interval(
        &mut self,
        min_time: f64,
        max_time: f64,
        mark: impl Into<String>,
    ) -> Result<()> {
        if !(min_time < max_time) {
            return Err(Error::InvalidInterval { min_time, max_time });
        }

        if let Some(prev) = self.intervals.last() {
            if min_time < prev.max_time {
                return Err(Error::Ordering {
                    min_time,
                    previous_max: prev.max_time,
                });
            }
        }

        self.intervals.push(Interval {
            min_time,
            max_time,
            mark: mark.into(),
        });
        Ok(())
    }

    /// Check that consecutive intervals touch, with no gaps or overlaps between them.
    pub fn check_contiguous(&self) -> Result<()> {
        if self.intervals.is_empty() {
            return Err(Error::format(format!(
                "interval tier '{}' has no intervals",
                self.name
            )));
        }

        for (i, pair) in self.intervals.windows(2).enumerate() {
            if !approx_eq(pair[0].max_time, pair[1].min_time) {
                return Err(Error::format(format!(
                    "interval tier '{}' has a gap or overlap between intervals {} and {} ({} vs {})",
                    self.name,
                    i + 1,
                    i + 2,
                    pair[0].max_time,
                    pair[1].min_time
                )));
            }
        }

        Ok(())
    }

    /// Check that the intervals tile the declared `[min_time, max_time]` exactly.
    pub fn check_coverage(&self) -> Result<()> {
        self.check_contiguous()?;

        let covered = self.covered_range();
        if let Some((min_time, max_time)) = covered {
            if !approx_eq(min_time, self.min_time) || !approx_eq(max_time, self.max_time) {
                return Err(Error::format(format!(
                    "interval tier '{}' covers [{}, {}] but declares [{}, {}]",
                    self.name, min_time, max_time, self.min_time, self.max_time
                )));
            }
        }

        Ok(())
    }

    /// Range spanned by the intervals themselves, if any.
    pub fn covered_range(&self) -> Option<(f64, f64)> {
        let first = self.intervals.first()?;
        let last = self.intervals.last()?;
        Some((first.min_time, last.max_time))
    }
}

impl<'a> IntoIterator for &'a IntervalTier {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

/// An instantaneous mark on a point tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub time: f64,
    pub mark: String,
}

/// A tier of instantaneous marks ("TextTier" in Praat).
///
/// Point tiers are carried through read/write untouched; nothing in the engine uses them.
#[derive(Debug, Clone, PartialEq)]
pub struct PointTier {
    pub name: String,
    pub min_time: f64,
    pub max_time: f64,
    pub points: Vec<Point>,
}

/// One tier of a TextGrid.
#[derive(Debug, Clone, PartialEq)]
pub enum Tier {
    Interval(IntervalTier),
    Point(PointTier),
}

impl Tier {
    pub fn name(&self) -> &str {
        match self {
            Tier::Interval(t) => t.name(),
            Tier::Point(t) => &t.name,
        }
    }

    /// Praat class name of this tier kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Tier::Interval(_) => "IntervalTier",
            Tier::Point(_) => "TextTier",
        }
    }

    pub fn min_time(&self) -> f64 {
        match self {
            Tier::Interval(t) => t.min_time(),
            Tier::Point(t) => t.min_time,
        }
    }

    pub fn max_time(&self) -> f64 {
        match self {
            Tier::Interval(t) => t.max_time(),
            Tier::Point(t) => t.max_time,
        }
    }

    /// Borrow this tier as an interval tier, rejecting point tiers explicitly.
    pub fn as_interval_tier(&self) -> Result<&IntervalTier> {
        match self {
            Tier::Interval(t) => Ok(t),
            Tier::Point(_) => Err(Error::UnsupportedTier {
                name: self.name().to_owned(),
                kind: self.kind(),
            }),
        }
    }
}

impl From<IntervalTier> for Tier {
    fn from(tier: IntervalTier) -> Self {
        Tier::Interval(tier)
    }
}

impl From<PointTier> for Tier {
    fn from(tier: PointTier) -> Self {
        Tier::Point(tier)
    }
}

/// A TextGrid document: global time range plus ordered tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TextGrid {
    min_time: f64,
    max_time: f64,
    tiers: Vec<Tier>,
}

impl TextGrid {
    pub fn new(min_time: f64, max_time: f64) -> Result<Self> {
        if !(min_time < max_time) {
            return Err(Error::InvalidInterval { min_time, max_time });
        }
        Ok(Self {
            min_time,
            max_time,
            tiers: Vec::new(),
        })
    }

    pub fn min_time(&self) -> f64 {
        self.min_time
    }

    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Tier names in document order, duplicates preserved.
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(Tier::name).collect()
    }

    pub fn tier(&self, index: usize) -> Result<&Tier> {
        self.tiers.get(index).ok_or(Error::Index {
            index,
            len: self.tiers.len(),
        })
    }

    /// Append a tier.
    ///
    /// The caller is responsible for the tier spanning the document range; this is verified
    /// when the document is written.
    pub fn append_tier(&mut self, tier: impl Into<Tier>) {
        self.tiers.push(tier.into());
    }

    /// First tier whose name matches exactly.
    pub fn find_tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.name() == name)
    }

    /// First tier named `name`, which must be an interval tier.
    pub fn interval_tier(&self, name: &str) -> Result<&IntervalTier> {
        self.find_tier(name)
            .ok_or_else(|| Error::TierNotFound(name.to_owned()))?
            .as_interval_tier()
    }

    /// Whether a tier with this name exists, ignoring case and surrounding whitespace.
    pub fn has_similar_tier(&self, name: &str) -> bool {
        let wanted = normalize_tier_name(name);
        self.tiers
            .iter()
            .any(|t| normalize_tier_name(t.name()) == wanted)
    }
}

fn normalize_tier_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vot_tier() -> IntervalTier {
        let mut tier = IntervalTier::new("vot", 0.0, 5.0);
        tier.add_interval(0.0, 1.0, "").unwrap();
        tier.add_interval(1.0, 1.05, "pos").unwrap();
        tier.add_interval(1.05, 5.0, "").unwrap();
        tier
    }

    #[test]
    fn add_interval_rejects_overlap_with_previous() {
        let mut tier = IntervalTier::new("t", 0.0, 2.0);
        tier.add_interval(0.0, 1.0, "a").unwrap();
        let err = tier.add_interval(0.5, 2.0, "b").unwrap_err();
        assert!(matches!(err, Error::Ordering { .. }));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn add_interval_rejects_zero_length() {
        let mut tier = IntervalTier::new("t", 0.0, 2.0);
        let err = tier.add_interval(1.0, 1.0, "").unwrap_err();
        assert!(matches!(err, Error::InvalidInterval { .. }));
    }

    #[test]
    fn coverage_detects_gaps() {
        let mut tier = IntervalTier::new("t", 0.0, 3.0);
        tier.add_interval(0.0, 1.0, "").unwrap();
        tier.add_interval(1.5, 3.0, "").unwrap();
        assert!(matches!(tier.check_coverage(), Err(Error::Format(_))));

        assert!(vot_tier().check_coverage().is_ok());
    }

    #[test]
    fn tier_lookup_by_index_and_name() {
        let mut grid = TextGrid::new(0.0, 5.0).unwrap();
        grid.append_tier(vot_tier());
        grid.append_tier(PointTier {
            name: "bursts".into(),
            min_time: 0.0,
            max_time: 5.0,
            points: vec![Point {
                time: 1.0,
                mark: "b".into(),
            }],
        });
        grid.append_tier(vot_tier());

        assert_eq!(grid.tier_names(), vec!["vot", "bursts", "vot"]);
        assert!(matches!(grid.tier(3), Err(Error::Index { index: 3, len: 3 })));
        assert_eq!(grid.interval_tier("vot").unwrap().len(), 3);
        assert!(matches!(
            grid.interval_tier("bursts"),
            Err(Error::UnsupportedTier { .. })
        ));
        assert!(matches!(
            grid.interval_tier("missing"),
            Err(Error::TierNotFound(_))
        ));
    }

    #[test]
    fn similar_tier_names_ignore_case_and_whitespace() {
        let mut grid = TextGrid::new(0.0, 5.0).unwrap();
        let mut tier = IntervalTier::new(" AUTOVOT ", 0.0, 5.0);
        tier.add_interval(0.0, 5.0, "").unwrap();
        grid.append_tier(tier);

        assert!(grid.has_similar_tier("AutoVOT"));
        assert!(!grid.has_similar_tier("AutoVOT2"));
    }
}
