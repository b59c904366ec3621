//! Turning annotated TextGrids into candidate instances.
//!
//! Two sources of instances, selected by [`TierDefinitions`]:
//! - **VOT tier**: each matching labeled VOT interval is widened by fixed offsets, clamped to
//!   the document and the audio, then (when no window tier is configured) narrowed so it
//!   does not swallow its neighbors
//! - **window tier**: each matching interval of an explicit window tier is one instance whose
//!   window and event bounds both equal the interval (decoding unlabeled data)
//!
//! When both tiers are configured, the VOT-tier instances come first, uncorrected.
//!
//! Design:
//! - [`derive_instances`] is pure: one document in, instances (and inconsistencies) out.
//! - [`derive_batch`] owns the per-file failure policy: anything wrong with one file is
//!   recorded as a problem and that file is skipped. Only configuration errors abort.

use std::path::Path;

use tracing::debug;

use crate::inputs::SourcePair;
use crate::instance::Instance;
use crate::opts::{MarkFilter, TierDefinitions};
use crate::problems::ProblemList;
use crate::textgrid::{self, IntervalTier, TextGrid};
use crate::wav::audio_info;
use crate::{Error, Result};

/// Minimum gap kept between a corrected window and a neighboring event (seconds).
pub const NEIGHBOR_MARGIN: f64 = 0.02;

/// Result of deriving instances from one document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Derivation {
    pub instances: Vec<Instance>,

    /// Indexes into `instances` whose window does not contain the event.
    pub inconsistent: Vec<usize>,
}

/// Instances derived from a batch of files, in input order.
#[derive(Debug, Default)]
pub struct Batch {
    pub instances: Vec<Instance>,
    pub problems: ProblemList,

    /// Number of files that contributed at least one instance.
    pub files_used: usize,
}

/// Derive the instances of one document.
///
/// Instances from the VOT tier come first, then those from the window tier, so a file
/// can carry both. Each configured tier must exist (`TierNotFound`). Neighbor
/// correction only runs when no window tier is configured. `audio_duration` (seconds)
/// further clamps window ends when known.
pub fn derive_instances(
    grid: &TextGrid,
    defs: &TierDefinitions,
    sources: &SourcePair,
    audio_duration: Option<f64>,
) -> Result<Derivation> {
    defs.validate()?;

    let mut instances = match named(&defs.vot_tier) {
        Some(vot_tier) => {
            let mut instances = from_vot_tier(grid, vot_tier, defs, sources, audio_duration)?;
            if !defs.uses_window_tier() {
                correct_neighbors(&mut instances);
            }
            instances
        }
        None => Vec::new(),
    };

    if let Some(window_tier) = named(&defs.window_tier) {
        let tier = grid.interval_tier(window_tier)?;
        let windows: Vec<Instance> = matching_bounds(tier, &defs.window_mark)
            .map(|(min_time, max_time)| Instance {
                audio: sources.audio.clone(),
                textgrid: sources.textgrid.clone(),
                window_min: min_time,
                window_max: max_time,
                event_min: min_time,
                event_max: max_time,
            })
            .collect();

        if windows.is_empty() && instances.is_empty() {
            return Err(mark_not_found(tier, &defs.window_mark));
        }
        instances.extend(windows);
    }

    if defs.max_instances_per_file > 0 {
        instances.truncate(defs.max_instances_per_file);
    }

    let inconsistent = instances
        .iter()
        .enumerate()
        .filter(|(_, instance)| !instance.is_consistent())
        .map(|(i, _)| i)
        .collect();

    Ok(Derivation {
        instances,
        inconsistent,
    })
}

fn named(tier: &Option<String>) -> Option<&str> {
    tier.as_deref().filter(|t| !t.is_empty())
}

/// Widen each matching VOT interval by the offsets, clamped to the document and audio.
fn from_vot_tier(
    grid: &TextGrid,
    tier_name: &str,
    defs: &TierDefinitions,
    sources: &SourcePair,
    audio_duration: Option<f64>,
) -> Result<Vec<Instance>> {
    let tier = grid.interval_tier(tier_name)?;
    let upper = audio_duration.map_or(grid.max_time(), |d| d.min(grid.max_time()));

    let instances: Vec<Instance> = matching_bounds(tier, &defs.vot_mark)
        .map(|(event_min, event_max)| Instance {
            audio: sources.audio.clone(),
            textgrid: sources.textgrid.clone(),
            window_min: (event_min + defs.window_min_offset).max(0.0),
            window_max: (event_max + defs.window_max_offset).min(upper),
            event_min,
            event_max,
        })
        .collect();

    if instances.is_empty() {
        return Err(mark_not_found(tier, &defs.vot_mark));
    }
    Ok(instances)
}

/// Bounds of every interval in `tier` accepted by `mark`.
fn matching_bounds<'a>(
    tier: &'a IntervalTier,
    mark: &'a MarkFilter,
) -> impl Iterator<Item = (f64, f64)> + 'a {
    tier.iter()
        .filter(move |interval| mark.matches(&interval.mark))
        .map(|interval| (interval.min_time, interval.max_time))
}

fn mark_not_found(tier: &IntervalTier, mark: &MarkFilter) -> Error {
    Error::MarkNotFound {
        mark: mark.to_string(),
        tier: tier.name().to_owned(),
    }
}

/// Keep each window clear of the events on either side of it.
///
/// The first and last instances are left alone: their windows are only bounded by the
/// document (and audio) limits.
fn correct_neighbors(instances: &mut [Instance]) {
    for i in 1..instances.len().saturating_sub(1) {
        let prev_event_max = instances[i - 1].event_max;
        let next_event_min = instances[i + 1].event_min;
        let current = &mut instances[i];

        if current.window_min < prev_event_max {
            current.window_min =
                (current.event_min - NEIGHBOR_MARGIN).max(prev_event_max + NEIGHBOR_MARGIN);
        }
        if current.window_max > next_event_min {
            current.window_max =
                (current.event_max + NEIGHBOR_MARGIN).min(next_event_min - NEIGHBOR_MARGIN);
        }
    }
}

/// Derive instances from every pair, recording per-file failures as problems.
///
/// Only an invalid `defs` aborts; it would fail identically for every file.
pub fn derive_batch(pairs: &[SourcePair], defs: &TierDefinitions) -> Result<Batch> {
    defs.validate()?;

    let mut batch = Batch::default();
    for pair in pairs {
        match derive_file(pair, defs) {
            Ok(derivation) => {
                debug!(
                    textgrid = %pair.textgrid.display(),
                    instances = derivation.instances.len(),
                    "derived instances"
                );
                for &i in &derivation.inconsistent {
                    batch
                        .problems
                        .inconsistent(&pair.textgrid, derivation.instances[i].clone());
                }
                if !derivation.instances.is_empty() {
                    batch.files_used += 1;
                }
                batch.instances.extend(derivation.instances);
            }
            Err(err @ Error::Config(_)) => return Err(err),
            Err(err) => batch.problems.skip(&pair.textgrid, err),
        }
    }

    Ok(batch)
}

/// Validate and read one pair, then derive its instances.
pub(crate) fn derive_file(pair: &SourcePair, defs: &TierDefinitions) -> Result<Derivation> {
    let grid = load_textgrid(&pair.textgrid)?;
    let info = audio_info(&pair.audio)?;
    derive_instances(&grid, defs, pair, Some(info.duration_seconds()))
}

pub(crate) fn load_textgrid(path: &Path) -> Result<TextGrid> {
    if !textgrid::is_textgrid_file(path) {
        return Err(Error::format(format!(
            "{} is not a valid TextGrid (missing ooTextFile signature)",
            path.display()
        )));
    }
    textgrid::read(path)
}
