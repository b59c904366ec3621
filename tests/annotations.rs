use std::fs;
use std::path::PathBuf;

use autovot::inputs::SourcePair;
use autovot::opts::TierDefinitions;
use autovot::performance::{PerformanceReport, collect_pairs};
use autovot::textgrid::{self, IntervalTier, Tier, TextGrid};
use autovot::windows::derive_instances;

const FIXTURE: &str = "tests/fixtures/stops.TextGrid";

#[test]
fn reads_fixture_with_point_tier() -> anyhow::Result<()> {
    let grid = textgrid::read(FIXTURE)?;

    assert_eq!(grid.tier_names(), ["vot", "bursts"]);
    assert_eq!(grid.max_time(), 2.5);

    let vot = grid.interval_tier("vot")?;
    let labeled: Vec<(f64, f64)> = vot
        .iter()
        .filter(|i| i.is_labeled())
        .map(|i| (i.min_time, i.max_time))
        .collect();
    assert_eq!(labeled, [(0.6, 0.648), (1.7, 1.735)]);

    match grid.tier(1)? {
        Tier::Point(points) => {
            assert_eq!(points.points.len(), 2);
            assert_eq!(points.points[1].mark, "b \"quoted\"");
        }
        other => panic!("expected a point tier, got {}", other.kind()),
    }
    assert!(grid.interval_tier("bursts").is_err());

    Ok(())
}

#[test]
fn rewritten_fixture_reads_back_identically() -> anyhow::Result<()> {
    let grid = textgrid::read(FIXTURE)?;

    let mut out = Vec::new();
    textgrid::write_to(&grid, &mut out)?;
    let again = textgrid::read_from_str(std::str::from_utf8(&out)?)?;

    assert_eq!(again, grid);
    Ok(())
}

#[test]
fn fixture_yields_one_instance_per_labeled_vot() -> anyhow::Result<()> {
    let grid = textgrid::read(FIXTURE)?;
    let sources = SourcePair::new("stops.wav", FIXTURE);

    let derivation =
        derive_instances(&grid, &TierDefinitions::for_vot_tier("vot"), &sources, Some(2.5))?;

    assert_eq!(derivation.instances.len(), 2);
    assert!(derivation.inconsistent.is_empty());
    let first = &derivation.instances[0];
    assert!((first.window_min - 0.55).abs() < 1e-9);
    assert_eq!(first.event_min, 0.6);
    let last = &derivation.instances[1];
    assert_eq!(last.window_max, 2.5);

    Ok(())
}

fn grid_with(tier_name: &str, vots: &[(f64, f64)]) -> anyhow::Result<TextGrid> {
    let mut tier = IntervalTier::new(tier_name, 0.0, 3.0);
    let mut cursor = 0.0;
    for &(min, max) in vots {
        tier.add_interval(cursor, min, "")?;
        tier.add_interval(min, max, "0.9")?;
        cursor = max;
    }
    tier.add_interval(cursor, 3.0, "")?;

    let mut grid = TextGrid::new(0.0, 3.0)?;
    grid.append_tier(tier);
    Ok(grid)
}

#[test]
fn performance_compares_matching_files_and_skips_mismatched_ones() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = |name: &str| -> PathBuf { dir.path().join(name) };

    textgrid::write(&grid_with("manual", &[(1.0, 1.05), (2.0, 2.02)])?, path("a.TextGrid"))?;
    textgrid::write(&grid_with("AutoVOT", &[(1.0, 1.052), (2.0, 2.03)])?, path("a_pred.TextGrid"))?;
    textgrid::write(&grid_with("manual", &[(1.0, 1.05)])?, path("b.TextGrid"))?;
    textgrid::write(&grid_with("AutoVOT", &[(0.5, 0.6), (1.0, 1.05)])?, path("b_pred.TextGrid"))?;

    let files = [
        (path("a.TextGrid"), path("a_pred.TextGrid")),
        (path("b.TextGrid"), path("b_pred.TextGrid")),
    ];
    let (pairs, problems) = collect_pairs(&files, "manual", "AutoVOT");

    assert_eq!(pairs.len(), 2);
    assert_eq!(problems.skipped(), 1);
    assert_eq!(
        problems.iter().next().map(|p| p.path().to_path_buf()),
        Some(path("b.TextGrid"))
    );

    let report = PerformanceReport::from_pairs(&pairs);
    assert_eq!(report.count, 2);
    assert!((report.mean_abs_difference_ms - 6.0).abs() < 1e-6);
    let within_5 = report.within.iter().find(|a| a.threshold_ms == 5);
    assert_eq!(within_5.map(|a| a.percent), Some(50.0));

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["count"], 2);

    Ok(())
}

#[test]
fn list_files_pair_up_line_by_line() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let left = dir.path().join("labeled.txt");
    let right = dir.path().join("predicted.txt");
    fs::write(&left, "a.TextGrid\nb.TextGrid\n")?;
    fs::write(&right, "a_pred.TextGrid\nb_pred.TextGrid\n")?;

    let pairs = autovot::inputs::resolve_textgrid_pairs(&left, &right)?;
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[1].1, PathBuf::from("b_pred.TextGrid"));

    Ok(())
}
