//! Serializer for Praat's long text TextGrid format.
//!
//! Layout follows what Praat itself writes (indentation, trailing space after values,
//! `item []:` headers) so files we rewrite diff cleanly against the originals.
//! Interval counts and tier boundary headers are always regenerated from the data.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use super::{IntervalTier, PointTier, TextGrid, Tier, TIME_EPSILON, approx_eq};
use crate::{Error, Result};

/// Write a TextGrid to `path`, replacing any existing file.
pub fn write(grid: &TextGrid, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    // Validate before touching the file so a bad document never truncates a good one.
    validate(grid)?;

    let mut w = BufWriter::new(File::create(path)?);
    write_unchecked(grid, &mut w)?;
    w.flush()?;

    debug!(path = %path.display(), tiers = grid.len(), "wrote TextGrid");
    Ok(())
}

/// Serialize a TextGrid into any writer.
pub fn write_to<W: Write>(grid: &TextGrid, mut w: W) -> Result<()> {
    validate(grid)?;
    write_unchecked(grid, &mut w)?;
    w.flush()?;
    Ok(())
}

/// Every interval tier must be contiguous and span exactly the document range; point
/// tiers must lie within it.
fn validate(grid: &TextGrid) -> Result<()> {
    for tier in grid.tiers() {
        match tier {
            Tier::Interval(t) => {
                t.check_contiguous()?;
                let (min_time, max_time) =
                    t.covered_range().unwrap_or((t.min_time(), t.max_time()));

                if !approx_eq(min_time, grid.min_time()) || !approx_eq(max_time, grid.max_time()) {
                    return Err(Error::format(format!(
                        "interval tier '{}' covers [{min_time}, {max_time}] but the document spans [{}, {}]",
                        t.name(),
                        grid.min_time(),
                        grid.max_time()
                    )));
                }
            }
            Tier::Point(t) => {
                if t.min_time < grid.min_time() - TIME_EPSILON
                    || t.max_time > grid.max_time() + TIME_EPSILON
                {
                    return Err(Error::format(format!(
                        "point tier '{}' spans [{}, {}], outside the document range [{}, {}]",
                        t.name,
                        t.min_time,
                        t.max_time,
                        grid.min_time(),
                        grid.max_time()
                    )));
                }
            }
        }
    }
    Ok(())
}

fn write_unchecked<W: Write>(grid: &TextGrid, w: &mut W) -> Result<()> {
    writeln!(w, "File type = \"ooTextFile\"")?;
    writeln!(w, "Object class = \"TextGrid\"")?;
    writeln!(w)?;
    writeln!(w, "xmin = {} ", fmt_time(grid.min_time()))?;
    writeln!(w, "xmax = {} ", fmt_time(grid.max_time()))?;

    if grid.is_empty() {
        writeln!(w, "tiers? <absent> ")?;
        return Ok(());
    }

    writeln!(w, "tiers? <exists> ")?;
    writeln!(w, "size = {} ", grid.len())?;
    writeln!(w, "item []: ")?;

    for (i, tier) in grid.tiers().iter().enumerate() {
        writeln!(w, "    item [{}]:", i + 1)?;
        match tier {
            Tier::Interval(t) => write_interval_tier(w, t)?,
            Tier::Point(t) => write_point_tier(w, t)?,
        }
    }
    Ok(())
}

fn write_interval_tier<W: Write>(w: &mut W, tier: &IntervalTier) -> Result<()> {
    let (min_time, max_time) = tier
        .covered_range()
        .unwrap_or((tier.min_time(), tier.max_time()));

    writeln!(w, "        class = \"IntervalTier\" ")?;
    writeln!(w, "        name = {} ", quote(tier.name()))?;
    writeln!(w, "        xmin = {} ", fmt_time(min_time))?;
    writeln!(w, "        xmax = {} ", fmt_time(max_time))?;
    writeln!(w, "        intervals: size = {} ", tier.len())?;

    for (i, interval) in tier.iter().enumerate() {
        writeln!(w, "        intervals [{}]:", i + 1)?;
        writeln!(w, "            xmin = {} ", fmt_time(interval.min_time))?;
        writeln!(w, "            xmax = {} ", fmt_time(interval.max_time))?;
        writeln!(w, "            text = {} ", quote(&interval.mark))?;
    }
    Ok(())
}

fn write_point_tier<W: Write>(w: &mut W, tier: &PointTier) -> Result<()> {
    writeln!(w, "        class = \"TextTier\" ")?;
    writeln!(w, "        name = {} ", quote(&tier.name))?;
    writeln!(w, "        xmin = {} ", fmt_time(tier.min_time))?;
    writeln!(w, "        xmax = {} ", fmt_time(tier.max_time))?;
    writeln!(w, "        points: size = {} ", tier.points.len())?;

    for (i, point) in tier.points.iter().enumerate() {
        writeln!(w, "        points [{}]:", i + 1)?;
        writeln!(w, "            number = {} ", fmt_time(point.time))?;
        writeln!(w, "            mark = {} ", quote(&point.mark))?;
    }
    Ok(())
}

/// Shortest representation that parses back to the same `f64` (Praat writes `0`, not `0.0`).
fn fmt_time(value: f64) -> String {
    if value == 0.0 {
        // Avoid writing "-0".
        return "0".to_owned();
    }
    format!("{value}")
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textgrid::read_from_str;

    fn grid() -> TextGrid {
        let mut grid = TextGrid::new(0.0, 2.5).unwrap();
        let mut tier = IntervalTier::new("vot", 0.0, 2.5);
        tier.add_interval(0.0, 1.0, "").unwrap();
        tier.add_interval(1.0, 1.125, "say \"pa\"").unwrap();
        tier.add_interval(1.125, 2.5, "").unwrap();
        grid.append_tier(tier);
        grid
    }

    #[test]
    fn writes_praat_long_layout() -> anyhow::Result<()> {
        let mut out = Vec::new();
        write_to(&grid(), &mut out)?;
        let s = std::str::from_utf8(&out)?;

        assert!(s.starts_with("File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n\nxmin = 0 \nxmax = 2.5 \n"));
        assert!(s.contains("tiers? <exists> \nsize = 1 \nitem []: \n    item [1]:\n"));
        assert!(s.contains("        intervals: size = 3 \n"));
        assert!(s.contains(
            "        intervals [2]:\n            xmin = 1 \n            xmax = 1.125 \n            text = \"say \"\"pa\"\"\" \n"
        ));
        Ok(())
    }

    #[test]
    fn written_output_reads_back_identically() -> anyhow::Result<()> {
        let original = grid();
        let mut out = Vec::new();
        write_to(&original, &mut out)?;

        let reread = read_from_str(std::str::from_utf8(&out)?)?;
        assert_eq!(reread, original);
        Ok(())
    }

    #[test]
    fn refuses_tier_with_gap() {
        let mut grid = TextGrid::new(0.0, 3.0).unwrap();
        let mut tier = IntervalTier::new("gappy", 0.0, 3.0);
        tier.add_interval(0.0, 1.0, "").unwrap();
        tier.add_interval(2.0, 3.0, "").unwrap();
        grid.append_tier(tier);

        let err = write_to(&grid, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn regenerates_tier_bounds_from_intervals() -> anyhow::Result<()> {
        let mut grid = TextGrid::new(0.0, 3.0).unwrap();
        // Declared bounds are stale; the header is taken from the intervals.
        let mut tier = IntervalTier::new("t", 0.0, 1.0);
        tier.add_interval(0.0, 3.0, "").unwrap();
        grid.append_tier(tier);

        let mut out = Vec::new();
        write_to(&grid, &mut out)?;
        let reread = read_from_str(std::str::from_utf8(&out)?)?;
        assert_eq!(reread.interval_tier("t")?.max_time(), 3.0);
        Ok(())
    }

    #[test]
    fn refuses_interval_tier_covering_part_of_the_document() {
        let mut grid = grid();
        let mut partial = IntervalTier::new("partial", 0.0, 1.0);
        partial.add_interval(0.0, 1.0, "x").unwrap();
        grid.append_tier(partial);

        let mut out = Vec::new();
        let err = write_to(&grid, &mut out).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("'partial'"));
        assert!(out.is_empty());
    }

    #[test]
    fn refuses_empty_interval_tier_with_short_range() {
        let mut grid = grid();
        grid.append_tier(IntervalTier::new("empty", 0.0, 1.0));
        assert!(write_to(&grid, Vec::new()).is_err());
    }

    #[test]
    fn writes_absent_tiers_for_empty_document() -> anyhow::Result<()> {
        let mut out = Vec::new();
        write_to(&TextGrid::new(0.0, 1.0)?, &mut out)?;
        assert!(std::str::from_utf8(&out)?.ends_with("tiers? <absent> \n"));
        Ok(())
    }

    #[test]
    fn formats_times_without_trailing_zeroes() {
        assert_eq!(fmt_time(0.0), "0");
        assert_eq!(fmt_time(-0.0), "0");
        assert_eq!(fmt_time(5.0), "5");
        assert_eq!(fmt_time(1.05), "1.05");
    }
}
