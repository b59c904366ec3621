//! Parser for Praat's long text TextGrid format.
//!
//! Only the labeled ("long") text serialization is accepted:
//!
//! ```text
//! File type = "ooTextFile"
//! Object class = "TextGrid"
//!
//! xmin = 0
//! xmax = 2.3
//! tiers? <exists>
//! size = 1
//! item []:
//!     item [1]:
//!         class = "IntervalTier"
//!         name = "vot"
//!         ...
//! ```
//!
//! Praat's "short text" and binary serializations drop the field labels and are rejected with
//! a format error rather than guessed at.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::{IntervalTier, Point, PointTier, TextGrid, Tier, approx_eq};
use crate::{Error, Result};

/// Token every Praat text file carries on its first line.
const SIGNATURE: &str = "ooTextFile";

/// How many bytes we sniff when checking for the signature.
const SNIFF_BYTES: usize = 1024;

/// Cheap check that `path` looks like a Praat text file.
///
/// Reads the first line only. Never fails: unreadable files are simply "not a TextGrid".
/// Used upstream to tell TextGrids apart from audio files and list files.
pub fn is_textgrid_file(path: impl AsRef<Path>) -> bool {
    let Ok(file) = File::open(path.as_ref()) else {
        return false;
    };

    let mut head = Vec::with_capacity(SNIFF_BYTES);
    if file
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut head)
        .is_err()
    {
        return false;
    }

    let text = decode_lossy(&head);
    text.lines()
        .next()
        .is_some_and(|line| line.contains(SIGNATURE))
}

/// Read a TextGrid from disk.
pub fn read(path: impl AsRef<Path>) -> Result<TextGrid> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let text = decode_text(&bytes).map_err(|err| with_path(path, err))?;
    let grid = read_from_str(&text).map_err(|err| with_path(path, err))?;

    debug!(
        path = %path.display(),
        tiers = grid.len(),
        "read TextGrid"
    );
    Ok(grid)
}

/// Parse a TextGrid from its textual form.
pub fn read_from_str(text: &str) -> Result<TextGrid> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let first_line = text.lines().next().unwrap_or_default();
    if !first_line.contains(SIGNATURE) {
        return Err(Error::format(format!(
            "missing '{SIGNATURE}' signature on the first line"
        )));
    }

    let mut fields = Fields::new(text);
    fields.expect("File type")?;

    let class = fields.expect("Object class")?;
    if class.value != "TextGrid" {
        return Err(Error::format(format!(
            "line {}: expected a TextGrid, found object class '{}'",
            class.line, class.value
        )));
    }

    let min_time = fields.expect_number("xmin")?;
    let max_time = fields.expect_number("xmax")?;
    let mut grid = TextGrid::new(min_time, max_time)
        .map_err(|err| Error::format(format!("invalid document range: {err}")))?;

    let exists = fields.expect("tiers?")?;
    let size = if exists.value.contains("<exists>") {
        fields.expect_count("size")?
    } else {
        0
    };

    for index in 0..size {
        let tier = read_tier(&mut fields, index)?;
        grid.append_tier(tier);
    }

    if let Some(extra) = fields.next()? {
        return Err(Error::format(format!(
            "line {}: document declares {size} tiers but more data follows ('{}')",
            extra.line, extra.label
        )));
    }

    check_document_bounds(&grid)?;
    Ok(grid)
}

fn read_tier(fields: &mut Fields<'_>, index: usize) -> Result<Tier> {
    let class = fields.expect("class").map_err(|err| {
        Error::format(format!("tier {}: {}", index + 1, strip_format(err)))
    })?;
    let name = fields.expect("name")?.value;
    let min_time = fields.expect_number("xmin")?;
    let max_time = fields.expect_number("xmax")?;

    match class.value.as_str() {
        "IntervalTier" => {
            let declared = fields.expect_count("intervals: size")?;
            let mut tier = IntervalTier::new(name, min_time, max_time);

            for found in 0..declared {
                if !fields.peek_is("xmin")? {
                    return Err(count_mismatch(tier.name(), "intervals", declared, found));
                }
                let xmin = fields.expect_number("xmin")?;
                let xmax = fields.expect_number("xmax")?;
                let text = fields.expect("text")?.value;
                tier.add_interval(xmin, xmax, text).map_err(|err| {
                    Error::format(format!(
                        "tier '{}', interval {}: {err}",
                        tier.name(),
                        found + 1
                    ))
                })?;
            }

            if fields.peek_is("xmin")? {
                return Err(Error::format(format!(
                    "tier '{}' declares {declared} intervals but more are present",
                    tier.name()
                )));
            }

            tier.check_coverage()?;
            Ok(Tier::Interval(tier))
        }
        "TextTier" => {
            let declared = fields.expect_count("points: size")?;
            let mut points = Vec::with_capacity(declared);

            for found in 0..declared {
                if !fields.peek_is("number")? && !fields.peek_is("time")? {
                    return Err(count_mismatch(&name, "points", declared, found));
                }
                let time = fields.expect_any_number(&["number", "time"])?;
                let mark = fields.expect("mark")?.value;
                points.push(Point { time, mark });
            }

            if fields.peek_is("number")? || fields.peek_is("time")? {
                return Err(Error::format(format!(
                    "tier '{name}' declares {declared} points but more are present"
                )));
            }

            Ok(Tier::Point(PointTier {
                name,
                min_time,
                max_time,
                points,
            }))
        }
        other => Err(Error::format(format!(
            "line {}: unknown tier class '{other}'",
            class.line
        ))),
    }
}

/// The document range must equal the union of its tiers' ranges, and every interval tier
/// must span it exactly.
fn check_document_bounds(grid: &TextGrid) -> Result<()> {
    let tiers = grid.tiers();
    if tiers.is_empty() {
        return Ok(());
    }

    let union_min = tiers.iter().map(Tier::min_time).fold(f64::INFINITY, f64::min);
    let union_max = tiers
        .iter()
        .map(Tier::max_time)
        .fold(f64::NEG_INFINITY, f64::max);

    if !approx_eq(union_min, grid.min_time()) || !approx_eq(union_max, grid.max_time()) {
        return Err(Error::format(format!(
            "document range [{}, {}] disagrees with the tiers' range [{union_min}, {union_max}]",
            grid.min_time(),
            grid.max_time()
        )));
    }

    for tier in tiers {
        if let Tier::Interval(t) = tier {
            if !approx_eq(t.min_time(), grid.min_time()) || !approx_eq(t.max_time(), grid.max_time()) {
                return Err(Error::format(format!(
                    "interval tier '{}' spans [{}, {}] but the document spans [{}, {}]",
                    t.name(),
                    t.min_time(),
                    t.max_time(),
                    grid.min_time(),
                    grid.max_time()
                )));
            }
        }
    }
    Ok(())
}

fn count_mismatch(tier: &str, what: &str, declared: usize, found: usize) -> Error {
    Error::format(format!(
        "tier '{tier}' declares {declared} {what} but only {found} are present"
    ))
}

fn strip_format(err: Error) -> String {
    match err {
        Error::Format(message) => message,
        other => other.to_string(),
    }
}

fn with_path(path: &Path, err: Error) -> Error {
    match err {
        Error::Format(message) => Error::Format(format!("{}: {message}", path.display())),
        other => other,
    }
}

/// Decode file bytes, honoring UTF-8 and UTF-16 byte order marks.
fn decode_text(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units = utf16_units(rest, u16::from_le_bytes);
        return String::from_utf16(&units).map_err(|_| Error::format("invalid UTF-16 text"));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16_units(rest, u16::from_be_bytes);
        return String::from_utf16(&units).map_err(|_| Error::format("invalid UTF-16 text"));
    }

    let rest = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8(rest.to_vec()).map_err(|_| Error::format("file is not valid UTF-8 text"))
}

fn decode_lossy(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return String::from_utf16_lossy(&utf16_units(rest, u16::from_le_bytes));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return String::from_utf16_lossy(&utf16_units(rest, u16::from_be_bytes));
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn utf16_units(bytes: &[u8], convert: fn([u8; 2]) -> u16) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| convert([pair[0], pair[1]]))
        .collect()
}

/// One `label = value` line (string values may continue over several lines).
#[derive(Debug)]
struct Field<'a> {
    label: &'a str,
    value: String,
    line: usize,
}

/// Line-oriented lexer over the labeled fields of a long-form TextGrid.
///
/// Structural header lines (`item []:`, `intervals [3]:`) carry no data and are skipped.
/// Anything else without a label is an error; that is how short-format files are detected.
struct Fields<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    peeked: Option<Field<'a>>,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            peeked: None,
        }
    }

    fn next(&mut self) -> Result<Option<Field<'a>>> {
        if let Some(field) = self.peeked.take() {
            return Ok(Some(field));
        }

        while let Some((idx, raw)) = self.lines.next() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || is_structural(line) {
                continue;
            }

            if let Some(rest) = line.strip_prefix("tiers?") {
                return Ok(Some(Field {
                    label: "tiers?",
                    value: rest.trim().to_owned(),
                    line: line_no,
                }));
            }

            // Split the untrimmed line: a quoted value may end in whitespace that belongs to a
            // string continuing on the next line.
            let Some((label, value)) = raw.trim_start().split_once('=') else {
                return Err(Error::format(format!(
                    "line {line_no}: expected a labeled field, found '{line}' \
                     (only the long text TextGrid format is supported)"
                )));
            };
            let value = value.trim_start();

            let value = if let Some(quoted) = value.strip_prefix('"') {
                self.read_string(quoted, line_no)?
            } else {
                value.split_whitespace().next().unwrap_or_default().to_owned()
            };

            return Ok(Some(Field {
                label: label.trim(),
                value,
                line: line_no,
            }));
        }

        Ok(None)
    }

    /// Read the rest of a quoted string; `""` is an escaped quote.
    fn read_string(&mut self, first: &str, line_no: usize) -> Result<String> {
        let mut out = String::new();
        let mut rest = first.to_owned();

        loop {
            let mut chars = rest.chars().peekable();
            while let Some(c) = chars.next() {
                if c != '"' {
                    out.push(c);
                } else if chars.peek() == Some(&'"') {
                    chars.next();
                    out.push('"');
                } else {
                    return Ok(out);
                }
            }

            match self.lines.next() {
                Some((_, next_line)) => {
                    out.push('\n');
                    rest = next_line.to_owned();
                }
                None => {
                    return Err(Error::format(format!(
                        "line {line_no}: unterminated string"
                    )));
                }
            }
        }
    }

    fn peek_is(&mut self, label: &str) -> Result<bool> {
        if self.peeked.is_none() {
            self.peeked = self.next()?;
        }
        Ok(self.peeked.as_ref().is_some_and(|f| f.label == label))
    }

    fn expect(&mut self, label: &str) -> Result<Field<'a>> {
        match self.next()? {
            Some(field) if field.label == label => Ok(field),
            Some(field) => Err(Error::format(format!(
                "line {}: expected '{label}', found '{}'",
                field.line, field.label
            ))),
            None => Err(Error::format(format!(
                "unexpected end of file, expected '{label}'"
            ))),
        }
    }

    fn expect_number(&mut self, label: &str) -> Result<f64> {
        let field = self.expect(label)?;
        parse_number(&field)
    }

    fn expect_any_number(&mut self, labels: &[&str]) -> Result<f64> {
        let field = match self.next()? {
            Some(field) if labels.contains(&field.label) => field,
            Some(field) => {
                return Err(Error::format(format!(
                    "line {}: expected one of {labels:?}, found '{}'",
                    field.line, field.label
                )));
            }
            None => return Err(Error::format("unexpected end of file")),
        };
        parse_number(&field)
    }

    fn expect_count(&mut self, label: &str) -> Result<usize> {
        let field = self.expect(label)?;
        field.value.parse::<usize>().map_err(|_| {
            Error::format(format!(
                "line {}: '{label}' is not a count: '{}'",
                field.line, field.value
            ))
        })
    }
}

fn parse_number(field: &Field<'_>) -> Result<f64> {
    let value = field.value.parse::<f64>().map_err(|_| {
        Error::format(format!(
            "line {}: '{}' is not a number: '{}'",
            field.line, field.label, field.value
        ))
    })?;

    if !value.is_finite() {
        return Err(Error::format(format!(
            "line {}: '{}' must be finite",
            field.line, field.label
        )));
    }
    Ok(value)
}

/// `item []:`, `item [2]:`, `intervals [7]:`, `points [1]:`
fn is_structural(line: &str) -> bool {
    line.ends_with(':') && !line.contains('=')
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TIERS: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0
xmax = 5
tiers? <exists>
size = 2
item []:
    item [1]:
        class = "IntervalTier"
        name = "vot"
        xmin = 0
        xmax = 5
        intervals: size = 3
        intervals [1]:
            xmin = 0
            xmax = 1
            text = ""
        intervals [2]:
            xmin = 1
            xmax = 1.05
            text = "pos"
        intervals [3]:
            xmin = 1.05
            xmax = 5
            text = ""
    item [2]:
        class = "TextTier"
        name = "bursts"
        xmin = 0
        xmax = 5
        points: size = 1
        points [1]:
            number = 1.01
            mark = "b"
"#;

    #[test]
    fn reads_interval_and_point_tiers() -> anyhow::Result<()> {
        let grid = read_from_str(TWO_TIERS)?;
        assert_eq!(grid.min_time(), 0.0);
        assert_eq!(grid.max_time(), 5.0);
        assert_eq!(grid.tier_names(), vec!["vot", "bursts"]);

        let vot = grid.interval_tier("vot")?;
        assert_eq!(vot.len(), 3);
        assert_eq!(vot.intervals()[1].mark, "pos");
        assert_eq!(vot.intervals()[1].min_time, 1.0);
        assert_eq!(vot.intervals()[1].max_time, 1.05);

        match grid.tier(1)? {
            Tier::Point(points) => {
                assert_eq!(points.points.len(), 1);
                assert_eq!(points.points[0].time, 1.01);
            }
            other => panic!("expected point tier, got {}", other.kind()),
        }
        Ok(())
    }

    #[test]
    fn rejects_missing_signature() {
        let err = read_from_str("Object class = \"TextGrid\"\n").unwrap_err();
        assert!(err.to_string().contains("ooTextFile"));
    }

    #[test]
    fn rejects_short_text_format() {
        let short = "File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n\n0\n5\n<exists>\n1\n";
        let err = read_from_str(short).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("long text"));
    }

    #[test]
    fn rejects_interval_count_larger_than_data() {
        let text = TWO_TIERS.replace("intervals: size = 3", "intervals: size = 4");
        let err = read_from_str(&text).unwrap_err();
        assert!(err.to_string().contains("declares 4 intervals"));
    }

    #[test]
    fn rejects_interval_count_smaller_than_data() {
        let text = TWO_TIERS.replace("intervals: size = 3", "intervals: size = 2");
        let err = read_from_str(&text).unwrap_err();
        assert!(err.to_string().contains("more are present"));
    }

    #[test]
    fn rejects_document_bounds_that_disagree_with_tiers() {
        let text = TWO_TIERS.replacen("xmax = 5\n", "xmax = 6\n", 1);
        let err = read_from_str(&text).unwrap_err();
        assert!(err.to_string().contains("disagrees"));
    }

    #[test]
    fn rejects_interval_tier_shorter_than_the_document() {
        let mut text = TWO_TIERS.replacen("size = 2\n", "size = 3\n", 1);
        text.push_str(
            r#"    item [3]:
        class = "IntervalTier"
        name = "partial"
        xmin = 0
        xmax = 1
        intervals: size = 1
        intervals [1]:
            xmin = 0
            xmax = 1
            text = "x"
"#,
        );
        let err = read_from_str(&text).unwrap_err();
        assert!(err.to_string().contains("'partial' spans [0, 1]"));
    }

    #[test]
    fn reads_escaped_and_multiline_strings() -> anyhow::Result<()> {
        let text = TWO_TIERS.replace(
            "text = \"pos\"",
            "text = \"say \"\"pa\"\"\nagain\"",
        );
        let grid = read_from_str(&text)?;
        let vot = grid.interval_tier("vot")?;
        assert_eq!(vot.intervals()[1].mark, "say \"pa\"\nagain");
        Ok(())
    }

    #[test]
    fn accepts_crlf_and_bom() -> anyhow::Result<()> {
        let text = format!("\u{feff}{}", TWO_TIERS.replace('\n', "\r\n"));
        let grid = read_from_str(&text)?;
        assert_eq!(grid.len(), 2);
        Ok(())
    }

    #[test]
    fn decodes_utf16_little_endian() -> anyhow::Result<()> {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in TWO_TIERS.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let text = decode_text(&bytes)?;
        assert_eq!(read_from_str(&text)?.len(), 2);
        Ok(())
    }

    #[test]
    fn reads_document_without_tiers() -> anyhow::Result<()> {
        let text = "File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n\nxmin = 0 \nxmax = 2 \ntiers? <absent> \n";
        let grid = read_from_str(text)?;
        assert!(grid.is_empty());
        Ok(())
    }

    #[test]
    fn sniffs_signature_without_failing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let good = dir.path().join("a.TextGrid");
        let bad = dir.path().join("a.wav");
        std::fs::write(&good, TWO_TIERS)?;
        std::fs::write(&bad, b"RIFF....WAVE")?;

        assert!(is_textgrid_file(&good));
        assert!(!is_textgrid_file(&bad));
        assert!(!is_textgrid_file(dir.path().join("missing.TextGrid")));
        Ok(())
    }
}
