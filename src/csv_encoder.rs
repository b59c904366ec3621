use std::io::Write;

use crate::Result;
use crate::vot_encoder::{VotEncoder, VotRecord};

const HEADER: &str = "wav_file,time,vot,confidence";

/// A `VotEncoder` that writes one CSV row per predicted VOT.
///
/// Design:
/// - The header row is written lazily on the first record (or on close), so an encoder
///   created for a run that fails early leaves no output behind until something happens.
/// - Fields are quoted only when they need it, like spreadsheet tools expect.
pub struct CsvEncoder<W: Write> {
    w: W,
    started: bool,
    closed: bool,
}

impl<W: Write> CsvEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            closed: false,
        }
    }

    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            writeln!(self.w, "{HEADER}")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> VotEncoder for CsvEncoder<W> {
    fn write_vot(&mut self, record: &VotRecord) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write prediction: encoder is already closed",
            ));
        }

        self.start_if_needed()?;
        writeln!(
            self.w,
            "{},{},{},{}",
            csv_field(&record.wav_file),
            record.time,
            record.vot,
            record.confidence
        )?;
        self.w.flush()?;

        Ok(())
    }

    /// Idempotent. A run without predictions still produces the header row.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;
        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(wav: &str) -> VotRecord {
        VotRecord {
            wav_file: wav.to_string(),
            time: 0.98,
            vot: -0.05,
            confidence: 0.9,
        }
    }

    #[test]
    fn writes_header_once_then_rows() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = CsvEncoder::new(&mut out);
        enc.write_vot(&record("a.wav"))?;
        enc.write_vot(&record("b.wav"))?;
        enc.close()?;

        let s = std::str::from_utf8(&out)?;
        assert_eq!(
            s,
            "wav_file,time,vot,confidence\na.wav,0.98,-0.05,0.9\nb.wav,0.98,-0.05,0.9\n"
        );
        Ok(())
    }

    #[test]
    fn quotes_paths_with_commas() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = CsvEncoder::new(&mut out);
        enc.write_vot(&record("/data/smith, j/\"take 1\".wav"))?;
        enc.close()?;

        let s = std::str::from_utf8(&out)?;
        assert!(s.contains("\"/data/smith, j/\"\"take 1\"\".wav\",0.98"));
        Ok(())
    }

    #[test]
    fn close_without_records_writes_header_only() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = CsvEncoder::new(&mut out);
        enc.close()?;
        enc.close()?;
        assert!(enc.write_vot(&record("a.wav")).is_err());
        drop(enc);
        assert_eq!(std::str::from_utf8(&out)?, "wav_file,time,vot,confidence\n");
        Ok(())
    }
}
