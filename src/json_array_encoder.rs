use std::io::Write;

use crate::Result;
use crate::vot_encoder::{VotEncoder, VotRecord};

/// A `VotEncoder` that writes records as a single JSON array.
///
/// Design:
/// - We stream output directly to a `Write` implementation so a long batch never holds
///   every prediction in memory.
/// - The encoder is stateful so we can emit a well-formed JSON array incrementally.
///
/// Example output:
/// ```json
/// [
///   { "wav_file": "a.wav", "time": 0.98, "vot": 0.05, "confidence": 0.9 },
///   { "wav_file": "a.wav", "time": 2.06, "vot": -0.04, "confidence": 0.4 }
/// ]
/// ```
pub struct JsonArrayEncoder<W: Write> {
    w: W,

    /// Whether we have written the opening `[` of the JSON array.
    started: bool,

    /// Whether the next element is the first one (no leading comma).
    first: bool,

    /// Once closed, no further writes are allowed.
    closed: bool,
}

impl<W: Write> JsonArrayEncoder<W> {
    /// The array is opened lazily, on the first write or on close.
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            first: true,
            closed: false,
        }
    }

    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            self.w.write_all(b"[")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> VotEncoder for JsonArrayEncoder<W> {
    fn write_vot(&mut self, record: &VotRecord) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write prediction: encoder is already closed",
            ));
        }

        self.start_if_needed()?;

        if !self.first {
            self.w.write_all(b",")?;
        }
        self.first = false;

        serde_json::to_writer(&mut self.w, record)?;

        // Flush so consumers reading a pipe see each file's predictions as it finishes.
        self.w.flush()?;

        Ok(())
    }

    /// Finalize the JSON array. Idempotent; an encoder closed without records writes `[]`.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;
        self.w.write_all(b"]")?;
        self.w.flush()?;

        self.closed = true;
        Ok(())
    }
}
