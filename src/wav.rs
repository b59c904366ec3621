use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec};

use crate::{Error, Result};

/// Sample rate the acoustic front end is built for.
pub const REQUIRED_SAMPLE_RATE: u32 = 16_000;

/// Metadata of a validated WAV file.
#[derive(Debug, Clone, Copy)]
pub struct AudioInfo {
    pub spec: WavSpec,
    pub num_frames: u32,
}

impl AudioInfo {
    pub fn duration_seconds(&self) -> f64 {
        self.num_frames as f64 / self.spec.sample_rate as f64
    }
}

/// Open a WAV file and check it matches what the front end expects.
///
/// Format requirements:
/// - Mono (1 channel)
/// - 16 kHz sample rate
/// - 16-bit integer PCM
///
/// Only the header is read; samples are left to the external front end.
pub fn audio_info(path: impl AsRef<Path>) -> Result<AudioInfo> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    check_spec(&spec).map_err(|err| match err {
        Error::AudioFormat(message) => Error::AudioFormat(format!(
            "{}: {message} (consider converting it, e.g. `sox input.wav -c 1 -r 16000 -b 16 output.wav`)",
            path.display()
        )),
        other => other,
    })?;

    Ok(AudioInfo {
        spec,
        num_frames: reader.duration(),
    })
}

/// Whether `path` is a WAV file in the required format. Never fails.
pub fn is_valid_wav(path: impl AsRef<Path>) -> bool {
    audio_info(path).is_ok()
}

fn check_spec(spec: &WavSpec) -> Result<()> {
    if spec.channels != 1 {
        return Err(Error::AudioFormat(format!(
            "expected mono WAV (1 channel), got {} channels",
            spec.channels
        )));
    }

    if spec.sample_rate != REQUIRED_SAMPLE_RATE {
        return Err(Error::AudioFormat(format!(
            "expected {} Hz sample rate, got {} Hz",
            REQUIRED_SAMPLE_RATE, spec.sample_rate
        )));
    }

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(Error::AudioFormat(format!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    Ok(())
}
