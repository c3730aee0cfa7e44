//! Click track decoding
//!
//! Only the first channel of a WAV file is needed for peak detection, so
//! this is deliberately not a general decoder: no resampling, no mixdown.

use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::analysis::beats::{detect_beats, ClickBeat, DetectorOptions};
use crate::error::{MixerError, Result};

/// First channel of a decoded file
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Channel 0 samples, normalised to [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length of the decoded channel in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode channel 0 of a WAV file
///
/// # Errors
/// * `BeatDetection` - If the file cannot be opened or its samples read
pub fn decode_wav_channel0(path: &Path) -> Result<DecodedAudio> {
    let reader = WavReader::open(path).map_err(|e| MixerError::BeatDetection {
        reason: format!("failed to open {}: {}", path.display(), e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

    let samples = interleaved.into_iter().step_by(channels).collect();

    Ok(DecodedAudio::new(samples, spec.sample_rate))
}

/// Decode a WAV click track and detect its beats
///
/// `duration` is the duration reported by the playback element; when it is
/// not positive the decoded length is used instead.
pub fn detect_beats_from_wav(
    path: &Path,
    duration: f64,
    opts: &DetectorOptions,
) -> Result<Vec<ClickBeat>> {
    let decoded = decode_wav_channel0(path)?;
    let duration = if duration > 0.0 {
        duration
    } else {
        decoded.duration_secs()
    };
    Ok(detect_beats(
        &decoded.samples,
        decoded.sample_rate,
        duration,
        opts,
    ))
}

fn sample_error(bits: u16, e: hound::Error) -> MixerError {
    MixerError::BeatDetection {
        reason: format!("failed to read {}-bit samples: {}", bits, e),
    }
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| sample_error(bits_per_sample, e)),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(MixerError::BeatDetection {
                        reason: format!("unsupported {}-bit integer audio", bits_per_sample),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| sample_error(bits_per_sample, e))
        }
    }
}
