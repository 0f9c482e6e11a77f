// WAV encoding and decoding for captured windows and reference recordings

use std::io::Cursor;
use std::path::Path;

use super::{AudioDecoder, DecodeError, DecodedAudio, EncodedAudio};

/// Errors that can occur during WAV encoding
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WavEncodingError {
    /// Error during WAV encoding
    #[error("Encoding error: {0}")]
    EncodingError(String),
    /// Invalid input (NaN/infinity values, zero sample rate)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convert a hound error to WavEncodingError
#[cfg_attr(coverage_nightly, coverage(off))]
fn hound_error(e: hound::Error) -> WavEncodingError {
    WavEncodingError::EncodingError(e.to_string())
}

/// Encode audio samples as an in-memory 16-bit mono WAV
///
/// # Arguments
/// * `samples` - Audio samples as f32 values (expected range: -1.0 to 1.0)
/// * `sample_rate` - Sample rate in Hz (e.g., 16000)
///
/// An empty slice produces a valid WAV with no frames.
pub fn encode_wav_bytes(
    samples: &[f32],
    sample_rate: u32,
) -> Result<EncodedAudio, WavEncodingError> {
    if sample_rate == 0 {
        return Err(WavEncodingError::InvalidInput(
            "Sample rate must be non-zero".to_string(),
        ));
    }

    if samples.iter().any(|s| !s.is_finite()) {
        return Err(WavEncodingError::InvalidInput(
            "Samples contain NaN or infinity values".to_string(),
        ));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut wav_writer = hound::WavWriter::new(&mut cursor, spec).map_err(hound_error)?;

        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            let sample_i16 = (clamped * i16::MAX as f32) as i16;
            wav_writer.write_sample(sample_i16).map_err(hound_error)?;
        }

        wav_writer.finalize().map_err(hound_error)?;
    }

    Ok(EncodedAudio::new(cursor.into_inner()))
}

/// Decoder for WAV-encoded buffers backed by hound
///
/// Integer formats (8/16/24/32 bit) are normalized by their full-scale
/// value; float formats are passed through. Only the first channel is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl WavDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for WavDecoder {
    fn decode(&self, encoded: &EncodedAudio) -> Result<DecodedAudio, DecodeError> {
        if encoded.is_empty() {
            return Err(DecodeError::Empty);
        }

        // The reader borrows the bytes and is dropped on every return path
        let mut reader = hound::WavReader::new(Cursor::new(encoded.bytes.as_slice()))
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let spec = reader.spec();

        if spec.sample_rate == 0 {
            return Err(DecodeError::Malformed(
                "WAV header has a sample rate of 0".to_string(),
            ));
        }
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => {
                if spec.bits_per_sample != 32 {
                    return Err(DecodeError::UnsupportedFormat(format!(
                        "{}-bit float",
                        spec.bits_per_sample
                    )));
                }
                let samples: Vec<f32> = reader
                    .samples::<f32>()
                    .collect::<Result<_, _>>()
                    .map_err(|e| DecodeError::Malformed(e.to_string()))?;
                if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
                    return Err(DecodeError::Malformed(format!(
                        "non-finite float sample at index {}",
                        index
                    )));
                }
                samples
            }
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(DecodeError::UnsupportedFormat(format!(
                        "{}-bit integer",
                        spec.bits_per_sample
                    )));
                }
                let full_scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| DecodeError::Malformed(e.to_string()))?
            }
        };

        let samples = interleaved.into_iter().step_by(channels).collect();

        Ok(DecodedAudio {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Read a WAV file from disk into normalized mono samples
pub fn read_wav_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let bytes = std::fs::read(path).map_err(|e| DecodeError::Io(e.to_string()))?;
    WavDecoder.decode(&EncodedAudio::new(bytes))
}
