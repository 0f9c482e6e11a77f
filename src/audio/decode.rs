// Decode boundary: encoded window bytes -> normalized mono samples

use super::EncodedAudio;

/// Audio decoded into normalized samples in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Mono samples (first channel of the source)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Duration of the audio in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Errors that can occur while decoding a captured buffer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// There were no bytes to decode
    #[error("Encoded buffer is empty")]
    Empty,
    /// The bytes are not a valid stream for this decoder
    #[error("Malformed audio: {0}")]
    Malformed(String),
    /// The stream is valid but uses a layout this decoder cannot handle
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
    /// Failed to read the source
    #[error("I/O error: {0}")]
    Io(String),
}

/// Trait for the feature decode backend (allows mocking in tests)
pub trait AudioDecoder: Send + Sync {
    /// Decode an encoded buffer into normalized samples at a known sample rate
    fn decode(&self, encoded: &EncodedAudio) -> Result<DecodedAudio, DecodeError>;
}
