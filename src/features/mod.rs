// Acoustic feature extraction and comparison
// Reduces a window of samples to a handful of cheap scalar features

mod scorer;
pub use scorer::similarity;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioDecoder, DecodeError, EncodedAudio};

/// Compact summary of one sound segment
///
/// Values are derived purely from a sample buffer and never change once
/// computed. The all-zero vector doubles as "nothing usable here": it is
/// what a silent buffer produces and it never takes part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Root-mean-square amplitude (>= 0)
    pub energy: f64,
    /// Sign changes per sample, in [0, 1]
    pub zcr: f64,
    /// Largest absolute sample value (>= 0)
    pub peak: f64,
    /// Length of the buffer in seconds (>= 0)
    pub duration: f64,
}

impl FeatureVector {
    /// The neutral vector `{0, 0, 0, 0}`
    pub const NEUTRAL: FeatureVector = FeatureVector {
        energy: 0.0,
        zcr: 0.0,
        peak: 0.0,
        duration: 0.0,
    };

    /// Compute features for a mono sample buffer
    ///
    /// An empty buffer yields [`FeatureVector::NEUTRAL`].
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        if samples.is_empty() {
            return Self::NEUTRAL;
        }

        let count = samples.len() as f64;

        let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let energy = (sum_squares / count).sqrt();

        // Zero counts as non-negative
        let crossings = samples
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count();
        let zcr = crossings as f64 / count;

        let peak = samples
            .iter()
            .fold(0.0f64, |max, &s| max.max((s as f64).abs()));

        let duration = if sample_rate == 0 {
            0.0
        } else {
            count / sample_rate as f64
        };

        Self {
            energy,
            zcr,
            peak,
            duration,
        }
    }

    /// Whether this is the neutral vector (energy, zcr and peak all zero)
    ///
    /// Duration is ignored: a silent window still has a length.
    pub fn is_neutral(&self) -> bool {
        self.energy == 0.0 && self.zcr == 0.0 && self.peak == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.energy.is_finite()
            && self.zcr.is_finite()
            && self.peak.is_finite()
            && self.duration.is_finite()
    }
}

/// Errors that prevent features from being extracted
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    /// The captured buffer could not be decoded
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),
    /// Decoding succeeded but produced no samples
    #[error("Decoded buffer contains no samples")]
    EmptyBuffer,
}

/// Decode an encoded buffer and extract its features
///
/// Failure is reported as an explicit error rather than a sentinel vector;
/// callers that only care about matching treat any error as "no match".
/// Decoder resources are scoped to the `decode` call and released before
/// this returns, on success and failure alike.
pub fn extract_features(
    decoder: &dyn AudioDecoder,
    encoded: &EncodedAudio,
) -> Result<FeatureVector, ExtractionError> {
    let decoded = decoder.decode(encoded)?;
    if decoded.samples.is_empty() {
        return Err(ExtractionError::EmptyBuffer);
    }
    Ok(FeatureVector::from_samples(&decoded.samples, decoded.sample_rate))
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;
