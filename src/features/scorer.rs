// Similarity score between two feature vectors

use super::FeatureVector;
use crate::audio_constants::SIMILARITY_EPSILON;

/// Relative difference of two non-negative magnitudes
fn relative_difference(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.max(b).max(SIMILARITY_EPSILON)
}

/// Score how alike two feature vectors are
///
/// Averages the relative differences of energy, zero-crossing rate and peak
/// (duration is not compared) and returns `1 - average`. Identical vectors
/// score exactly 1. The score is not clamped: vectors whose differences
/// exceed their magnitudes score below 0, and callers compare the raw value
/// against the sensitivity threshold.
pub fn similarity(f1: &FeatureVector, f2: &FeatureVector) -> f64 {
    let energy_diff = relative_difference(f1.energy, f2.energy);
    let zcr_diff = relative_difference(f1.zcr, f2.zcr);
    let peak_diff = relative_difference(f1.peak, f2.peak);

    1.0 - (energy_diff + zcr_diff + peak_diff) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(energy: f64, zcr: f64, peak: f64) -> FeatureVector {
        FeatureVector {
            energy,
            zcr,
            peak,
            duration: 2.0,
        }
    }

    #[test]
    fn test_identical_vectors_score_one() {
        let f = fv(0.5, 0.1, 0.8);
        assert_eq!(similarity(&f, &f), 1.0);
    }

    #[test]
    fn test_score_is_symmetric() {
        let pairs = [
            (fv(0.5, 0.1, 0.8), fv(0.52, 0.11, 0.79)),
            (fv(0.0, 0.0, 0.0), fv(0.3, 0.2, 0.9)),
            (fv(1e-5, 0.5, 0.01), fv(0.7, 0.0, 0.02)),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }
    }

    #[test]
    fn test_close_window_scores_high() {
        // energy 0.02/0.52, zcr 0.01/0.11, peak 0.01/0.8
        let reference = fv(0.5, 0.1, 0.8);
        let window = fv(0.52, 0.11, 0.79);
        let score = similarity(&window, &reference);

        let expected = 1.0 - (0.02 / 0.52 + 0.01 / 0.11 + 0.01 / 0.8) / 3.0;
        assert!((score - expected).abs() < 1e-12);
        assert!(score > 0.95 && score < 0.96);
    }

    #[test]
    fn test_distant_window_scores_low() {
        let reference = fv(0.5, 0.1, 0.8);
        let window = fv(0.1, 0.4, 0.2);
        let score = similarity(&window, &reference);
        assert!(score < 0.4, "score was {}", score);
    }

    #[test]
    fn test_duration_is_ignored() {
        let a = FeatureVector {
            duration: 0.5,
            ..fv(0.5, 0.1, 0.8)
        };
        let b = FeatureVector {
            duration: 9.0,
            ..fv(0.5, 0.1, 0.8)
        };
        assert_eq!(similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_epsilon_keeps_near_zero_values_finite() {
        let silent = fv(0.0, 0.0, 0.0);
        let whisper = fv(0.0005, 0.0, 0.0);
        let score = similarity(&silent, &whisper);
        assert!(score.is_finite());
        // 0.0005 / 0.001 = 0.5 on one dimension
        assert!((score - (1.0 - 0.5 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_each_dimension_contributes_at_most_one_third() {
        // Relative difference never exceeds 1 for non-negative inputs,
        // so the score stays within [0, 1] for valid feature vectors
        let a = fv(1.0, 1.0, 1.0);
        let b = fv(0.0, 0.0, 0.0);
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_score_is_not_clamped() {
        // Negative magnitudes cannot come from extraction, but the scorer
        // does not clamp, so out-of-domain inputs can score below zero
        let a = fv(1.0, 1.0, 1.0);
        let b = fv(-1.0, -1.0, -1.0);
        assert!(similarity(&a, &b) < 0.0);
    }
}
