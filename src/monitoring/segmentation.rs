// Segmentation loop - cuts capture into back-to-back windows and matches each one
// Runs on a dedicated thread owned by the DetectionController

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::state::{MonitorShared, MonitoringState};
use crate::audio::{AudioDecoder, CaptureSession, EncodedAudio, WindowCapture};
use crate::events::{AlertDispatcher, DetectionEvent};
use crate::features::{extract_features, similarity, ExtractionError, FeatureVector};
use crate::library::{ReferenceLibrary, ReferenceSound};

/// Result of evaluating one completed window
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// The window could not be turned into features
    ExtractionFailed(ExtractionError),
    /// The window decoded to the neutral vector
    Silent,
    /// No reference reached the threshold
    NoMatch(FeatureVector),
    /// The first reference, in scan order, that reached the threshold
    Matched {
        features: FeatureVector,
        reference: ReferenceSound,
        score: f64,
    },
}

impl WindowOutcome {
    /// Peak amplitude of the window, when it decoded
    pub fn level(&self) -> Option<f64> {
        match self {
            WindowOutcome::ExtractionFailed(_) => None,
            WindowOutcome::Silent => Some(0.0),
            WindowOutcome::NoMatch(features) => Some(features.peak),
            WindowOutcome::Matched { features, .. } => Some(features.peak),
        }
    }
}

/// Scan `references` in order and return the first whose score is `>= threshold`
///
/// Stops at the first hit; a later reference with a higher score is never
/// considered.
pub fn first_match<I>(
    features: &FeatureVector,
    references: I,
    threshold: f64,
) -> Option<(ReferenceSound, f64)>
where
    I: IntoIterator<Item = ReferenceSound>,
{
    references.into_iter().find_map(|reference| {
        let score = similarity(features, reference.features());
        crate::trace!(
            "[segmentation] Reference {} '{}' scored {:.4}",
            reference.id(),
            reference.name(),
            score
        );
        if score >= threshold {
            Some((reference, score))
        } else {
            None
        }
    })
}

/// Extract features from a window and match them against a library snapshot
pub fn evaluate_window(
    decoder: &dyn AudioDecoder,
    encoded: &EncodedAudio,
    library: &ReferenceLibrary,
    threshold: f64,
) -> WindowOutcome {
    let features = match extract_features(decoder, encoded) {
        Ok(features) => features,
        Err(e) => return WindowOutcome::ExtractionFailed(e),
    };

    if features.is_neutral() {
        return WindowOutcome::Silent;
    }

    match first_match(&features, library.scan_ordered(), threshold) {
        Some((reference, score)) => WindowOutcome::Matched {
            features,
            reference,
            score,
        },
        None => WindowOutcome::NoMatch(features),
    }
}

/// Everything the loop thread needs for one session
pub(crate) struct LoopContext {
    pub library: Arc<ReferenceLibrary>,
    pub decoder: Arc<dyn AudioDecoder>,
    pub dispatcher: Arc<dyn AlertDispatcher>,
    pub shared: Arc<MonitorShared>,
    /// This session's stop flag
    pub stop: Arc<AtomicBool>,
    pub window: Duration,
}

/// Main loop for the segmentation thread
///
/// Capture and evaluation are sequenced: while a window is evaluated no
/// audio is captured. Exits when the session is stopped or capture fails;
/// the capture session is released before the state returns to `Idle`.
pub(crate) fn segmentation_thread_main(ctx: LoopContext, mut session: Box<dyn CaptureSession>) {
    crate::debug!(
        "[segmentation] Loop started, window={}ms",
        ctx.window.as_millis()
    );

    let mut interruption = None;

    loop {
        if !ctx.shared.advance(&ctx.stop, MonitoringState::Capturing) {
            crate::debug!("[segmentation] Stop signal received, exiting loop");
            break;
        }

        let encoded = match session.capture_window(ctx.window, &ctx.stop) {
            Ok(WindowCapture::Completed(encoded)) => encoded,
            Ok(WindowCapture::Interrupted) => {
                crate::debug!("[segmentation] Capture interrupted by stop, discarding window");
                break;
            }
            Err(e) => {
                crate::error!("[segmentation] Capture interrupted: {}", e);
                interruption = Some(e.to_string());
                break;
            }
        };

        if !ctx.shared.advance(&ctx.stop, MonitoringState::Evaluating) {
            crate::debug!("[segmentation] Stopped before evaluation, discarding window");
            break;
        }

        let threshold = ctx.shared.sensitivity.get();
        let outcome = evaluate_window(ctx.decoder.as_ref(), &encoded, &ctx.library, threshold);
        ctx.shared.record_window(outcome.level());

        match outcome {
            WindowOutcome::ExtractionFailed(e) => {
                crate::debug!("[segmentation] Window skipped, extraction failed: {}", e);
            }
            WindowOutcome::Silent => {
                crate::trace!("[segmentation] Window skipped, silent");
            }
            WindowOutcome::NoMatch(features) => {
                crate::trace!(
                    "[segmentation] No match (energy={:.4}, zcr={:.4}, peak={:.4})",
                    features.energy,
                    features.zcr,
                    features.peak
                );
            }
            WindowOutcome::Matched {
                reference, score, ..
            } => {
                if ctx.stop.load(Ordering::SeqCst) {
                    crate::debug!("[segmentation] Stopped during evaluation, dropping match");
                    break;
                }

                let event = DetectionEvent::new(reference, score);
                crate::info!("[segmentation] {}", event.summary());
                ctx.shared.record_detection();
                ctx.dispatcher.dispatch(event);
            }
        }
    }

    drop(session);
    ctx.shared.finish_session(&ctx.stop, interruption);
    crate::debug!("[segmentation] Loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{encode_wav_bytes, WavDecoder};

    fn fv(energy: f64, zcr: f64, peak: f64) -> FeatureVector {
        FeatureVector {
            energy,
            zcr,
            peak,
            duration: 2.0,
        }
    }

    #[test]
    fn test_first_match_scenario_fires() {
        let library = ReferenceLibrary::new();
        library.register("chime", fv(0.5, 0.1, 0.8)).unwrap();

        let (reference, score) =
            first_match(&fv(0.52, 0.11, 0.79), library.scan_ordered(), 0.75).unwrap();
        assert_eq!(reference.name(), "chime");
        assert!((score - 0.953).abs() < 0.001);
    }

    #[test]
    fn test_first_match_distant_window_does_not_fire() {
        let library = ReferenceLibrary::new();
        library.register("chime", fv(0.5, 0.1, 0.8)).unwrap();

        assert!(first_match(&fv(0.1, 0.4, 0.2), library.scan_ordered(), 0.75).is_none());
    }

    #[test]
    fn test_first_match_prefers_scan_order_over_best_score() {
        let library = ReferenceLibrary::new();
        library.register("close enough", fv(0.4, 0.1, 0.8)).unwrap();
        library.register("exact", fv(0.5, 0.1, 0.8)).unwrap();

        let (reference, score) =
            first_match(&fv(0.5, 0.1, 0.8), library.scan_ordered(), 0.75).unwrap();
        assert_eq!(reference.name(), "close enough");
        assert!(score < 1.0);
    }

    #[test]
    fn test_first_match_threshold_is_inclusive() {
        let library = ReferenceLibrary::new();
        library.register("chime", fv(0.5, 0.1, 0.8)).unwrap();

        let hit = first_match(&fv(0.5, 0.1, 0.8), library.scan_ordered(), 1.0);
        assert_eq!(hit.map(|(_, score)| score), Some(1.0));
    }

    #[test]
    fn test_first_match_empty_library() {
        assert!(first_match(&fv(0.5, 0.1, 0.8), Vec::new(), 0.0).is_none());
    }

    #[test]
    fn test_evaluate_window_matches_registered_capture() {
        let samples: Vec<f32> = (0..1600).map(|i| if i % 10 < 5 { 0.6 } else { -0.6 }).collect();
        let encoded = encode_wav_bytes(&samples, 16000).unwrap();
        let library = ReferenceLibrary::new();
        library
            .register_capture(Some("tone".into()), &encoded, &WavDecoder)
            .unwrap();

        match evaluate_window(&WavDecoder, &encoded, &library, 0.75) {
            WindowOutcome::Matched {
                reference, score, ..
            } => {
                assert_eq!(reference.name(), "tone");
                assert_eq!(score, 1.0);
            }
            other => panic!("Expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_window_skips_silence() {
        let library = ReferenceLibrary::new();
        library.register("chime", fv(0.5, 0.1, 0.8)).unwrap();
        let encoded = encode_wav_bytes(&[0.0; 1600], 16000).unwrap();

        let outcome = evaluate_window(&WavDecoder, &encoded, &library, 0.0);
        assert_eq!(outcome, WindowOutcome::Silent);
        assert_eq!(outcome.level(), Some(0.0));
    }

    #[test]
    fn test_evaluate_window_skips_undecodable_buffer() {
        let library = ReferenceLibrary::new();
        library.register("chime", fv(0.5, 0.1, 0.8)).unwrap();

        // Threshold 0 would match anything that got as far as scoring
        let outcome = evaluate_window(
            &WavDecoder,
            &EncodedAudio::new(vec![1, 2, 3]),
            &library,
            0.0,
        );
        assert!(matches!(outcome, WindowOutcome::ExtractionFailed(_)));
        assert_eq!(outcome.level(), None);
    }
}
