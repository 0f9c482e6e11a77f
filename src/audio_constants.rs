//! Centralized constants for audio processing.
//!
//! All detection-related magic numbers are defined here with documentation
//! explaining their purpose and constraints.

// =============================================================================
// SAMPLE RATE AND TIMING
// =============================================================================

/// Sample rate assumed for captured audio when the host does not say otherwise (Hz).
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Duration of one analysis window (milliseconds).
///
/// Windows are back-to-back and non-overlapping. At 16kHz a 2 second
/// window is 32000 samples = ~128KB of f32 data.
pub const DEFAULT_WINDOW_DURATION_MS: u64 = 2000;

/// How often a capture session checks its stop flag while waiting for
/// window data (milliseconds).
///
/// Bounds how long `stop()` can take to interrupt an in-flight capture.
pub const CAPTURE_POLL_INTERVAL_MS: u64 = 20;

/// How long lifecycle calls wait for a previous segmentation thread to exit (milliseconds).
pub const LOOP_EXIT_TIMEOUT_MS: u64 = 500;

// =============================================================================
// MATCHING
// =============================================================================

/// Default sensitivity threshold (0.0 - 1.0).
///
/// A window matches a reference when its similarity score is greater
/// than or equal to this value.
pub const DEFAULT_SENSITIVITY: f64 = 0.75;

/// Floor for the denominator of a relative difference.
///
/// Keeps the energy/zcr/peak comparison finite when both values are ~0.
pub const SIMILARITY_EPSILON: f64 = 0.001;

// =============================================================================
// BUFFERS AND CHANNELS
// =============================================================================

/// Ring buffer capacity for host-pushed audio (samples).
///
/// Eight seconds at 16kHz. The capture session drains it every poll
/// interval, so it only has to absorb scheduling jitter.
pub const PUSH_BUFFER_CAPACITY: usize = 16000 * 8;

/// Buffer size for the detection event channel.
///
/// Detections are rare (at most one per window), so a small buffer is
/// plenty. Events are dropped with a warning when the receiver falls behind.
pub const EVENT_CHANNEL_BUFFER_SIZE: usize = 16;

#[cfg(test)]
#[path = "audio_constants_test.rs"]
mod tests;
