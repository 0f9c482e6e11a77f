// Audio plumbing for the detector: capture sessions, window encoding and decoding
// Concrete backends stand in for the host's microphone and codec collaborators

use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::audio_constants::PUSH_BUFFER_CAPACITY;

mod decode;
pub use decode::{AudioDecoder, DecodeError, DecodedAudio};

pub mod file_backend;
pub use file_backend::WavFileBackend;

pub mod push_backend;
pub use push_backend::PushCaptureBackend;

pub mod wav;
pub use wav::{encode_wav_bytes, read_wav_file, WavDecoder, WavEncodingError};



/// Thread-safe buffer for host-pushed audio samples using a lock-free ring buffer
///
/// Uses a SPSC ring buffer for low-contention capture:
/// - Producer (host audio callback) writes via `push_samples()`
/// - Consumer (capture session) reads via `drain_samples()`
pub struct AudioBuffer {
    /// Ring buffer producer half
    producer: Arc<Mutex<RingProducer>>,
    /// Ring buffer consumer half
    consumer: Arc<Mutex<RingConsumer>>,
}

impl AudioBuffer {
    /// Create a new empty audio buffer with default capacity
    pub fn new() -> Self {
        Self::with_capacity(PUSH_BUFFER_CAPACITY)
    }

    /// Create a new audio buffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let rb = HeapRb::<f32>::new(capacity);
        let (producer, consumer) = rb.split();
        Self {
            producer: Arc::new(Mutex::new(producer)),
            consumer: Arc::new(Mutex::new(consumer)),
        }
    }

    /// Push samples to the buffer (used by the host's audio callback)
    ///
    /// Returns the number of samples actually written.
    /// If the buffer is full, the excess is dropped.
    pub fn push_samples(&self, samples: &[f32]) -> usize {
        self.producer.lock().push_slice(samples)
    }

    /// Drain every sample currently available
    pub fn drain_samples(&self) -> Vec<f32> {
        let mut cons = self.consumer.lock();
        let available = cons.occupied_len();
        let mut drained = vec![0.0; available];
        if available > 0 {
            cons.pop_slice(&mut drained);
        }
        drained
    }

    /// Number of samples waiting to be drained
    pub fn available(&self) -> usize {
        self.consumer.lock().occupied_len()
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AudioBuffer {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            consumer: Arc::clone(&self.consumer),
        }
    }
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("available", &self.available())
            .finish()
    }
}

/// Type alias for ring buffer producer half
type RingProducer = ringbuf::HeapProd<f32>;

/// Type alias for ring buffer consumer half
type RingConsumer = ringbuf::HeapCons<f32>;

/// Encoded audio for one captured window, as handed over by a capture source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
}

impl EncodedAudio {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Result of waiting for one capture window
#[derive(Debug, Clone, PartialEq)]
pub enum WindowCapture {
    /// The window boundary was reached; the audio is ready for evaluation
    Completed(EncodedAudio),
    /// Stop was requested mid-window; partial audio was discarded
    Interrupted,
}

/// Errors that can occur during audio capture
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    /// No audio input device is available
    #[error("No audio input device available")]
    NoDeviceAvailable,
    /// The device went away mid-session (unplugged, permission revoked)
    #[error("Audio device lost: {0}")]
    DeviceLost(String),
    /// A finite source has no more audio
    #[error("Audio source exhausted")]
    SourceExhausted,
    /// Failed to read or encode captured audio
    #[error("Audio I/O error: {0}")]
    Io(String),
}

/// Trait for audio capture backends (allows mocking in tests)
pub trait CaptureBackend: Send + Sync {
    /// Open a capture session
    ///
    /// The session is released when dropped.
    fn open_session(&self) -> Result<Box<dyn CaptureSession>, CaptureError>;
}

/// One open capture session, producing back-to-back windows
pub trait CaptureSession: Send {
    /// Capture a single window of `duration`
    ///
    /// Implementations must poll `stop` while waiting and return
    /// `WindowCapture::Interrupted` promptly once it is set.
    fn capture_window(
        &mut self,
        duration: Duration,
        stop: &AtomicBool,
    ) -> Result<WindowCapture, CaptureError>;
}

/// Number of samples covering `duration` at `sample_rate`
pub fn samples_for_duration(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).round() as usize
}
