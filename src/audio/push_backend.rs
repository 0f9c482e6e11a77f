// Capture backend fed by the host's own audio callback
// The host pushes PCM into a ring buffer; sessions cut it into fixed windows

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{
    encode_wav_bytes, samples_for_duration, AudioBuffer, CaptureBackend, CaptureError,
    CaptureSession, WindowCapture,
};
use crate::audio_constants::CAPTURE_POLL_INTERVAL_MS;

/// Device link state shared between the host side and open sessions
#[derive(Debug, Default)]
struct DeviceLink {
    /// Set when the host reports the device is gone
    lost_reason: Mutex<Option<String>>,
}

/// Capture backend for hosts that own the audio device
///
/// Clone it and keep one copy on the device callback side: call
/// [`PushCaptureBackend::push_samples`] from the callback and
/// [`PushCaptureBackend::disconnect`] when the device goes away.
#[derive(Debug, Clone)]
pub struct PushCaptureBackend {
    buffer: AudioBuffer,
    sample_rate: u32,
    link: Arc<DeviceLink>,
    poll_interval: Duration,
}

impl PushCaptureBackend {
    /// Create a backend for mono audio at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self::with_buffer(sample_rate, AudioBuffer::new())
    }

    /// Create a backend over a caller-sized buffer
    pub fn with_buffer(sample_rate: u32, buffer: AudioBuffer) -> Self {
        Self {
            buffer,
            sample_rate,
            link: Arc::new(DeviceLink::default()),
            poll_interval: Duration::from_millis(CAPTURE_POLL_INTERVAL_MS),
        }
    }

    /// Push mono samples from the device callback
    ///
    /// Returns the number of samples accepted; the rest are dropped if the
    /// ring buffer is full (no session is draining it).
    pub fn push_samples(&self, samples: &[f32]) -> usize {
        self.buffer.push_samples(samples)
    }

    /// Report that the device is gone
    ///
    /// Any open session fails its current window with `CaptureError::DeviceLost`.
    pub fn disconnect(&self, reason: impl Into<String>) {
        let reason = reason.into();
        crate::warn!("[capture] Device disconnected: {}", reason);
        *self.link.lost_reason.lock() = Some(reason);
    }

    /// Clear a previous disconnect so new sessions can be opened
    pub fn reconnect(&self) {
        *self.link.lost_reason.lock() = None;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn lost_reason(&self) -> Option<String> {
        self.link.lost_reason.lock().clone()
    }
}

impl CaptureBackend for PushCaptureBackend {
    fn open_session(&self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        if self.lost_reason().is_some() {
            return Err(CaptureError::NoDeviceAvailable);
        }
        if self.sample_rate == 0 {
            return Err(CaptureError::Io("sample rate must be greater than zero".into()));
        }

        // Audio pushed while nobody was listening does not belong to any window
        let stale = self.buffer.drain_samples().len();
        if stale > 0 {
            crate::trace!("[capture] Discarded {} stale samples at session open", stale);
        }

        crate::debug!("[capture] Push session opened at {} Hz", self.sample_rate);
        Ok(Box::new(PushSession {
            backend: self.clone(),
            carry: Vec::new(),
        }))
    }
}

/// An open session over a [`PushCaptureBackend`]
struct PushSession {
    backend: PushCaptureBackend,
    /// Samples drained past the end of the previous window
    carry: Vec<f32>,
}

impl CaptureSession for PushSession {
    fn capture_window(
        &mut self,
        duration: Duration,
        stop: &AtomicBool,
    ) -> Result<WindowCapture, CaptureError> {
        let target = samples_for_duration(duration, self.backend.sample_rate).max(1);
        let mut window = std::mem::take(&mut self.carry);

        loop {
            if stop.load(Ordering::SeqCst) {
                crate::trace!("[capture] Window interrupted with {} samples", window.len());
                return Ok(WindowCapture::Interrupted);
            }

            if let Some(reason) = self.backend.lost_reason() {
                return Err(CaptureError::DeviceLost(reason));
            }

            window.extend(self.backend.buffer.drain_samples());

            if window.len() >= target {
                self.carry = window.split_off(target);
                let encoded = encode_wav_bytes(&window, self.backend.sample_rate)
                    .map_err(|e| CaptureError::Io(e.to_string()))?;
                return Ok(WindowCapture::Completed(encoded));
            }

            thread::sleep(self.backend.poll_interval);
        }
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        crate::debug!("[capture] Push session released");
    }
}
