// Capture backend that replays a WAV file as back-to-back windows
// Used by the command-line host and for offline evaluation of recordings

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::{
    encode_wav_bytes, read_wav_file, samples_for_duration, CaptureBackend, CaptureError,
    CaptureSession, DecodedAudio, WindowCapture,
};
use crate::audio_constants::CAPTURE_POLL_INTERVAL_MS;

/// Replays a WAV file through the capture interface
///
/// The file is read when a session opens. Each window takes the next
/// `duration` worth of samples; the final window may be shorter. Once
/// the file is exhausted the session fails with `SourceExhausted`.
#[derive(Debug, Clone)]
pub struct WavFileBackend {
    path: PathBuf,
    realtime: bool,
}

impl WavFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            realtime: false,
        }
    }

    /// Pace windows at wall-clock speed, as a live device would
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureBackend for WavFileBackend {
    fn open_session(&self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        let audio = read_wav_file(&self.path).map_err(|e| CaptureError::Io(e.to_string()))?;
        crate::debug!(
            "[capture] Replaying {} ({:.2}s at {} Hz)",
            self.path.display(),
            audio.duration_secs(),
            audio.sample_rate
        );
        Ok(Box::new(FileSession {
            audio,
            position: 0,
            realtime: self.realtime,
        }))
    }
}

struct FileSession {
    audio: DecodedAudio,
    position: usize,
    realtime: bool,
}

impl CaptureSession for FileSession {
    fn capture_window(
        &mut self,
        duration: Duration,
        stop: &AtomicBool,
    ) -> Result<WindowCapture, CaptureError> {
        if self.position >= self.audio.samples.len() {
            return Err(CaptureError::SourceExhausted);
        }

        let target = samples_for_duration(duration, self.audio.sample_rate).max(1);
        let end = (self.position + target).min(self.audio.samples.len());

        if self.realtime {
            let deadline = Instant::now() + duration;
            while Instant::now() < deadline {
                if stop.load(Ordering::SeqCst) {
                    return Ok(WindowCapture::Interrupted);
                }
                thread::sleep(Duration::from_millis(CAPTURE_POLL_INTERVAL_MS));
            }
        }
        if stop.load(Ordering::SeqCst) {
            return Ok(WindowCapture::Interrupted);
        }

        let window = &self.audio.samples[self.position..end];
        let encoded = encode_wav_bytes(window, self.audio.sample_rate)
            .map_err(|e| CaptureError::Io(e.to_string()))?;
        self.position = end;
        Ok(WindowCapture::Completed(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioDecoder, WavDecoder};

    fn write_wav(dir: &tempfile::TempDir, samples: &[f32], sample_rate: u32) -> PathBuf {
        let path = dir.path().join("input.wav");
        let encoded = encode_wav_bytes(samples, sample_rate).unwrap();
        std::fs::write(&path, encoded.bytes).unwrap();
        path
    }

    #[test]
    fn test_windows_cover_file_then_exhaust() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_wav(&dir, &vec![0.2; 250], 1000);
        let backend = WavFileBackend::new(&path);
        let mut session = backend.open_session().unwrap();
        let stop = AtomicBool::new(false);

        let mut lengths = Vec::new();
        loop {
            match session.capture_window(Duration::from_millis(100), &stop) {
                Ok(WindowCapture::Completed(encoded)) => {
                    lengths.push(WavDecoder.decode(&encoded).unwrap().samples.len());
                }
                Ok(WindowCapture::Interrupted) => panic!("not stopped"),
                Err(e) => {
                    assert_eq!(e, CaptureError::SourceExhausted);
                    break;
                }
            }
        }
        assert_eq!(lengths, vec![100, 100, 50]);
    }

    #[test]
    fn test_stop_flag_interrupts() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_wav(&dir, &vec![0.2; 250], 1000);
        let mut session = WavFileBackend::new(&path).realtime(true).open_session().unwrap();

        let stop = AtomicBool::new(true);
        let capture = session.capture_window(Duration::from_secs(10), &stop).unwrap();
        assert_eq!(capture, WindowCapture::Interrupted);
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = WavFileBackend::new(dir.path().join("nope.wav"));
        assert!(matches!(backend.open_session(), Err(CaptureError::Io(_))));
    }
}
