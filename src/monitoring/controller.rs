// Detection controller - owns the monitoring lifecycle
// Single entry point for start/stop, sensitivity and status

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::segmentation::{segmentation_thread_main, LoopContext};
use super::state::{MonitorShared, MonitoringState};
use crate::audio::{AudioDecoder, CaptureBackend, CaptureError};
use crate::config::DetectorConfig;
use crate::events::AlertDispatcher;
use crate::library::ReferenceLibrary;

/// Errors from controller lifecycle operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControllerError {
    /// Start was called while a session is running
    #[error("Monitoring is already active")]
    AlreadyActive,
    /// Start was called with nothing to match against
    #[error("No reference sounds registered")]
    NoReferences,
    /// The capture backend could not open a session
    #[error("Failed to open capture session: {0}")]
    Capture(#[from] CaptureError),
}

/// Snapshot of the controller for hosts and the CLI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    pub state: MonitoringState,
    pub sensitivity: f64,
    pub reference_count: usize,
    /// Windows that reached evaluation in the current or last session
    pub windows_evaluated: u64,
    /// Detections dispatched in the current or last session
    pub detections: u64,
    /// Peak amplitude of the most recent decoded window
    pub last_level: Option<f64>,
    /// Why the last session ended on its own, if it did
    pub last_interruption: Option<String>,
}

/// Handle to a running (or recently stopped) loop thread
struct LoopHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    /// Receives once the loop thread has fully exited
    exit_rx: Receiver<()>,
}

impl LoopHandle {
    /// Wait for the thread to exit and join it
    ///
    /// Never joins from the loop thread itself (a dispatcher may call
    /// `stop()` from inside a detection).
    fn wait_for_exit(mut self, timeout: Duration) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        if thread.thread().id() == thread::current().id() {
            crate::debug!("[controller] Stop requested from loop thread, not waiting");
            return;
        }

        match self.exit_rx.recv_timeout(timeout) {
            Ok(()) => {
                crate::debug!("[controller] Loop thread exit confirmed");
                let _ = thread.join();
            }
            Err(RecvTimeoutError::Disconnected) => {
                crate::debug!("[controller] Loop thread already exited (channel disconnected)");
                let _ = thread.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                // The handle is dropped; the stop flag is set so the thread exits on its own
                crate::warn!(
                    "[controller] Timeout waiting for loop thread to exit ({}ms)",
                    timeout.as_millis()
                );
            }
        }
    }
}

/// Owns the single monitoring session
///
/// All methods take `&self`, so the controller can be shared behind an `Arc`
/// between the operator and whatever reacts to alerts.
pub struct DetectionController {
    library: Arc<ReferenceLibrary>,
    capture: Arc<dyn CaptureBackend>,
    decoder: Arc<dyn AudioDecoder>,
    dispatcher: Arc<dyn AlertDispatcher>,
    config: DetectorConfig,
    shared: Arc<MonitorShared>,
    current: Mutex<Option<LoopHandle>>,
}

impl DetectionController {
    pub fn new(
        library: Arc<ReferenceLibrary>,
        capture: Arc<dyn CaptureBackend>,
        decoder: Arc<dyn AudioDecoder>,
        dispatcher: Arc<dyn AlertDispatcher>,
        config: DetectorConfig,
    ) -> Self {
        let shared = Arc::new(MonitorShared::new(config.sensitivity));
        Self {
            library,
            capture,
            decoder,
            dispatcher,
            config,
            shared,
            current: Mutex::new(None),
        }
    }

    /// Start monitoring
    ///
    /// # Errors
    /// - `AlreadyActive` if a session is running
    /// - `NoReferences` if the library is empty
    /// - `Capture` if the backend cannot open a session
    ///
    /// The state is left at `Idle` on every error except `AlreadyActive`.
    pub fn start(&self) -> Result<(), ControllerError> {
        let mut current = self.current.lock();

        if self.shared.state().is_active() {
            crate::debug!("[controller] Start called but already active");
            return Err(ControllerError::AlreadyActive);
        }

        // Wait for a previous loop thread to fully exit before starting a new one
        if let Some(previous) = current.take() {
            crate::debug!("[controller] Waiting for previous loop thread to exit...");
            previous.wait_for_exit(self.config.exit_timeout());
        }

        let session = self
            .shared
            .begin_session(|| {
                if self.library.is_empty() {
                    return Err(ControllerError::NoReferences);
                }
                Ok(self.capture.open_session()?)
            })
            .ok_or(ControllerError::AlreadyActive)??;

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = LoopContext {
            library: Arc::clone(&self.library),
            decoder: Arc::clone(&self.decoder),
            dispatcher: Arc::clone(&self.dispatcher),
            shared: Arc::clone(&self.shared),
            stop: Arc::clone(&stop),
            window: self.config.window_duration(),
        };

        let (exit_tx, exit_rx) = mpsc::channel();
        let thread = thread::spawn(move || {
            segmentation_thread_main(ctx, session);
            // Signal that thread has exited
            let _ = exit_tx.send(());
        });

        *current = Some(LoopHandle {
            stop,
            thread: Some(thread),
            exit_rx,
        });

        crate::info!(
            "[controller] Monitoring started, references={}, sensitivity={:.2}, window={}ms",
            self.library.len(),
            self.sensitivity(),
            self.config.window_duration_ms
        );
        Ok(())
    }

    /// Stop monitoring
    ///
    /// Idempotent: always leaves the state at `Idle`, and calling it while
    /// idle does nothing else. An in-flight window is discarded.
    pub fn stop(&self) {
        let Some(handle) = self.current.lock().take() else {
            crate::debug!("[controller] Stop called but not active");
            return;
        };

        if self.shared.stop_session(&handle.stop) {
            crate::info!("[controller] Monitoring stopped");
        }
        handle.wait_for_exit(self.config.exit_timeout());
    }

    /// Set the sensitivity threshold, clamped to [0, 1]
    ///
    /// Takes effect from the next comparison. Returns the stored value.
    pub fn set_sensitivity(&self, value: f64) -> f64 {
        let stored = self.shared.sensitivity.set(value);
        if stored != value {
            crate::debug!("[controller] Sensitivity {} clamped to {}", value, stored);
        }
        stored
    }

    pub fn sensitivity(&self) -> f64 {
        self.shared.sensitivity.get()
    }

    pub fn state(&self) -> MonitoringState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn library(&self) -> &Arc<ReferenceLibrary> {
        &self.library
    }

    pub fn status(&self) -> MonitoringStatus {
        MonitoringStatus {
            state: self.state(),
            sensitivity: self.sensitivity(),
            reference_count: self.library.len(),
            windows_evaluated: self.shared.windows_evaluated(),
            detections: self.shared.detections(),
            last_level: self.shared.last_level(),
            last_interruption: self.shared.last_interruption(),
        }
    }

    /// Block until monitoring is idle or `timeout` elapses
    ///
    /// Returns whether the state is `Idle`.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.shared.wait_until_idle(timeout)
    }
}

impl Drop for DetectionController {
    fn drop(&mut self) {
        // Signal stop but don't wait - the thread will exit on its own
        if let Some(handle) = self.current.get_mut().take() {
            self.shared.stop_session(&handle.stop);
        }
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
