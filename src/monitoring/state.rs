// Monitoring state shared between the controller and its loop thread

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::clamp_sensitivity;

/// Where the detector is in its capture/evaluate cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MonitoringState {
    /// Not monitoring
    #[default]
    Idle,
    /// Collecting samples for the current window
    Capturing,
    /// Extracting features and scanning references for a completed window
    Evaluating,
}

impl MonitoringState {
    pub fn is_active(&self) -> bool {
        !matches!(self, MonitoringState::Idle)
    }
}

/// Sensitivity threshold readable from any thread without locking
///
/// Stored as the bit pattern of an `f64`; always within [0, 1].
#[derive(Debug)]
pub struct Sensitivity {
    bits: AtomicU64,
}

impl Sensitivity {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(clamp_sensitivity(value).to_bits()),
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Store `value` clamped to [0, 1] and return what was stored
    pub fn set(&self, value: f64) -> f64 {
        let clamped = clamp_sensitivity(value);
        self.bits.store(clamped.to_bits(), Ordering::Relaxed);
        clamped
    }
}

/// State shared by the controller and the segmentation loop
///
/// Each session carries its own stop flag. The flag is only ever set while
/// holding the state lock and state changes from the loop check it under the
/// same lock, so a session that has been stopped can never move the state
/// away from `Idle` again.
pub(crate) struct MonitorShared {
    state: Mutex<MonitoringState>,
    idle: Condvar,
    pub(crate) sensitivity: Sensitivity,
    windows_evaluated: AtomicU64,
    detections: AtomicU64,
    last_level: Mutex<Option<f64>>,
    last_interruption: Mutex<Option<String>>,
}

impl MonitorShared {
    pub(crate) fn new(sensitivity: f64) -> Self {
        Self {
            state: Mutex::new(MonitoringState::Idle),
            idle: Condvar::new(),
            sensitivity: Sensitivity::new(sensitivity),
            windows_evaluated: AtomicU64::new(0),
            detections: AtomicU64::new(0),
            last_level: Mutex::new(None),
            last_interruption: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> MonitoringState {
        *self.state.lock()
    }

    /// Run `open` and enter `Capturing` if monitoring is idle
    ///
    /// The state lock is held across `open`, so concurrent starts cannot both
    /// succeed. Returns `None` without calling `open` when already active.
    pub(crate) fn begin_session<T, E>(
        &self,
        open: impl FnOnce() -> Result<T, E>,
    ) -> Option<Result<T, E>> {
        let mut state = self.state.lock();
        if state.is_active() {
            return None;
        }

        let opened = open();
        if opened.is_ok() {
            *state = MonitoringState::Capturing;
            self.windows_evaluated.store(0, Ordering::SeqCst);
            self.detections.store(0, Ordering::SeqCst);
            *self.last_level.lock() = None;
            *self.last_interruption.lock() = None;
        }
        Some(opened)
    }

    /// Move the session to `next` unless it has been stopped
    pub(crate) fn advance(&self, stop: &AtomicBool, next: MonitoringState) -> bool {
        let mut state = self.state.lock();
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        *state = next;
        true
    }

    /// Stop a session and return to `Idle`
    ///
    /// Returns whether the state was active before the call.
    pub(crate) fn stop_session(&self, stop: &AtomicBool) -> bool {
        let mut state = self.state.lock();
        stop.store(true, Ordering::SeqCst);
        let was_active = state.is_active();
        *state = MonitoringState::Idle;
        self.idle.notify_all();
        was_active
    }

    /// Called by the loop as it exits
    ///
    /// A session ending on its own (capture loss) goes to `Idle` here and
    /// records why; a session that was stopped has already been moved there.
    pub(crate) fn finish_session(&self, stop: &AtomicBool, interruption: Option<String>) {
        let mut state = self.state.lock();
        if stop.swap(true, Ordering::SeqCst) {
            return;
        }
        *state = MonitoringState::Idle;
        if interruption.is_some() {
            *self.last_interruption.lock() = interruption;
        }
        self.idle.notify_all();
    }

    /// Block until the state is `Idle` or `timeout` elapses
    pub(crate) fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.is_active() {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return !state.is_active();
            }
        }
        true
    }

    pub(crate) fn record_window(&self, level: Option<f64>) {
        self.windows_evaluated.fetch_add(1, Ordering::SeqCst);
        if level.is_some() {
            *self.last_level.lock() = level;
        }
    }

    pub(crate) fn record_detection(&self) {
        self.detections.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn windows_evaluated(&self) -> u64 {
        self.windows_evaluated.load(Ordering::SeqCst)
    }

    pub(crate) fn detections(&self) -> u64 {
        self.detections.load(Ordering::SeqCst)
    }

    pub(crate) fn last_level(&self) -> Option<f64> {
        *self.last_level.lock()
    }

    pub(crate) fn last_interruption(&self) -> Option<String> {
        self.last_interruption.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitivity_clamps() {
        let sensitivity = Sensitivity::new(3.0);
        assert_eq!(sensitivity.get(), 1.0);
        assert_eq!(sensitivity.set(-0.2), 0.0);
        assert_eq!(sensitivity.set(0.42), 0.42);
        assert_eq!(sensitivity.get(), 0.42);
    }

    #[test]
    fn test_begin_session_refuses_when_active() {
        let shared = MonitorShared::new(0.75);
        let first: Option<Result<(), ()>> = shared.begin_session(|| Ok(()));
        assert_eq!(first, Some(Ok(())));
        assert_eq!(shared.state(), MonitoringState::Capturing);

        let mut called = false;
        let second: Option<Result<(), ()>> = shared.begin_session(|| {
            called = true;
            Ok(())
        });
        assert!(second.is_none());
        assert!(!called);
    }

    #[test]
    fn test_failed_open_stays_idle() {
        let shared = MonitorShared::new(0.75);
        let result: Option<Result<(), &str>> = shared.begin_session(|| Err("no device"));
        assert_eq!(result, Some(Err("no device")));
        assert_eq!(shared.state(), MonitoringState::Idle);
    }

    #[test]
    fn test_stopped_session_cannot_advance() {
        let shared = MonitorShared::new(0.75);
        let stop = AtomicBool::new(false);
        let _: Option<Result<(), ()>> = shared.begin_session(|| Ok(()));

        assert!(shared.advance(&stop, MonitoringState::Evaluating));
        assert!(shared.stop_session(&stop));
        assert!(!shared.advance(&stop, MonitoringState::Capturing));
        assert_eq!(shared.state(), MonitoringState::Idle);

        // Stopping again reports it was already idle
        assert!(!shared.stop_session(&stop));
    }

    #[test]
    fn test_finish_records_interruption_once() {
        let shared = MonitorShared::new(0.75);
        let stop = AtomicBool::new(false);
        let _: Option<Result<(), ()>> = shared.begin_session(|| Ok(()));

        shared.finish_session(&stop, Some("device lost".to_string()));
        assert_eq!(shared.state(), MonitoringState::Idle);
        assert_eq!(shared.last_interruption().as_deref(), Some("device lost"));
    }

    #[test]
    fn test_finish_after_stop_keeps_state() {
        let shared = MonitorShared::new(0.75);
        let stop = AtomicBool::new(false);
        let _: Option<Result<(), ()>> = shared.begin_session(|| Ok(()));

        shared.stop_session(&stop);
        shared.finish_session(&stop, Some("late".to_string()));
        assert!(shared.last_interruption().is_none());
    }

    #[test]
    fn test_wait_until_idle_times_out_while_active() {
        let shared = MonitorShared::new(0.75);
        assert!(shared.wait_until_idle(Duration::from_millis(1)));

        let _: Option<Result<(), ()>> = shared.begin_session(|| Ok(()));
        assert!(!shared.wait_until_idle(Duration::from_millis(20)));
    }
}
