// Shutdown coordination for the command-line host
// Ctrl-C sets a flag that long-running commands poll between waits

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag set once the process has been asked to exit
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal wired to Ctrl-C (SIGINT)
    ///
    /// If the handler cannot be installed the signal still works, it just
    /// never fires on its own.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn install_ctrlc() -> Self {
        let signal = Self::new();
        let handler_signal = signal.clone();
        if let Err(e) = ctrlc::set_handler(move || handler_signal.request()) {
            crate::warn!("Failed to set Ctrl+C handler: {}", e);
        }
        signal
    }

    /// Signal that the process is shutting down
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            crate::info!("Shutdown requested");
        }
    }

    /// Returns true after `request()` has been called on any clone
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
