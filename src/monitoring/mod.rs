// Monitoring module for continuous chime detection
// Provides the DetectionController and the segmentation loop it drives

mod controller;
mod segmentation;
mod state;

pub use controller::{ControllerError, DetectionController, MonitoringStatus};
pub use segmentation::{evaluate_window, first_match, WindowOutcome};
pub use state::{MonitoringState, Sensitivity};
