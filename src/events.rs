// Detection events and the alert dispatch boundary
// Defines the event value, its serializable payload, and dispatcher implementations

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::audio_constants::EVENT_CHANNEL_BUFFER_SIZE;
use crate::library::ReferenceSound;

/// A window matched a reference
///
/// Produced once per matching window and handed straight to the alert
/// dispatcher; nothing keeps it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    /// The first reference, in scan order, that met the threshold
    pub reference: ReferenceSound,
    /// Raw similarity score of the window against that reference
    pub score: f64,
    /// When the match was decided
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    pub fn new(reference: ReferenceSound, score: f64) -> Self {
        Self {
            reference,
            score,
            timestamp: Utc::now(),
        }
    }

    /// Score as a whole percentage, for display
    pub fn score_percent(&self) -> i64 {
        (self.score * 100.0).round() as i64
    }

    /// One-line human readable description
    pub fn summary(&self) -> String {
        format!(
            "Detected '{}' (similarity {}%)",
            self.reference.name(),
            self.score_percent()
        )
    }

    pub fn payload(&self) -> DetectionPayload {
        DetectionPayload::from(self)
    }
}

/// Serializable form of a detection, for hosts that forward alerts
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionPayload {
    /// Id of the matched reference
    pub reference_id: u64,
    /// Display name of the matched reference
    pub reference_name: String,
    /// Raw similarity score
    pub score: f64,
    /// ISO 8601 timestamp of the detection
    pub timestamp: String,
}

impl From<&DetectionEvent> for DetectionPayload {
    fn from(event: &DetectionEvent) -> Self {
        Self {
            reference_id: event.reference.id(),
            reference_name: event.reference.name().to_string(),
            score: event.score,
            timestamp: event.timestamp.to_rfc3339(),
        }
    }
}

/// Trait for the alert dispatcher
///
/// Receives exactly one call per detection. Delivery is the dispatcher's
/// concern; the caller neither retries nor waits for confirmation.
/// Allows mocking in tests while hosts plug in real notification channels.
pub trait AlertDispatcher: Send + Sync {
    fn dispatch(&self, event: DetectionEvent);
}

/// Dispatcher that writes each detection to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertDispatcher;

impl AlertDispatcher for LogAlertDispatcher {
    fn dispatch(&self, event: DetectionEvent) {
        crate::info!("[alert] {} at {}", event.summary(), event.timestamp.to_rfc3339());
    }
}

/// Dispatcher that forwards detections into a bounded channel
///
/// Uses `try_send` so the segmentation loop never blocks on a slow
/// consumer; when the channel is full or closed the event is dropped with
/// a warning.
#[derive(Debug, Clone)]
pub struct ChannelAlertDispatcher {
    tx: mpsc::Sender<DetectionEvent>,
}

impl ChannelAlertDispatcher {
    /// Create a dispatcher and the receiver that will get its events
    pub fn new() -> (Self, mpsc::Receiver<DetectionEvent>) {
        Self::with_capacity(EVENT_CHANNEL_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<DetectionEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl AlertDispatcher for ChannelAlertDispatcher {
    fn dispatch(&self, event: DetectionEvent) {
        if let Err(e) = self.tx.try_send(event) {
            crate::warn!(
                "[alert] Failed to send detection event: {} (channel full or closed)",
                e
            );
        }
    }
}

/// Dispatcher that forwards each detection to several dispatchers in order
#[derive(Default, Clone)]
pub struct FanoutDispatcher {
    targets: Vec<Arc<dyn AlertDispatcher>>,
}

impl FanoutDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: Arc<dyn AlertDispatcher>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl AlertDispatcher for FanoutDispatcher {
    fn dispatch(&self, event: DetectionEvent) {
        for target in &self.targets {
            target.dispatch(event.clone());
        }
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
pub(crate) mod tests;
