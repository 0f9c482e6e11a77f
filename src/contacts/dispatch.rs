// Fans each detection out to every alert contact

use std::sync::Arc;

use super::ContactList;
use crate::events::{AlertDispatcher, DetectionEvent, DetectionPayload};

/// A single contact could not be notified
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to notify {contact}: {reason}")]
pub struct NotifyError {
    pub contact: String,
    pub reason: String,
}

/// Delivers one detection to one contact (mail, push, webhook...)
pub trait ContactNotifier: Send + Sync {
    fn notify(&self, contact: &str, payload: &DetectionPayload) -> Result<(), NotifyError>;
}

/// Notifier that only logs what would be sent
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContactNotifier;

impl ContactNotifier for LogContactNotifier {
    fn notify(&self, contact: &str, payload: &DetectionPayload) -> Result<(), NotifyError> {
        crate::info!(
            "[alert] Notify {}: '{}' detected at {}",
            contact,
            payload.reference_name,
            payload.timestamp
        );
        Ok(())
    }
}

/// Dispatcher that sends each detection to every contact on the list
///
/// The list is read at dispatch time, so contacts added while monitoring
/// runs receive later alerts. A failure for one contact is logged and does
/// not stop the others.
pub struct ContactAlertDispatcher {
    contacts: Arc<ContactList>,
    notifier: Arc<dyn ContactNotifier>,
}

impl ContactAlertDispatcher {
    pub fn new(contacts: Arc<ContactList>, notifier: Arc<dyn ContactNotifier>) -> Self {
        Self { contacts, notifier }
    }
}

impl AlertDispatcher for ContactAlertDispatcher {
    fn dispatch(&self, event: DetectionEvent) {
        let contacts = self.contacts.list();
        if contacts.is_empty() {
            crate::debug!("[alert] No contacts configured");
            return;
        }

        let payload = event.payload();
        let mut delivered = 0;
        for contact in &contacts {
            match self.notifier.notify(contact, &payload) {
                Ok(()) => delivered += 1,
                Err(e) => crate::warn!("[alert] {}", e),
            }
        }
        crate::info!(
            "[alert] Notified {} of {} contacts",
            delivered,
            contacts.len()
        );
    }
}
