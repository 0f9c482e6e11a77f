use super::*;
use crate::events::{AlertDispatcher, DetectionEvent, DetectionPayload};
use crate::features::FeatureVector;
use crate::library::ReferenceLibrary;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Store that keeps addresses in memory and can be told to fail writes
#[derive(Default)]
struct MockStore {
    saved: Mutex<Vec<String>>,
    fail_saves: AtomicBool,
}

impl ContactStore for Arc<MockStore> {
    fn load(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, addresses: &[String]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Persist("read-only".to_string()));
        }
        *self.saved.lock() = addresses.to_vec();
        Ok(())
    }
}

/// Notifier that records every (contact, reference name) pair
#[derive(Default)]
struct MockNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: Option<String>,
}

impl ContactNotifier for MockNotifier {
    fn notify(&self, contact: &str, payload: &DetectionPayload) -> Result<(), NotifyError> {
        if self.failing.as_deref() == Some(contact) {
            return Err(NotifyError {
                contact: contact.to_string(),
                reason: "mailbox full".to_string(),
            });
        }
        self.sent
            .lock()
            .push((contact.to_string(), payload.reference_name.clone()));
        Ok(())
    }
}

fn detection(name: &str) -> DetectionEvent {
    let library = ReferenceLibrary::new();
    let reference = library
        .register(
            name,
            FeatureVector {
                energy: 0.4,
                zcr: 0.2,
                peak: 0.7,
                duration: 2.0,
            },
        )
        .unwrap();
    DetectionEvent::new(reference, 0.9)
}

// =============================================================================
// Add / remove / list
// =============================================================================

#[test]
fn test_add_trims_and_keeps_order() {
    let contacts = ContactList::new();
    assert_eq!(contacts.add("  ops@example.com ").unwrap(), "ops@example.com");
    contacts.add("night-shift@example.com").unwrap();

    assert_eq!(
        contacts.list(),
        vec!["ops@example.com", "night-shift@example.com"]
    );
}

#[test]
fn test_add_rejects_invalid_addresses() {
    let contacts = ContactList::new();
    for bad in ["", "   ", "no-at-sign", "two words@example.com"] {
        assert!(matches!(
            contacts.add(bad),
            Err(ContactError::InvalidAddress(_))
        ));
    }
    assert!(contacts.is_empty());
}

#[test]
fn test_add_rejects_duplicates_ignoring_case() {
    let contacts = ContactList::new();
    contacts.add("ops@example.com").unwrap();

    assert_eq!(
        contacts.add("OPS@Example.com"),
        Err(ContactError::Duplicate("OPS@Example.com".to_string()))
    );
    assert_eq!(contacts.len(), 1);
}

#[test]
fn test_remove_known_and_unknown() {
    let contacts = ContactList::new();
    contacts.add("a@example.com").unwrap();
    contacts.add("b@example.com").unwrap();

    assert!(contacts.remove(" A@example.com").unwrap());
    assert!(!contacts.remove("a@example.com").unwrap());
    assert_eq!(contacts.list(), vec!["b@example.com"]);
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_changes_are_written_through() {
    let store = Arc::new(MockStore::default());
    let contacts = ContactList::open(Box::new(store.clone())).unwrap();

    contacts.add("a@example.com").unwrap();
    contacts.add("b@example.com").unwrap();
    assert_eq!(*store.saved.lock(), vec!["a@example.com", "b@example.com"]);

    contacts.remove("a@example.com").unwrap();
    assert_eq!(*store.saved.lock(), vec!["b@example.com"]);
}

#[test]
fn test_failed_save_leaves_list_unchanged() {
    let store = Arc::new(MockStore::default());
    let contacts = ContactList::open(Box::new(store.clone())).unwrap();
    contacts.add("a@example.com").unwrap();

    store.fail_saves.store(true, Ordering::SeqCst);
    assert!(matches!(
        contacts.add("b@example.com"),
        Err(ContactError::Store(_))
    ));
    assert!(matches!(
        contacts.remove("a@example.com"),
        Err(ContactError::Store(_))
    ));
    assert_eq!(contacts.list(), vec!["a@example.com"]);
}

#[test]
fn test_open_skips_invalid_and_repeated_entries() {
    let store = Arc::new(MockStore::default());
    *store.saved.lock() = vec![
        "a@example.com".to_string(),
        "not an address".to_string(),
        "A@EXAMPLE.COM".to_string(),
        "b@example.com".to_string(),
    ];

    let contacts = ContactList::open(Box::new(store)).unwrap();
    assert_eq!(contacts.list(), vec!["a@example.com", "b@example.com"]);
}

#[test]
fn test_json_store_persist_and_reload() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("contacts.json");

    let contacts = ContactList::open(Box::new(JsonContactStore::new(&path))).unwrap();
    assert!(contacts.is_empty());
    contacts.add("ops@example.com").unwrap();
    contacts.add("home@example.com").unwrap();
    assert!(!path.with_extension("tmp").exists());

    let reopened = ContactList::open(Box::new(JsonContactStore::new(&path))).unwrap();
    assert_eq!(reopened.list(), vec!["ops@example.com", "home@example.com"]);
}

#[test]
fn test_json_store_corrupt_file_fails_to_open() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("contacts.json");
    std::fs::write(&path, "{ not a list").unwrap();

    assert!(matches!(
        ContactList::open(Box::new(JsonContactStore::new(&path))),
        Err(ContactError::Store(StoreError::Load(_)))
    ));
}

// =============================================================================
// Dispatch
// =============================================================================

#[test]
fn test_dispatcher_notifies_every_contact() {
    let contacts = Arc::new(ContactList::new());
    contacts.add("a@example.com").unwrap();
    contacts.add("b@example.com").unwrap();
    let notifier = Arc::new(MockNotifier::default());
    let dispatcher = ContactAlertDispatcher::new(contacts, notifier.clone());

    dispatcher.dispatch(detection("Front door"));

    assert_eq!(
        *notifier.sent.lock(),
        vec![
            ("a@example.com".to_string(), "Front door".to_string()),
            ("b@example.com".to_string(), "Front door".to_string()),
        ]
    );
}

#[test]
fn test_dispatcher_continues_past_failed_contact() {
    let contacts = Arc::new(ContactList::new());
    contacts.add("a@example.com").unwrap();
    contacts.add("b@example.com").unwrap();
    let notifier = Arc::new(MockNotifier {
        failing: Some("a@example.com".to_string()),
        ..Default::default()
    });
    let dispatcher = ContactAlertDispatcher::new(contacts, notifier.clone());

    dispatcher.dispatch(detection("Chime"));

    assert_eq!(
        *notifier.sent.lock(),
        vec![("b@example.com".to_string(), "Chime".to_string())]
    );
}

#[test]
fn test_dispatcher_reads_list_at_dispatch_time() {
    let contacts = Arc::new(ContactList::new());
    let notifier = Arc::new(MockNotifier::default());
    let dispatcher = ContactAlertDispatcher::new(contacts.clone(), notifier.clone());

    dispatcher.dispatch(detection("Chime"));
    assert!(notifier.sent.lock().is_empty());

    contacts.add("late@example.com").unwrap();
    dispatcher.dispatch(detection("Chime"));
    assert_eq!(notifier.sent.lock().len(), 1);
}
