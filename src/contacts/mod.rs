// Alert contacts - the addresses a detection is forwarded to
// Kept in insertion order and written through to storage on every change

mod dispatch;
mod store;
pub use dispatch::{ContactAlertDispatcher, ContactNotifier, LogContactNotifier, NotifyError};
pub use store::{ContactStore, JsonContactStore};

use parking_lot::{Mutex, RwLock};

use crate::library::StoreError;

/// Errors from contact list operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContactError {
    /// The address is empty, has no '@' or contains whitespace
    #[error("Invalid contact address: '{0}'")]
    InvalidAddress(String),
    /// The address is already on the list
    #[error("Contact already added: {0}")]
    Duplicate(String),
    #[error("Contact storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Ordered list of alert contact addresses
///
/// Addresses are trimmed on the way in and compared case-insensitively,
/// so "Ops@Example.com" and "ops@example.com" are the same contact.
pub struct ContactList {
    entries: RwLock<Vec<String>>,
    store: Mutex<Option<Box<dyn ContactStore>>>,
}

impl ContactList {
    /// Create an empty in-memory list
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            store: Mutex::new(None),
        }
    }

    /// Open a list backed by `store`
    ///
    /// Stored entries that are invalid or repeat an earlier address are
    /// skipped with a warning.
    pub fn open(store: Box<dyn ContactStore>) -> Result<Self, ContactError> {
        let mut entries: Vec<String> = Vec::new();
        for address in store.load()? {
            match normalize(&address) {
                Ok(address) if !contains(&entries, &address) => entries.push(address),
                _ => crate::warn!("[contacts] Skipping stored contact '{}'", address),
            }
        }
        crate::info!("[contacts] Loaded {} contacts", entries.len());

        Ok(Self {
            entries: RwLock::new(entries),
            store: Mutex::new(Some(store)),
        })
    }

    /// Add an address to the end of the list and return it as stored
    pub fn add(&self, address: &str) -> Result<String, ContactError> {
        let address = normalize(address)?;

        let store = self.store.lock();
        let mut entries = self.entries.write();
        if contains(&entries, &address) {
            return Err(ContactError::Duplicate(address));
        }

        let mut updated = entries.clone();
        updated.push(address.clone());
        if let Some(store) = store.as_ref() {
            store.save(&updated)?;
        }
        *entries = updated;

        crate::info!("[contacts] Added {}", address);
        Ok(address)
    }

    /// Remove an address; returns whether it was on the list
    pub fn remove(&self, address: &str) -> Result<bool, ContactError> {
        let address = address.trim();

        let store = self.store.lock();
        let mut entries = self.entries.write();
        if !contains(&entries, address) {
            crate::debug!("[contacts] Remove ignored, {} is not a contact", address);
            return Ok(false);
        }

        let updated: Vec<String> = entries
            .iter()
            .filter(|e| !e.eq_ignore_ascii_case(address))
            .cloned()
            .collect();
        if let Some(store) = store.as_ref() {
            store.save(&updated)?;
        }
        *entries = updated;

        crate::info!("[contacts] Removed {}", address);
        Ok(true)
    }

    /// Snapshot of every address in insertion order
    pub fn list(&self) -> Vec<String> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for ContactList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContactList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactList")
            .field("len", &self.len())
            .finish()
    }
}

/// Trim and validate an address
fn normalize(address: &str) -> Result<String, ContactError> {
    let address = address.trim();
    if address.is_empty() || !address.contains('@') || address.contains(char::is_whitespace) {
        return Err(ContactError::InvalidAddress(address.to_string()));
    }
    Ok(address.to_string())
}

fn contains(entries: &[String], address: &str) -> bool {
    entries.iter().any(|e| e.eq_ignore_ascii_case(address))
}

#[cfg(test)]
#[path = "contacts_test.rs"]
mod tests;
