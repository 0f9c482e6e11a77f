// Durable storage for the alert contact list

use std::fs;
use std::path::{Path, PathBuf};

use crate::library::{write_json_atomic, StoreError};

/// Storage backend for the contact list (allows mocking in tests)
pub trait ContactStore: Send + Sync {
    /// Load every stored address in list order
    fn load(&self) -> Result<Vec<String>, StoreError>;

    /// Replace the stored addresses
    fn save(&self, addresses: &[String]) -> Result<(), StoreError>;
}

/// Stores addresses as a JSON array of strings in a single file
#[derive(Debug, Clone)]
pub struct JsonContactStore {
    path: PathBuf,
}

impl JsonContactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContactStore for JsonContactStore {
    fn load(&self) -> Result<Vec<String>, StoreError> {
        if !self.path.exists() {
            crate::debug!("[contacts] No contacts file at {:?}", self.path);
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| StoreError::Load(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| StoreError::Load(e.to_string()))
    }

    fn save(&self, addresses: &[String]) -> Result<(), StoreError> {
        crate::debug!(
            "[contacts] Persisting {} contacts to {:?}",
            addresses.len(),
            self.path
        );
        write_json_atomic(&self.path, addresses)
    }
}
