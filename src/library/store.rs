// Durable storage for the reference library

use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::ReferenceSound;

/// Errors from reading or writing a JSON store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Failed to load stored data
    #[error("Failed to load: {0}")]
    Load(String),
    /// Failed to persist data
    #[error("Failed to persist: {0}")]
    Persist(String),
}

/// Storage backend for the reference library (allows mocking in tests)
///
/// The library pushes its full ordered contents on every change, so
/// implementations only need whole-list load and save.
pub trait ReferenceStore: Send + Sync {
    /// Load every stored reference in scan order
    fn load(&self) -> Result<Vec<ReferenceSound>, StoreError>;

    /// Replace the stored references
    fn save(&self, references: &[ReferenceSound]) -> Result<(), StoreError>;
}

/// Stores references as a pretty-printed JSON array in a single file
#[derive(Debug, Clone)]
pub struct JsonReferenceStore {
    path: PathBuf,
}

impl JsonReferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReferenceStore for JsonReferenceStore {
    fn load(&self) -> Result<Vec<ReferenceSound>, StoreError> {
        crate::debug!("[library] Loading references from {:?}", self.path);

        if !self.path.exists() {
            crate::debug!("[library] No references file found, starting with empty library");
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| StoreError::Load(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| StoreError::Load(e.to_string()))
    }

    /// Persist using atomic write (temp file + rename)
    fn save(&self, references: &[ReferenceSound]) -> Result<(), StoreError> {
        crate::debug!(
            "[library] Persisting {} references to {:?}",
            references.len(),
            self.path
        );

        write_json_atomic(&self.path, references)
    }
}

/// Write `value` as pretty JSON (temp file + fsync + rename)
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::Persist(e.to_string()))?;
    }

    let content =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Persist(e.to_string()))?;

    let temp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&temp_path)
            .map_err(|e| StoreError::Persist(format!("Failed to create temp file: {}", e)))?;
        file.write_all(content.as_bytes())
            .map_err(|e| StoreError::Persist(format!("Failed to write: {}", e)))?;
        file.sync_all()
            .map_err(|e| StoreError::Persist(format!("Failed to sync: {}", e)))?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StoreError::Persist(format!("Failed to rename: {}", e))
    })
}
