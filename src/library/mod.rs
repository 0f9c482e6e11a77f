// Reference library - the registered sounds that windows are matched against
// Ordered by registration; scans see an immutable snapshot

mod store;
pub(crate) use store::write_json_atomic;
pub use store::{JsonReferenceStore, ReferenceStore, StoreError};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::audio::{AudioDecoder, EncodedAudio};
use crate::features::{extract_features, ExtractionError, FeatureVector};

/// One registered sound signature
///
/// Features are computed once when the reference is created and are
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSound {
    id: u64,
    name: String,
    features: FeatureVector,
    created_at: DateTime<Utc>,
}

impl ReferenceSound {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Errors from library operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LibraryError {
    /// The backing store could not be read or written
    #[error("Reference storage failed: {0}")]
    Store(#[from] StoreError),
    /// A capture could not be turned into features
    #[error("Could not extract features from capture: {0}")]
    Extraction(#[from] ExtractionError),
    /// A capture decoded to silence and would never match anything
    #[error("Capture is silent")]
    SilentCapture,
    /// A capture produced NaN or infinite features and could never match
    #[error("Capture produced non-finite features")]
    NonFiniteFeatures,
}

/// Lazy, finite traversal over a snapshot of the library in insertion order
///
/// Registrations and removals made after the scan started are not visible
/// to it.
#[derive(Debug, Clone)]
pub struct ReferenceScan {
    entries: Arc<Vec<ReferenceSound>>,
    position: usize,
}

impl Iterator for ReferenceScan {
    type Item = ReferenceSound;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.get(self.position)?.clone();
        self.position += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ReferenceScan {}

struct LibraryInner {
    /// Published entries; replaced wholesale on every mutation
    entries: Arc<Vec<ReferenceSound>>,
    next_id: u64,
}

/// Ordered collection of reference sounds, shared between the operator and
/// the segmentation loop
///
/// Every mutation is written through to the store (when one is attached)
/// before it becomes visible; a failed write leaves the library unchanged.
pub struct ReferenceLibrary {
    inner: RwLock<LibraryInner>,
    store: Mutex<Option<Box<dyn ReferenceStore>>>,
}

impl ReferenceLibrary {
    /// Create an empty in-memory library
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LibraryInner {
                entries: Arc::new(Vec::new()),
                next_id: 1,
            }),
            store: Mutex::new(None),
        }
    }

    /// Open a library backed by `store`, re-populating it from storage
    pub fn open(store: Box<dyn ReferenceStore>) -> Result<Self, LibraryError> {
        let loaded = store.load()?;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(loaded.len());
        for reference in loaded {
            if !seen.insert(reference.id) {
                crate::warn!(
                    "[library] Skipping duplicate reference id {} ('{}')",
                    reference.id,
                    reference.name
                );
                continue;
            }
            entries.push(reference);
        }

        let next_id = entries.iter().map(|r| r.id).max().map_or(1, |max| max + 1);
        crate::info!("[library] Loaded {} references", entries.len());

        Ok(Self {
            inner: RwLock::new(LibraryInner {
                entries: Arc::new(entries),
                next_id,
            }),
            store: Mutex::new(Some(store)),
        })
    }

    /// Register a new reference and return it
    ///
    /// The new entry gets a fresh id and goes to the end of the scan order.
    pub fn register(
        &self,
        name: impl Into<String>,
        features: FeatureVector,
    ) -> Result<ReferenceSound, LibraryError> {
        self.insert(Some(name.into()), features)
    }

    /// Append under the write lock, naming the entry "Reference N" when unnamed
    fn insert(
        &self,
        name: Option<String>,
        features: FeatureVector,
    ) -> Result<ReferenceSound, LibraryError> {
        let store = self.store.lock();
        let mut inner = self.inner.write();

        let name = name.unwrap_or_else(|| default_name_for(inner.entries.len()));
        let reference = ReferenceSound {
            id: inner.next_id,
            name,
            features,
            created_at: Utc::now(),
        };

        let mut entries = inner.entries.as_ref().clone();
        entries.push(reference.clone());

        if let Some(store) = store.as_ref() {
            store.save(&entries)?;
        }

        inner.entries = Arc::new(entries);
        inner.next_id += 1;

        crate::info!(
            "[library] Registered reference {} '{}'",
            reference.id,
            reference.name
        );
        Ok(reference)
    }

    /// Build a reference from a user capture
    ///
    /// Nothing is registered when the capture cannot be decoded or is silent.
    /// Without a name, the reference is called "Reference N".
    pub fn register_capture(
        &self,
        name: Option<String>,
        encoded: &EncodedAudio,
        decoder: &dyn AudioDecoder,
    ) -> Result<ReferenceSound, LibraryError> {
        let features = extract_features(decoder, encoded)?;
        if !features.is_finite() {
            return Err(LibraryError::NonFiniteFeatures);
        }
        if features.is_neutral() {
            return Err(LibraryError::SilentCapture);
        }
        self.insert(name, features)
    }

    /// Remove the reference with `id`
    ///
    /// Returns whether anything was removed; an unknown id is not an error.
    pub fn remove(&self, id: u64) -> Result<bool, LibraryError> {
        let store = self.store.lock();
        let mut inner = self.inner.write();

        if !inner.entries.iter().any(|r| r.id == id) {
            crate::debug!("[library] Remove ignored, no reference with id {}", id);
            return Ok(false);
        }

        let entries: Vec<ReferenceSound> = inner
            .entries
            .iter()
            .filter(|r| r.id != id)
            .cloned()
            .collect();

        if let Some(store) = store.as_ref() {
            store.save(&entries)?;
        }

        inner.entries = Arc::new(entries);
        crate::info!("[library] Removed reference {}", id);
        Ok(true)
    }

    /// Start a fresh traversal in insertion order
    pub fn scan_ordered(&self) -> ReferenceScan {
        ReferenceScan {
            entries: Arc::clone(&self.inner.read().entries),
            position: 0,
        }
    }

    /// Get a reference by id
    pub fn get(&self, id: u64) -> Option<ReferenceSound> {
        self.inner.read().entries.iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Display name for the next unnamed reference
    pub fn default_name(&self) -> String {
        default_name_for(self.len())
    }
}

fn default_name_for(len: usize) -> String {
    format!("Reference {}", len + 1)
}

impl Default for ReferenceLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceLibrary")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "library_test.rs"]
mod tests;
