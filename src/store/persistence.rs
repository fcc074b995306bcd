//! StateBackend trait — pluggable durability for the controller state
//!
//! Abstracts where the state document lives so the backend can be swapped
//! without touching controller code:
//! - `SledBackend`: the production embedded database
//! - `MemoryBackend`: in-memory store for tests and ephemeral deployments

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::StateDocument;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Trait for pluggable state persistence.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks. `load` returns `Ok(None)` when no prior copy exists;
/// a present-but-corrupt copy is an `Err` so the caller can decide to
/// degrade rather than die.
pub trait StateBackend: Send + Sync {
    /// Load the persisted document, if any.
    fn load(&self) -> Result<Option<StateDocument>, StoreError>;

    /// Durably write the full document.
    fn save(&self, doc: &StateDocument) -> Result<(), StoreError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}

/// Key under which the single state document is stored.
const STATE_KEY: &[u8] = b"controller_state";

/// Sled-backed durability. The whole document is one JSON value under a
/// fixed key; every save flushes so a committed mutation survives a crash.
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

impl StateBackend for SledBackend {
    fn load(&self) -> Result<Option<StateDocument>, StoreError> {
        match self.db.get(STATE_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, doc: &StateDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(doc)?;
        self.db.insert(STATE_KEY, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

/// In-memory backend for tests. Not durable.
///
/// `fail_saves` lets tests exercise the log-and-continue policy for
/// durable-write failures.
#[derive(Default)]
pub struct MemoryBackend {
    doc: std::sync::Mutex<Option<StateDocument>>,
    fail_saves: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self) -> Result<Option<StateDocument>, StoreError> {
        let guard = self
            .doc
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, doc: &StateDocument) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected save failure".to_string()));
        }
        let mut guard = self
            .doc
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        *guard = Some(doc.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trip() {
        let backend = MemoryBackend::new();
        assert!(backend.load().unwrap().is_none());

        let mut doc = StateDocument::default();
        doc.record_mut("svc").fail_count = 2;
        backend.save(&doc).unwrap();

        let loaded = backend.load().unwrap().unwrap();
        assert_eq!(loaded.services["svc"].fail_count, 2);
    }

    #[test]
    fn memory_save_failure_injection() {
        let backend = MemoryBackend::new();
        backend.set_fail_saves(true);
        let err = backend.save(&StateDocument::default()).unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn sled_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        assert!(backend.load().unwrap().is_none());

        let mut doc = StateDocument::default();
        doc.record_mut("svc").warning_sent = true;
        backend.save(&doc).unwrap();

        let loaded = backend.load().unwrap().unwrap();
        assert!(loaded.services["svc"].warning_sent);
    }

    #[test]
    fn sled_corrupt_value_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        backend.db.insert(STATE_KEY, b"not json".to_vec()).unwrap();
        assert!(matches!(
            backend.load().unwrap_err(),
            StoreError::Serialization(_)
        ));
    }
}
