//! Persistent state store
//!
//! [`StateStore`] is the sole writer of durable controller state. Every
//! read-modify-write sequence (counter increment, status transition,
//! pause/unpause, history append) runs under one async mutex covering both
//! the in-memory mutation and the durable save, so the event path and the
//! resolution sweeper can never interleave on the same record.
//!
//! Save failures are logged, not raised: the in-memory transition stands
//! and the caller proceeds. The accepted risk is that the persisted copy
//! lags the live state by the last failed write.

pub mod persistence;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::types::StateDocument;

pub use persistence::{MemoryBackend, SledBackend, StateBackend, StoreError};

/// Serialized-access store over a pluggable durability backend.
pub struct StateStore {
    backend: Box<dyn StateBackend>,
    doc: Mutex<StateDocument>,
    history_limit: usize,
}

impl StateStore {
    /// Load prior state from the backend. A missing copy is a cold start;
    /// an unreadable or corrupt copy is reported and degraded to empty
    /// state — never fatal.
    pub fn open(backend: Box<dyn StateBackend>, history_limit: usize) -> Self {
        let doc = match backend.load() {
            Ok(Some(doc)) => {
                info!(
                    backend = backend.backend_name(),
                    services = doc.services.len(),
                    history = doc.history.len(),
                    "Restored controller state"
                );
                doc
            }
            Ok(None) => {
                info!(backend = backend.backend_name(), "No prior state, cold start");
                StateDocument::default()
            }
            Err(e) => {
                warn!(error = %e, "Persisted state unreadable, resetting to empty");
                StateDocument::default()
            }
        };

        Self {
            backend,
            doc: Mutex::new(doc),
            history_limit,
        }
    }

    /// Maximum retained history entries, shared with transition helpers.
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Run a read-modify-write transaction. The closure mutates the
    /// document in place; the result is durably saved before the lock is
    /// released. A failed save is logged and the mutation kept.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut StateDocument) -> R) -> R {
        let mut doc = self.doc.lock().await;
        let result = f(&mut doc);
        if let Err(e) = self.backend.save(&doc) {
            warn!(error = %e, "Failed to persist state, in-memory copy is ahead of disk");
        }
        result
    }

    /// Run a read-only closure over the current document.
    pub async fn read<R>(&self, f: impl FnOnce(&StateDocument) -> R) -> R {
        let doc = self.doc.lock().await;
        f(&doc)
    }

    /// Clone the full document for `/status`.
    pub async fn snapshot(&self) -> StateDocument {
        self.doc.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn mutation_is_persisted() {
        let store = StateStore::open(Box::new(MemoryBackend::new()), 100);
        store
            .mutate(|doc| {
                doc.record_mut("svc").fail_count = 3;
            })
            .await;

        let snap = store.snapshot().await;
        assert_eq!(snap.services["svc"].fail_count, 3);
    }

    #[tokio::test]
    async fn save_failure_keeps_in_memory_state() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_fail_saves(true);

        struct Shared(Arc<MemoryBackend>);
        impl StateBackend for Shared {
            fn load(&self) -> Result<Option<StateDocument>, StoreError> {
                self.0.load()
            }
            fn save(&self, doc: &StateDocument) -> Result<(), StoreError> {
                self.0.save(doc)
            }
            fn backend_name(&self) -> &'static str {
                self.0.backend_name()
            }
        }

        let store = StateStore::open(Box::new(Shared(backend)), 100);
        store
            .mutate(|doc| doc.record_mut("svc").fail_count = 1)
            .await;

        // The write failed but the live state still reflects the mutation.
        let snap = store.snapshot().await;
        assert_eq!(snap.services["svc"].fail_count, 1);
    }

    #[tokio::test]
    async fn corrupt_backend_degrades_to_empty() {
        struct Corrupt;
        impl StateBackend for Corrupt {
            fn load(&self) -> Result<Option<StateDocument>, StoreError> {
                Err(StoreError::Serialization("bad json".to_string()))
            }
            fn save(&self, _doc: &StateDocument) -> Result<(), StoreError> {
                Ok(())
            }
            fn backend_name(&self) -> &'static str {
                "corrupt"
            }
        }

        let store = StateStore::open(Box::new(Corrupt), 100);
        let snap = store.snapshot().await;
        assert!(snap.services.is_empty());
        assert!(snap.history.is_empty());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = StateStore::open(Box::new(SledBackend::open(dir.path()).unwrap()), 100);
            store
                .mutate(|doc| {
                    let rec = doc.record_mut("svc");
                    rec.fail_count = 2;
                    rec.status = ServiceStatus::SurveillancePostRestart;
                })
                .await;
        }

        let store = StateStore::open(Box::new(SledBackend::open(dir.path()).unwrap()), 100);
        let snap = store.snapshot().await;
        assert_eq!(snap.services["svc"].fail_count, 2);
        assert_eq!(
            snap.services["svc"].status,
            ServiceStatus::SurveillancePostRestart
        );
    }
}
