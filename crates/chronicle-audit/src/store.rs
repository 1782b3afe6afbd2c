//! Persistence seams and the KV-backed event store.

use std::sync::Arc;

use chronicle_storage::{KvStore, MemoryKvStore, StorageError, StorageResult};

use crate::entry::{EventId, EventRecord};
use crate::schema::Entity;

/// Durable sink for event records.
pub trait EventStore: Send + Sync {
    /// Persist `record`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the record cannot be persisted.
    fn save(&self, record: &EventRecord) -> StorageResult<()>;
}

/// Source of previously persisted entity state.
pub trait EntityStore: Send + Sync {
    /// Fetch the persisted entity of `type_name` with `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    fn get(&self, type_name: &str, key: &str) -> StorageResult<Option<Box<dyn Entity>>>;
}

const NS_EVENTS: &str = "chronicle:events";

/// Run an async future synchronously.
///
/// KV operations are in-process, so bridging the sync [`EventStore`] trait to
/// the async [`KvStore`] trait is cheap. Inside a tokio runtime the future
/// runs on a scoped thread to avoid the nested `block_on` panic; outside one,
/// a temporary current-thread runtime is used.
fn block_on<F>(f: F) -> StorageResult<F::Output>
where
    F: std::future::Future + Send,
    F::Output: Send,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => std::thread::scope(|s| {
            s.spawn(|| handle.block_on(f))
                .join()
                .map_err(|_| StorageError::Internal("storage thread panicked".to_owned()))
        }),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map(|runtime| runtime.block_on(f))
            .map_err(|e| StorageError::Internal(format!("failed to create runtime: {e}"))),
    }
}

/// [`EventStore`] persisting records as JSON in a [`KvStore`].
pub struct KvEventStore {
    store: Arc<dyn KvStore>,
}

impl KvEventStore {
    /// Persist into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Create an in-memory store (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    /// Load a persisted record.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    pub fn get(&self, id: &EventId) -> StorageResult<Option<EventRecord>> {
        let key = id.to_string();
        match block_on(self.store.get(NS_EVENTS, &key))?? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Count persisted records.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn count(&self) -> StorageResult<usize> {
        Ok(block_on(self.store.list_keys(NS_EVENTS))??.len())
    }
}

impl EventStore for KvEventStore {
    fn save(&self, record: &EventRecord) -> StorageResult<()> {
        let data =
            serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))?;
        block_on(self.store.set(NS_EVENTS, &record.id.to_string(), data))?
    }
}

impl std::fmt::Debug for KvEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvEventStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EventKind;

    #[test]
    fn test_save_and_get_outside_runtime() {
        let store = KvEventStore::in_memory();
        let record = EventRecord::new(EventKind::Log).with_payload("hello");

        store.save(&record).unwrap();

        assert_eq!(store.get(&record.id).unwrap(), Some(record));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_inside_runtime() {
        let store = KvEventStore::in_memory();
        for _ in 0..3 {
            store.save(&EventRecord::new(EventKind::Exception)).unwrap();
        }
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.get(&EventId::new()).unwrap(), None);
    }
}
