//! Mock collaborators for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chronicle_audit::{
    ActorContext, ContextError, Entity, EntityStore, EventKind, EventRecord, EventStore,
};
use chronicle_storage::{StorageError, StorageResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Failure injected into a mock store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    /// Fail with [`StorageError::Internal`].
    Internal,
    /// Fail with [`StorageError::Connection`].
    Connection,
}

impl StoreFailure {
    fn to_error(self) -> StorageError {
        match self {
            Self::Internal => StorageError::Internal("injected failure".to_owned()),
            Self::Connection => StorageError::Connection("injected: store unreachable".to_owned()),
        }
    }
}

/// [`EventStore`] that keeps every saved record in memory and can be told
/// to fail.
#[derive(Debug, Default)]
pub struct RecordingEventStore {
    records: Mutex<Vec<EventRecord>>,
    attempts: Mutex<usize>,
    failure: Mutex<Option<StoreFailure>>,
}

impl RecordingEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a store whose every save fails.
    #[must_use]
    pub fn failing(failure: StoreFailure) -> Arc<Self> {
        let store = Self::default();
        *lock(&store.failure) = Some(failure);
        Arc::new(store)
    }

    /// Change the injected failure (`None` to succeed again).
    pub fn set_failure(&self, failure: Option<StoreFailure>) {
        *lock(&self.failure) = failure;
    }

    /// Records saved so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<EventRecord> {
        lock(&self.records).clone()
    }

    /// Records of one kind.
    #[must_use]
    pub fn records_of(&self, kind: EventKind) -> Vec<EventRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    /// Whether nothing was saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of save calls, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        *lock(&self.attempts)
    }
}

impl EventStore for RecordingEventStore {
    fn save(&self, record: &EventRecord) -> StorageResult<()> {
        {
            let mut attempts = lock(&self.attempts);
            *attempts = attempts.saturating_add(1);
        }
        if let Some(failure) = *lock(&self.failure) {
            return Err(failure.to_error());
        }
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

/// [`EntityStore`] over an in-memory map of entity copies.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    entities: Mutex<HashMap<(String, String), Box<dyn Entity>>>,
    failure: Mutex<Option<StoreFailure>>,
}

impl MemoryEntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a copy of `entity`, replacing any earlier copy.
    pub fn put(&self, entity: &dyn Entity) {
        lock(&self.entities).insert(
            (entity.type_name().to_owned(), entity.key()),
            entity.clone_entity(),
        );
    }

    /// Forget `entity`. Returns whether it was stored.
    pub fn remove(&self, entity: &dyn Entity) -> bool {
        lock(&self.entities)
            .remove(&(entity.type_name().to_owned(), entity.key()))
            .is_some()
    }

    /// Change the injected failure (`None` to succeed again).
    pub fn set_failure(&self, failure: Option<StoreFailure>) {
        *lock(&self.failure) = failure;
    }
}

impl EntityStore for MemoryEntityStore {
    fn get(&self, type_name: &str, key: &str) -> StorageResult<Option<Box<dyn Entity>>> {
        if let Some(failure) = *lock(&self.failure) {
            return Err(failure.to_error());
        }
        Ok(lock(&self.entities)
            .get(&(type_name.to_owned(), key.to_owned()))
            .map(|entity| entity.clone_entity()))
    }
}

/// [`ActorContext`] returning fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticActor {
    id: Option<String>,
    ip: Option<String>,
}

impl StaticActor {
    /// Report `id` and `ip`.
    #[must_use]
    pub fn new(id: Option<&str>, ip: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_owned),
            ip: ip.map(str::to_owned),
        }
    }
}

impl ActorContext for StaticActor {
    fn current_actor_id(&self) -> Result<Option<String>, ContextError> {
        Ok(self.id.clone())
    }

    fn current_actor_ip(&self) -> Result<Option<String>, ContextError> {
        Ok(self.ip.clone())
    }
}

/// [`ActorContext`] whose every lookup fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingActor;

impl ActorContext for FailingActor {
    fn current_actor_id(&self) -> Result<Option<String>, ContextError> {
        Err(ContextError("no request in scope".to_owned()))
    }

    fn current_actor_ip(&self) -> Result<Option<String>, ContextError> {
        Err(ContextError("no request in scope".to_owned()))
    }
}
