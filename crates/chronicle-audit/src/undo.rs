//! Per-operation undo ledger.
//!
//! Every persisted save/delete record is appended, with a copy of the entity
//! it describes, to the ledger of the unit of work that produced it. Ledgers
//! are explicit values: each request or unit of work opens its own
//! [`UndoScope`] and passes its [`UndoLedger`] handle to the recorder, so
//! concurrent operations never observe each other's entries.
//!
//! This module only appends. Compensating actions are left to the caller.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::entry::EventRecord;
use crate::schema::Entity;

/// One appended (record, entity) pair.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    /// The persisted record.
    pub record: EventRecord,
    /// The entity as it was when recorded.
    pub entity: Box<dyn Entity>,
}

/// Cloneable handle onto one scope's entries.
#[derive(Debug, Clone, Default)]
pub struct UndoLedger {
    entries: Arc<Mutex<Vec<UndoEntry>>>,
}

impl UndoLedger {
    fn lock(&self) -> MutexGuard<'_, Vec<UndoEntry>> {
        self.entries.lock().unwrap_or_else(|e| {
            warn!("UndoLedger lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Append a persisted record together with its entity.
    pub fn append(&self, record: EventRecord, entity: &dyn Entity) {
        self.lock().push(UndoEntry {
            record,
            entity: entity.clone_entity(),
        });
    }

    /// Copy of the entries appended so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<UndoEntry> {
        self.lock().clone()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every entry.
    pub fn take(&self) -> Vec<UndoEntry> {
        std::mem::take(&mut *self.lock())
    }
}

/// Scope guard owning one unit of work's ledger.
///
/// Entries still held when the scope drops are released.
#[derive(Debug, Default)]
#[must_use = "dropping the scope immediately releases its ledger"]
pub struct UndoScope {
    ledger: UndoLedger,
}

impl UndoScope {
    /// Open a new, empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// The ledger to hand to the recorder.
    #[must_use]
    pub fn ledger(&self) -> &UndoLedger {
        &self.ledger
    }

    /// Close the scope, keeping its entries.
    #[must_use]
    pub fn finish(self) -> Vec<UndoEntry> {
        self.ledger.take()
    }
}

impl Drop for UndoScope {
    fn drop(&mut self) {
        let discarded = self.ledger.take().len();
        if discarded > 0 {
            debug!(discarded, "undo scope released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EventKind;
    use crate::schema::{EntitySchema, FieldError, FieldValue};
    use std::any::Any;
    use std::sync::LazyLock;

    #[derive(Debug, Clone)]
    struct Tag(String);

    static TAG: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::builder("test.Tag", || Box::new(Tag(String::new())))
            .build()
            .unwrap()
    });

    impl Entity for Tag {
        fn schema(&self) -> &'static EntitySchema {
            &TAG
        }
        fn key(&self) -> String {
            self.0.clone()
        }
        fn set_key(&mut self, key: &str) -> Result<(), FieldError> {
            key.clone_into(&mut self.0);
            Ok(())
        }
        fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
            Err(FieldError::Unknown(name.to_owned()))
        }
        fn write_field(&mut self, name: &str, _: FieldValue) -> Result<(), FieldError> {
            Err(FieldError::Unknown(name.to_owned()))
        }
        fn clone_entity(&self) -> Box<dyn Entity> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_append_and_take() {
        let scope = UndoScope::new();
        scope.ledger().append(EventRecord::new(EventKind::Insert), &Tag("a".into()));
        scope.ledger().append(EventRecord::new(EventKind::Delete), &Tag("b".into()));

        let entries = scope.ledger().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity.key(), "a");
        assert_eq!(entries[1].record.kind, EventKind::Delete);

        let finished = scope.finish();
        assert_eq!(finished.len(), 2);
    }

    #[test]
    fn test_entity_is_copied() {
        let scope = UndoScope::new();
        let mut tag = Tag("before".into());
        scope.ledger().append(EventRecord::new(EventKind::Update), &tag);
        tag.0 = "after".into();

        assert_eq!(scope.ledger().entries()[0].entity.key(), "before");
    }

    #[test]
    fn test_scopes_do_not_leak() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let scope = UndoScope::new();
                    for _ in 0..=i {
                        scope
                            .ledger()
                            .append(EventRecord::new(EventKind::Insert), &Tag(format!("t{i}")));
                    }
                    scope
                        .finish()
                        .into_iter()
                        .map(|e| e.entity.key())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let keys = handle.join().unwrap();
            assert_eq!(keys.len(), i + 1);
            assert!(keys.iter().all(|k| *k == format!("t{i}")));
        }
    }

    #[test]
    fn test_drop_releases_entries() {
        let ledger = {
            let scope = UndoScope::new();
            scope.ledger().append(EventRecord::new(EventKind::Insert), &Tag("x".into()));
            scope.ledger().clone()
        };
        assert!(ledger.is_empty());
    }
}
