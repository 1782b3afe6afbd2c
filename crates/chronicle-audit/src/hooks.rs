//! Cancellable pre-persist hooks.
//!
//! A [`HookRegistry`] is owned by the recorder. Subscribers run in
//! registration order against a snapshot taken when the hook fires, so
//! registering or unregistering from another thread (or from inside a hook)
//! never disturbs an in-flight recording.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::entry::{EventRecord, SaveMode};
use crate::schema::Entity;

/// Handle returned by [`HookRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Arguments passed to pre-save subscribers.
#[derive(Debug)]
pub struct SaveHookArgs<'a> {
    /// Whether the entity is being inserted or updated.
    pub mode: SaveMode,
    /// The record about to be persisted. Subscribers may amend it.
    pub record: &'a mut EventRecord,
    /// The entity being saved.
    pub entity: &'a dyn Entity,
    cancel: bool,
}

impl<'a> SaveHookArgs<'a> {
    pub(crate) fn new(mode: SaveMode, record: &'a mut EventRecord, entity: &'a dyn Entity) -> Self {
        Self {
            mode,
            record,
            entity,
            cancel: false,
        }
    }

    /// Veto persistence of this record.
    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    /// Whether a subscriber has vetoed persistence.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
    }
}

/// Arguments passed to pre-delete subscribers.
#[derive(Debug)]
pub struct DeleteHookArgs<'a> {
    /// The record about to be persisted. Subscribers may amend it.
    pub record: &'a mut EventRecord,
    /// The entity being deleted.
    pub entity: &'a dyn Entity,
    cancel: bool,
}

impl<'a> DeleteHookArgs<'a> {
    pub(crate) fn new(record: &'a mut EventRecord, entity: &'a dyn Entity) -> Self {
        Self {
            record,
            entity,
            cancel: false,
        }
    }

    /// Veto persistence of this record.
    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    /// Whether a subscriber has vetoed persistence.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
    }
}

/// Subscriber fired just before a save record is persisted.
pub trait SaveHook: Send + Sync {
    /// Inspect or amend the record; call [`SaveHookArgs::cancel`] to veto it.
    fn on_recording_save(&self, args: &mut SaveHookArgs<'_>);
}

impl<F> SaveHook for F
where
    F: Fn(&mut SaveHookArgs<'_>) + Send + Sync,
{
    fn on_recording_save(&self, args: &mut SaveHookArgs<'_>) {
        self(args);
    }
}

/// Subscriber fired just before a delete record is persisted.
pub trait DeleteHook: Send + Sync {
    /// Inspect or amend the record; call [`DeleteHookArgs::cancel`] to veto it.
    fn on_recording_delete(&self, args: &mut DeleteHookArgs<'_>);
}

impl<F> DeleteHook for F
where
    F: Fn(&mut DeleteHookArgs<'_>) + Send + Sync,
{
    fn on_recording_delete(&self, args: &mut DeleteHookArgs<'_>) {
        self(args);
    }
}

/// Ordered, thread-safe list of subscribers.
pub struct HookRegistry<H: ?Sized> {
    hooks: RwLock<Vec<(HookId, Arc<H>)>>,
    next_id: AtomicU64,
}

impl<H: ?Sized> HookRegistry<H> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<(HookId, Arc<H>)>> {
        self.hooks.read().unwrap_or_else(|e| {
            warn!("HookRegistry lock poisoned, recovering");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(HookId, Arc<H>)>> {
        self.hooks.write().unwrap_or_else(|e| {
            warn!("HookRegistry lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Add a subscriber at the end of the firing order.
    pub fn register(&self, hook: Arc<H>) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().push((id, hook));
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unregister(&self, id: HookId) -> bool {
        // Take the hook out under the lock but drop it afterwards, so a
        // subscriber whose destructor touches the registry cannot deadlock.
        let removed = {
            let mut hooks = self.write();
            hooks
                .iter()
                .position(|(hook_id, _)| *hook_id == id)
                .map(|index| hooks.remove(index))
        };
        removed.is_some()
    }

    /// Current subscribers, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<H>> {
        self.read()
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: ?Sized> Default for HookRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> std::fmt::Debug for HookRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("subscribers", &self.len())
            .finish_non_exhaustive()
    }
}

impl HookRegistry<dyn SaveHook> {
    /// Run every subscriber against `args`. Returns whether any cancelled.
    pub(crate) fn fire(&self, args: &mut SaveHookArgs<'_>) -> bool {
        for hook in self.snapshot() {
            hook.on_recording_save(args);
        }
        args.is_cancelled()
    }
}

impl HookRegistry<dyn DeleteHook> {
    /// Run every subscriber against `args`. Returns whether any cancelled.
    pub(crate) fn fire(&self, args: &mut DeleteHookArgs<'_>) -> bool {
        for hook in self.snapshot() {
            hook.on_recording_delete(args);
        }
        args.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let registry: HookRegistry<dyn Fn() + Send + Sync> = HookRegistry::new();
        registry.register(Arc::new(|| {}));

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = registry.hooks.write().unwrap();
            panic!("poison the registry lock");
        }));
        assert!(poisoned.is_err());
        assert!(registry.hooks.is_poisoned());

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(registry.snapshot().len(), 1);
        let id = registry.register(Arc::new(|| {}));
        assert_eq!(registry.len(), 2);
        assert!(registry.unregister(id));
    }

    #[test]
    fn test_register_and_unregister() {
        let registry: HookRegistry<dyn Fn() + Send + Sync> = HookRegistry::new();
        let a = registry.register(Arc::new(|| {}));
        let b = registry.register(Arc::new(|| {}));

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.unregister(a));
        assert!(!registry.unregister(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry: HookRegistry<dyn Fn() + Send + Sync> = HookRegistry::new();

        for i in 0..3 {
            let log = Arc::clone(&log);
            registry.register(Arc::new(move || log.lock().unwrap().push(i)));
        }

        for hook in registry.snapshot() {
            hook();
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unregister_during_iteration_is_safe() {
        let registry: Arc<HookRegistry<dyn Fn() + Send + Sync>> = Arc::new(HookRegistry::new());
        let calls = Arc::new(Mutex::new(0));
        let own_id = Arc::new(Mutex::new(None));

        {
            let registry_ref = Arc::downgrade(&registry);
            let own_id_ref = Arc::clone(&own_id);
            let id = registry.register(Arc::new(move || {
                if let (Some(registry), Some(id)) = (registry_ref.upgrade(), *own_id_ref.lock().unwrap()) {
                    registry.unregister(id);
                }
            }));
            *own_id.lock().unwrap() = Some(id);
        }
        {
            let calls = Arc::clone(&calls);
            registry.register(Arc::new(move || *calls.lock().unwrap() += 1));
        }

        for hook in registry.snapshot() {
            hook();
        }

        // The second subscriber still ran, from the snapshot.
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(registry.len(), 1);
    }
}
