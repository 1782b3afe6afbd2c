//! Raw key-value store trait and the in-memory backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::{StorageError, StorageResult};

/// Byte-level key-value storage, partitioned into namespaces.
///
/// Implementations must be thread-safe. Every `set` is durable once it
/// returns; there is no separate commit step.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the value stored under `key` in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value` under `key` in `namespace`, replacing any prior value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for empty namespaces or keys, or
    /// a backend error if the write fails.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete `key` from `namespace`. Returns whether the key existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List every key in `namespace`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Check whether `key` exists in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }
}

fn validate_key(namespace: &str, key: &str) -> StorageResult<()> {
    if namespace.is_empty() {
        return Err(StorageError::InvalidKey("namespace is empty".to_owned()));
    }
    if key.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "empty key in namespace '{namespace}'"
        )));
    }
    Ok(())
}

/// In-process [`KvStore`] backed by ordered maps. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    namespaces: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let guard = self.namespaces.read().await;
        Ok(guard.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_key(namespace, key)?;
        trace!(namespace, key, bytes = value.len(), "kv set");
        self.namespaces
            .write()
            .await
            .entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let mut guard = self.namespaces.write().await;
        Ok(guard
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(key).is_some()))
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let guard = self.namespaces.read().await;
        Ok(guard
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", b"one".to_vec()).await.unwrap();

        assert_eq!(store.get("ns", "a").await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(store.get("ns", "missing").await.unwrap(), None);
        assert_eq!(store.get("other", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = MemoryKvStore::new();
        store.set("left", "k", b"l".to_vec()).await.unwrap();
        store.set("right", "k", b"r".to_vec()).await.unwrap();

        assert_eq!(store.list_keys("left").await.unwrap(), vec!["k".to_string()]);
        assert_eq!(store.get("right", "k").await.unwrap(), Some(b"r".to_vec()));
    }

    #[tokio::test]
    async fn test_list_keys_sorted() {
        let store = MemoryKvStore::new();
        for key in ["c", "a", "b"] {
            store.set("ns", key, Vec::new()).await.unwrap();
        }
        assert_eq!(store.list_keys("ns").await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", b"x".to_vec()).await.unwrap();

        assert!(store.delete("ns", "a").await.unwrap());
        assert!(!store.delete("ns", "a").await.unwrap());
        assert!(!store.exists("ns", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_empty_key() {
        let store = MemoryKvStore::new();
        let err = store.set("ns", "", Vec::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));

        let err = store.set("", "k", Vec::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
