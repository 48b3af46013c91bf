//! Key-value storage capability
//!
//! The durable store is supplied by the host platform and injected as a
//! trait. [`MemoryStore`] is the in-process implementation used by tests and
//! as the fallback tier; [`FallbackStore`] wraps a platform store and
//! switches to the memory tier the first time the platform store fails, so
//! the app keeps working for the rest of the run when on-device storage is
//! broken.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::StorageError;

// ----------------------------------------------------------------------------
// Store Capability
// ----------------------------------------------------------------------------

/// Async string key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`; absent keys are not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Delete every stored value
    async fn clear(&self) -> Result<(), StorageError>;
}

// ----------------------------------------------------------------------------
// Memory Store
// ----------------------------------------------------------------------------

/// In-memory store; never fails
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Fallback Store
// ----------------------------------------------------------------------------

/// Wraps a platform store with an in-memory fallback tier
///
/// The first failed primary operation flips the store into degraded mode;
/// from then on every operation is served from the memory tier, which keeps
/// reads and writes mutually consistent instead of straddling two stores.
#[derive(Debug)]
pub struct FallbackStore<P> {
    primary: P,
    memory: MemoryStore,
    degraded: AtomicBool,
}

impl<P: KeyValueStore> FallbackStore<P> {
    pub fn new(primary: P) -> Self {
        Self {
            primary,
            memory: MemoryStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the primary store has been abandoned for this run
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn mark_degraded(&self, op: &str, err: &StorageError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(%err, "Primary store failed during {}, switching to memory storage", op);
        }
    }
}

#[async_trait]
impl<P: KeyValueStore> KeyValueStore for FallbackStore<P> {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if !self.is_degraded() {
            match self.primary.get(key).await {
                Ok(value) => return Ok(value),
                Err(e) => self.mark_degraded("get", &e),
            }
        }
        self.memory.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if !self.is_degraded() {
            match self.primary.set(key, value).await {
                Ok(()) => return Ok(()),
                Err(e) => self.mark_degraded("set", &e),
            }
        }
        self.memory.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if !self.is_degraded() {
            match self.primary.remove(key).await {
                Ok(()) => return Ok(()),
                Err(e) => self.mark_degraded("remove", &e),
            }
        }
        self.memory.remove(key).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        if !self.is_degraded() {
            match self.primary.clear().await {
                Ok(()) => return Ok(()),
                Err(e) => self.mark_degraded("clear", &e),
            }
        }
        self.memory.clear().await
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Store that fails every operation
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::backend("disk unavailable"))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::backend("disk unavailable"))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::backend("disk unavailable"))
        }

        async fn clear(&self) -> Result<(), StorageError> {
            Err(StorageError::backend("disk unavailable"))
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_clear() {
        let store = MemoryStore::new();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fallback_passes_through_healthy_primary() {
        let store = FallbackStore::new(MemoryStore::new());
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert!(!store.is_degraded());
    }

    #[tokio::test]
    async fn test_fallback_degrades_to_memory_on_failure() {
        let store = FallbackStore::new(BrokenStore);

        // The failed write lands in the memory tier and stays observable
        store.set("k", "v").await.unwrap();
        assert!(store.is_degraded());
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fallback_degrades_on_read_too() {
        let store = FallbackStore::new(BrokenStore);
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert!(store.is_degraded());
    }
}
