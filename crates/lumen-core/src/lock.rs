//! Per-aggregate serialization.
//!
//! Writers to the same aggregate (concurrent uploads, a purchase being
//! applied) take the aggregate's lock for the whole load → decide → append
//! cycle. Readers never take it; they read one consistent event snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Guard held while a writer owns an aggregate.
pub type KeyGuard = OwnedMutexGuard<()>;

/// A set of async mutexes keyed by aggregate identifier.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the lock for `key` is free and takes it.
    pub async fn acquire(&self, key: Uuid) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Slots nobody holds or waits on are only referenced by the map.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        // Arrange
        let locks = Arc::new(KeyedLocks::new());
        let key = Uuid::new_v4();
        let inside = Arc::new(AtomicU32::new(0));
        let max_inside = Arc::new(AtomicU32::new(0));

        // Act
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(key).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Assert
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::new();
        let first = locks.acquire(Uuid::new_v4()).await;

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(Uuid::new_v4()))
            .await;

        assert!(second.is_ok());
        drop(first);
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyedLocks::new();
        let key = Uuid::new_v4();

        let guard = locks.acquire(key).await;
        assert_eq!(locks.active_keys(), 1);
        drop(guard);

        assert_eq!(locks.active_keys(), 0);
    }
}
