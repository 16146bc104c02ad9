//! Per-key write serialization for commits.
//!
//! Two commits for different roots can share a dependency (two games
//! between the same teams). [`KeyLocks`] hands out one async mutex per
//! `(target environment, collection, id)` so the fetch → stamp → upsert of
//! a shared record never interleaves, while unrelated keys proceed in
//! parallel.
//!
//! Entries are held weakly; a key's mutex is dropped once no guard or
//! waiter refers to it, and dead entries are pruned as the table grows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::EntityKind;

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LockKey {
    environment: String,
    collection: EntityKind,
    id: String,
}

/// Guard for one locked key. The key is released on drop.
pub type KeyGuard = OwnedMutexGuard<()>;

/// Registry of per-record async mutexes, shared across requests.
#[derive(Debug, Default)]
pub struct KeyLocks {
    table: Mutex<HashMap<LockKey, Weak<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `(environment, collection, id)`.
    pub async fn acquire(&self, environment: &str, collection: EntityKind, id: &str) -> KeyGuard {
        let mutex = self.mutex_for(LockKey {
            environment: environment.to_string(),
            collection,
            id: id.to_string(),
        });
        mutex.lock_owned().await
    }

    /// Number of keys currently referenced by a guard or waiter.
    pub fn active_keys(&self) -> usize {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.values().filter(|w| w.strong_count() > 0).count()
    }

    fn mutex_for(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = table.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        if table.len() >= PRUNE_THRESHOLD {
            table.retain(|_, w| w.strong_count() > 0);
        }
        let fresh = Arc::new(AsyncMutex::new(()));
        table.insert(key, Arc::downgrade(&fresh));
        fresh
    }
}
