//! In-memory [`Store`] implementation for testing and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Each `(environment, collection)` pair is a `Vec` so insertion order is
//! preserved and `upsert` replaces the first matching record in place.
//!
//! The store is an ordinary owned value: create one, wrap it in an `Arc`,
//! and hand it to the resolver and orchestrator.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::models::{Document, EntityKind};

use super::{check_kind, Store};

type Partition = (String, EntityKind);

/// In-memory store keyed by `(environment, collection)`.
pub struct InMemoryStore {
    partitions: RwLock<HashMap<Partition, Vec<Document>>>,
    offline: RwLock<HashSet<String>>,
    writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            offline: RwLock::new(HashSet::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Mark an environment unreachable (or reachable again).
    ///
    /// Every operation touching an offline environment fails with
    /// [`StoreError::Unavailable`].
    pub fn set_offline(&self, environment: &str, offline: bool) {
        if let Ok(mut set) = self.offline.write() {
            if offline {
                set.insert(environment.to_string());
            } else {
                set.remove(environment);
            }
        }
    }

    /// Number of successful mutating calls since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn ensure_online(&self, environment: &str) -> StoreResult<()> {
        let offline = self
            .offline
            .read()
            .map_err(|_| StoreError::Backend("offline set lock poisoned".to_string()))?;
        if offline.contains(environment) {
            return Err(StoreError::unavailable(environment, "environment is offline"));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Partition, Vec<Document>>>> {
        self.partitions
            .read()
            .map_err(|_| StoreError::Backend("partition lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Partition, Vec<Document>>>> {
        self.partitions
            .write()
            .map_err(|_| StoreError::Backend("partition lock poisoned".to_string()))
    }

    fn bump(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn key(collection: EntityKind, environment: &str) -> Partition {
    (environment.to_string(), collection)
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_all(
        &self,
        collection: EntityKind,
        environment: &str,
    ) -> StoreResult<Vec<Document>> {
        self.ensure_online(environment)?;
        let partitions = self.read()?;
        Ok(partitions
            .get(&key(collection, environment))
            .cloned()
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: EntityKind,
        id: &str,
        environment: &str,
    ) -> StoreResult<Option<Document>> {
        self.ensure_online(environment)?;
        let partitions = self.read()?;
        Ok(partitions
            .get(&key(collection, environment))
            .and_then(|docs| docs.iter().find(|d| d.id() == id))
            .cloned())
    }

    async fn find_by_text(
        &self,
        collection: EntityKind,
        text: &str,
        environment: &str,
    ) -> StoreResult<Vec<Document>> {
        self.ensure_online(environment)?;
        let partitions = self.read()?;
        Ok(partitions
            .get(&key(collection, environment))
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.matches_text(text))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_many(
        &self,
        collection: EntityKind,
        documents: &[Document],
        environment: &str,
    ) -> StoreResult<()> {
        self.ensure_online(environment)?;
        for doc in documents {
            check_kind(collection, doc)?;
        }
        let mut partitions = self.write()?;
        let docs = partitions.entry(key(collection, environment)).or_default();

        let mut seen: HashSet<&str> = docs.iter().map(|d| d.id()).collect();
        for doc in documents {
            if !seen.insert(doc.id()) {
                return Err(StoreError::Conflict {
                    collection,
                    id: doc.id().to_string(),
                    environment: environment.to_string(),
                });
            }
        }
        docs.extend(documents.iter().cloned());
        drop(partitions);
        self.bump();
        Ok(())
    }

    async fn upsert(
        &self,
        collection: EntityKind,
        document: &Document,
        environment: &str,
    ) -> StoreResult<()> {
        self.ensure_online(environment)?;
        check_kind(collection, document)?;
        let mut partitions = self.write()?;
        let docs = partitions.entry(key(collection, environment)).or_default();
        match docs.iter_mut().find(|d| d.id() == document.id()) {
            Some(existing) => *existing = document.clone(),
            None => docs.push(document.clone()),
        }
        drop(partitions);
        self.bump();
        Ok(())
    }

    async fn list_environments(&self) -> StoreResult<Vec<String>> {
        let partitions = self.read()?;
        let names: BTreeSet<&str> = partitions
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|((env, _), _)| env.as_str())
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    async fn clear_environment(&self, environment: &str) -> StoreResult<()> {
        self.ensure_online(environment)?;
        let mut partitions = self.write()?;
        partitions.retain(|(env, _), _| env != environment);
        drop(partitions);
        self.bump();
        Ok(())
    }
}
