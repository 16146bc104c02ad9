//! Storage abstraction for envsync.
//!
//! The [`Store`] trait defines every storage operation the resolver,
//! orchestrator, and lookup need, enabling pluggable backends (SQLite in
//! the app crate, in-memory here for tests and embedding).
//!
//! Documents are partitioned by environment and collection. An id is
//! unique only within one `(environment, collection)` pair, and no backend
//! ever re-keys a document.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{Document, EntityKind};

/// Abstract document store partitioned by environment.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_all`](Store::get_all) | Every document in a collection, in insertion order |
/// | [`find_one`](Store::find_one) | One document by id |
/// | [`find_by_text`](Store::find_by_text) | Case-insensitive text match via [`Document::matches_text`] |
/// | [`insert_many`](Store::insert_many) | Bulk insert; fails on an existing id |
/// | [`upsert`](Store::upsert) | Replace the record with the same id, else append |
/// | [`list_environments`](Store::list_environments) | Known environment names |
/// | [`clear_environment`](Store::clear_environment) | Drop every collection in an environment |
#[async_trait]
pub trait Store: Send + Sync {
    /// Return every document in `collection`, in insertion order.
    async fn get_all(&self, collection: EntityKind, environment: &str)
        -> StoreResult<Vec<Document>>;

    /// Return the document with `id`, if present.
    async fn find_one(
        &self,
        collection: EntityKind,
        id: &str,
        environment: &str,
    ) -> StoreResult<Option<Document>>;

    /// Return documents whose searchable text contains `text` (case-insensitive).
    async fn find_by_text(
        &self,
        collection: EntityKind,
        text: &str,
        environment: &str,
    ) -> StoreResult<Vec<Document>>;

    /// Insert documents that must not already exist.
    ///
    /// Either every document is written or none is.
    async fn insert_many(
        &self,
        collection: EntityKind,
        documents: &[Document],
        environment: &str,
    ) -> StoreResult<()>;

    /// Replace the document with the same id, or append it.
    async fn upsert(
        &self,
        collection: EntityKind,
        document: &Document,
        environment: &str,
    ) -> StoreResult<()>;

    /// Names of environments holding at least one document, sorted.
    async fn list_environments(&self) -> StoreResult<Vec<String>>;

    /// Remove every document in `environment`.
    async fn clear_environment(&self, environment: &str) -> StoreResult<()>;
}

/// Reject a document written into a collection of another kind.
pub fn check_kind(collection: EntityKind, document: &Document) -> StoreResult<()> {
    if document.kind() != collection {
        return Err(crate::error::StoreError::KindMismatch {
            expected: collection,
            found: document.kind(),
        });
    }
    Ok(())
}
