//! Sync orchestrator: preview and commit.
//!
//! Both entry points start from the same [`resolve`] step. A preview only
//! counts what the closure requires. A commit copies every required record
//! from the source environment to the target, non-root collections first
//! and the root's collection last, so a reader of the target never sees a
//! root whose dependencies have not been written yet. This is a
//! forward-consistency ordering, not a transaction.
//!
//! # Failure Handling
//!
//! | Condition | Effect |
//! |-----------|--------|
//! | root absent | report with `not_found`, no writes |
//! | referenced id absent in source | skipped, listed in `missing` |
//! | fetch/upsert fails for one id | logged, listed in `failed`, batch continues |
//! | environment unreachable | whole request fails with [`SyncError::StoreUnavailable`] |
//!
//! Each record copy holds the [`KeyLocks`] entry for
//! `(target, collection, id)`, so overlapping commits that share a
//! dependency write it one at a time.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::error::{StoreError, SyncError};
use crate::locks::KeyLocks;
use crate::models::{EntityKind, SyncMetadata};
use crate::report::{FailedRecord, RecordRef, SyncMode, SyncReport};
use crate::resolver::resolve;
use crate::store::Store;

/// Actor tag stamped on copied records unless configured otherwise.
pub const DEFAULT_ACTOR: &str = "envsync";

/// Version written into every fresh [`SyncMetadata`].
pub const SYNC_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Value written to `syncInfo.syncedBy`.
    pub actor: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

enum CopyOutcome {
    Copied,
    Missing,
}

/// Drives preview and commit against one store.
///
/// Cheap to clone; the store and lock table are shared.
pub struct SyncOrchestrator<S: Store + ?Sized> {
    store: Arc<S>,
    locks: Arc<KeyLocks>,
    options: SyncOptions,
}

impl<S: Store + ?Sized> Clone for SyncOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S: Store + ?Sized> SyncOrchestrator<S> {
    /// Create an orchestrator with its own lock table.
    pub fn new(store: Arc<S>, options: SyncOptions) -> Self {
        Self::with_locks(store, Arc::new(KeyLocks::new()), options)
    }

    /// Create an orchestrator sharing `locks` with other orchestrators
    /// over the same store.
    pub fn with_locks(store: Arc<S>, locks: Arc<KeyLocks>, options: SyncOptions) -> Self {
        Self {
            store,
            locks,
            options,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Count what a commit of `root_kind/root_id` would copy. Never writes.
    pub async fn preview(
        &self,
        root_kind: EntityKind,
        root_id: &str,
        source: &str,
    ) -> Result<SyncReport, SyncError> {
        let report = SyncReport::new(SyncMode::Preview, root_kind, root_id, source, None);
        let closure = resolve(self.store.as_ref(), root_kind, root_id, source).await?;
        if closure.is_empty() {
            return Ok(report.not_found());
        }

        let mut report = report;
        for kind in closure.collections() {
            report.set_count(kind, closure.required_ids(kind).len());
        }
        info!(
            collection = %root_kind,
            id = root_id,
            source,
            total = report.total_count,
            "sync preview"
        );
        Ok(report)
    }

    /// Copy the closure of `root_kind/root_id` from `source` to `target`.
    pub async fn commit(
        &self,
        root_kind: EntityKind,
        root_id: &str,
        source: &str,
        target: &str,
    ) -> Result<SyncReport, SyncError> {
        self.commit_with_cancel(root_kind, root_id, source, target, &CancelFlag::new())
            .await
    }

    /// Like [`commit`](Self::commit), stopping before the next record once
    /// `cancel` is set. The returned report carries the partial counts and
    /// `cancelled = true`.
    pub async fn commit_with_cancel(
        &self,
        root_kind: EntityKind,
        root_id: &str,
        source: &str,
        target: &str,
        cancel: &CancelFlag,
    ) -> Result<SyncReport, SyncError> {
        if source == target {
            return Err(SyncError::SameEnvironment(source.to_string()));
        }

        let mut report =
            SyncReport::new(SyncMode::Commit, root_kind, root_id, source, Some(target));
        let closure = resolve(self.store.as_ref(), root_kind, root_id, source).await?;
        if closure.is_empty() {
            return Ok(report.not_found());
        }

        'collections: for kind in closure.copy_order() {
            let mut synced = 0;
            for id in closure.required_ids(kind) {
                if cancel.is_cancelled() {
                    report.set_count(kind, synced);
                    report.cancelled = true;
                    break 'collections;
                }
                match self.copy_one(kind, id, source, target).await {
                    Ok(CopyOutcome::Copied) => synced += 1,
                    Ok(CopyOutcome::Missing) => {
                        debug!(collection = %kind, id, source, "dangling reference skipped");
                        report.missing.push(RecordRef {
                            collection: kind,
                            id: id.to_string(),
                        });
                    }
                    Err(err) if err.is_unavailable() => {
                        return Err(SyncError::StoreUnavailable(err));
                    }
                    Err(err) => {
                        warn!(collection = %kind, id, error = %err, "failed to sync record");
                        report.failed.push(FailedRecord {
                            collection: kind,
                            id: id.to_string(),
                            error: err.to_string(),
                        });
                    }
                }
            }
            report.set_count(kind, synced);
        }

        info!(
            collection = %root_kind,
            id = root_id,
            source,
            target_env = target,
            total = report.total_count,
            missing = report.missing.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "sync commit"
        );
        Ok(report)
    }

    async fn copy_one(
        &self,
        kind: EntityKind,
        id: &str,
        source: &str,
        target: &str,
    ) -> Result<CopyOutcome, StoreError> {
        let _guard = self.locks.acquire(target, kind, id).await;

        let mut doc = match self.store.find_one(kind, id, source).await? {
            Some(doc) => doc,
            None => return Ok(CopyOutcome::Missing),
        };
        doc.set_sync_info(SyncMetadata {
            synced_at: Utc::now(),
            source_environment: source.to_string(),
            synced_by: self.options.actor.clone(),
            version: SYNC_VERSION,
        });
        self.store.upsert(kind, &doc, target).await?;
        Ok(CopyOutcome::Copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use crate::models::{Competition, Document, Game, Reference, Season, Team};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn game(id: &str, home: &str, away: &str) -> Document {
        Document::Game(Game {
            id: id.to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap(),
            home_team: Some(Reference::named(home, "Man Utd")),
            away_team: Some(Reference::named(away, "Liverpool")),
            competition: Some(Reference::named("c1", "Premier League")),
            season: Some(Reference::named("s1", "2023/24")),
            league: None,
            venue: Some("Old Trafford".to_string()),
            home_score: Some(2),
            away_score: Some(1),
            status: Some("finished".to_string()),
            sync_info: None,
        })
    }

    fn team(id: &str, name: &str) -> Document {
        Document::Team(Team {
            id: id.to_string(),
            name: name.to_string(),
            short_name: None,
            country: Some("England".to_string()),
            founded: None,
            players: vec![Reference::new("p1")],
            competitions: vec![Reference::new("c1")],
            sync_info: None,
        })
    }

    async fn seeded() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_many(EntityKind::Game, &[game("g1", "t1", "t2")], "Production")
            .await
            .unwrap();
        store
            .insert_many(
                EntityKind::Team,
                &[team("t1", "Man Utd"), team("t2", "Liverpool")],
                "Production",
            )
            .await
            .unwrap();
        store
            .insert_many(
                EntityKind::Competition,
                &[Document::Competition(Competition {
                    id: "c1".to_string(),
                    name: "Premier League".to_string(),
                    code: Some("EPL".to_string()),
                    country: Some("England".to_string()),
                    seasons: vec![Reference::new("s1")],
                    participating_teams: vec![Reference::new("t1"), Reference::new("t2")],
                    sync_info: None,
                })],
                "Production",
            )
            .await
            .unwrap();
        store
            .insert_many(
                EntityKind::Season,
                &[Document::Season(Season {
                    id: "s1".to_string(),
                    name: "2023/24".to_string(),
                    start_date: None,
                    end_date: None,
                    is_current: true,
                    sync_info: None,
                })],
                "Production",
            )
            .await
            .unwrap();
        store
    }

    fn orchestrator<S: Store + ?Sized>(store: Arc<S>) -> SyncOrchestrator<S> {
        SyncOrchestrator::new(store, SyncOptions::default())
    }

    async fn target_ids(store: &InMemoryStore, kind: EntityKind) -> BTreeSet<String> {
        store
            .get_all(kind, "Local")
            .await
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_commit_copies_closure_with_provenance() {
        let store = seeded().await;
        let report = orchestrator(store.clone())
            .commit(EntityKind::Game, "g1", "Production", "Local")
            .await
            .unwrap();

        assert!(!report.not_found);
        assert_eq!(report.count(EntityKind::Game), 1);
        assert_eq!(report.count(EntityKind::Team), 2);
        assert_eq!(report.count(EntityKind::Competition), 1);
        assert_eq!(report.count(EntityKind::Season), 1);
        assert_eq!(report.total_count, 5);
        assert!(report.missing.is_empty());
        assert!(report.failed.is_empty());

        let synced = store
            .find_one(EntityKind::Game, "g1", "Local")
            .await
            .unwrap()
            .unwrap();
        let info = synced.sync_info().unwrap();
        assert_eq!(info.source_environment, "Production");
        assert_eq!(info.synced_by, DEFAULT_ACTOR);
        assert_eq!(info.version, 1);

        // Team players are not part of a game's closure.
        assert!(target_ids(&store, EntityKind::Player).await.is_empty());
        // Source records are untouched.
        let original = store
            .find_one(EntityKind::Game, "g1", "Production")
            .await
            .unwrap()
            .unwrap();
        assert!(original.sync_info().is_none());
    }

    #[tokio::test]
    async fn test_padded_reference_ids_copied_verbatim() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_many(EntityKind::Game, &[game("g1", " t1", "t2 ")], "Production")
            .await
            .unwrap();
        store
            .insert_many(
                EntityKind::Team,
                &[team(" t1", "Man Utd"), team("t2 ", "Liverpool")],
                "Production",
            )
            .await
            .unwrap();

        let report = orchestrator(store.clone())
            .commit(EntityKind::Game, "g1", "Production", "Local")
            .await
            .unwrap();

        assert_eq!(report.count(EntityKind::Team), 2);
        assert!(report
            .missing
            .iter()
            .all(|r| r.collection != EntityKind::Team));
        let teams = target_ids(&store, EntityKind::Team).await;
        assert!(teams.contains(" t1"));
        assert!(teams.contains("t2 "));
    }

    #[tokio::test]
    async fn test_commit_is_idempotent() {
        let store = seeded().await;
        let orch = orchestrator(store.clone());
        let first = orch
            .commit(EntityKind::Game, "g1", "Production", "Local")
            .await
            .unwrap();
        let teams_after_first = target_ids(&store, EntityKind::Team).await;

        let second = orch
            .commit(EntityKind::Game, "g1", "Production", "Local")
            .await
            .unwrap();
        assert_eq!(first.per_collection_counts, second.per_collection_counts);
        assert_eq!(first.total_count, second.total_count);
        assert_eq!(target_ids(&store, EntityKind::Team).await, teams_after_first);
        assert_eq!(store.get_all(EntityKind::Team, "Local").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_preview_matches_commit_without_dangling_references() {
        let store = seeded().await;
        let orch = orchestrator(store.clone());
        let writes_before = store.write_count();
        let preview = orch
            .preview(EntityKind::Game, "g1", "Production")
            .await
            .unwrap();
        assert_eq!(store.write_count(), writes_before);

        let commit = orch
            .commit(EntityKind::Game, "g1", "Production", "Local")
            .await
            .unwrap();
        assert_eq!(preview.total_count, commit.total_count);
        assert_eq!(preview.per_collection_counts, commit.per_collection_counts);
        assert_eq!(preview.mode, SyncMode::Preview);
        assert_eq!(preview.target_environment, None);
    }

    #[tokio::test]
    async fn test_dangling_reference_is_skipped() {
        let store = seeded().await;
        store
            .insert_many(EntityKind::Game, &[game("g2", "t1", "t404")], "Production")
            .await
            .unwrap();

        let report = orchestrator(store.clone())
            .commit(EntityKind::Game, "g2", "Production", "Local")
            .await
            .unwrap();
        assert_eq!(report.count(EntityKind::Team), 1);
        assert_eq!(report.total_count, 4);
        assert_eq!(
            report.missing,
            vec![RecordRef {
                collection: EntityKind::Team,
                id: "t404".to_string()
            }]
        );
        assert!(store
            .find_one(EntityKind::Team, "t404", "Local")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_root_reports_not_found_without_writes() {
        let store = seeded().await;
        let orch = orchestrator(store.clone());
        let writes_before = store.write_count();

        let preview = orch
            .preview(EntityKind::Game, "missing-id", "Production")
            .await
            .unwrap();
        let commit = orch
            .commit(EntityKind::Game, "missing-id", "Production", "Local")
            .await
            .unwrap();

        assert!(preview.not_found);
        assert!(commit.not_found);
        assert_eq!(commit.total_count, 0);
        assert_eq!(store.write_count(), writes_before);
        assert_eq!(
            store.list_environments().await.unwrap(),
            vec!["Production".to_string()]
        );
    }

    #[tokio::test]
    async fn test_same_environment_is_rejected() {
        let store = seeded().await;
        let err = orchestrator(store)
            .commit(EntityKind::Game, "g1", "Production", "Production")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SameEnvironment(_)));
    }

    #[tokio::test]
    async fn test_offline_target_aborts_request() {
        let store = seeded().await;
        store.set_offline("Local", true);
        let err = orchestrator(store)
            .commit(EntityKind::Game, "g1", "Production", "Local")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::StoreUnavailable(_)));
    }

    /// Delegates to an inner store but fails upserts for one id, and can
    /// trip a cancel flag after the first successful upsert.
    struct FlakyStore {
        inner: Arc<InMemoryStore>,
        fail_id: Option<String>,
        cancel_after_first: Option<CancelFlag>,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn get_all(&self, c: EntityKind, env: &str) -> StoreResult<Vec<Document>> {
            self.inner.get_all(c, env).await
        }
        async fn find_one(
            &self,
            c: EntityKind,
            id: &str,
            env: &str,
        ) -> StoreResult<Option<Document>> {
            self.inner.find_one(c, id, env).await
        }
        async fn find_by_text(
            &self,
            c: EntityKind,
            text: &str,
            env: &str,
        ) -> StoreResult<Vec<Document>> {
            self.inner.find_by_text(c, text, env).await
        }
        async fn insert_many(
            &self,
            c: EntityKind,
            docs: &[Document],
            env: &str,
        ) -> StoreResult<()> {
            self.inner.insert_many(c, docs, env).await
        }
        async fn upsert(&self, c: EntityKind, doc: &Document, env: &str) -> StoreResult<()> {
            if self.fail_id.as_deref() == Some(doc.id()) {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.inner.upsert(c, doc, env).await?;
            if let Some(flag) = &self.cancel_after_first {
                flag.cancel();
            }
            Ok(())
        }
        async fn list_environments(&self) -> StoreResult<Vec<String>> {
            self.inner.list_environments().await
        }
        async fn clear_environment(&self, env: &str) -> StoreResult<()> {
            self.inner.clear_environment(env).await
        }
    }

    #[tokio::test]
    async fn test_per_record_failure_does_not_abort_batch() {
        let inner = seeded().await;
        let store = Arc::new(FlakyStore {
            inner: inner.clone(),
            fail_id: Some("t2".to_string()),
            cancel_after_first: None,
        });

        let report = orchestrator(store)
            .commit(EntityKind::Game, "g1", "Production", "Local")
            .await
            .unwrap();
        assert_eq!(report.count(EntityKind::Team), 1);
        assert_eq!(report.total_count, 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "t2");
        assert!(inner
            .find_one(EntityKind::Game, "g1", "Local")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_cancel_stops_issuing_new_records() {
        let inner = seeded().await;
        let flag = CancelFlag::new();
        let store = Arc::new(FlakyStore {
            inner: inner.clone(),
            fail_id: None,
            cancel_after_first: Some(flag.clone()),
        });

        let report = orchestrator(store)
            .commit_with_cancel(EntityKind::Game, "g1", "Production", "Local", &flag)
            .await
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.total_count, 1);
        // The root collection is copied last, so the root never made it.
        assert!(inner
            .find_one(EntityKind::Game, "g1", "Local")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cancel_before_start_writes_nothing() {
        let store = seeded().await;
        let flag = CancelFlag::new();
        flag.cancel();
        let writes_before = store.write_count();
        let report = orchestrator(store.clone())
            .commit_with_cancel(EntityKind::Game, "g1", "Production", "Local", &flag)
            .await
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.total_count, 0);
        assert_eq!(store.write_count(), writes_before);
    }

    #[tokio::test]
    async fn test_concurrent_commits_sharing_dependencies() {
        let store = seeded().await;
        store
            .insert_many(EntityKind::Game, &[game("g2", "t2", "t1")], "Production")
            .await
            .unwrap();
        let orch = orchestrator(store.clone());

        let a = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.commit(EntityKind::Game, "g1", "Production", "Local")
                    .await
            })
        };
        let b = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.commit(EntityKind::Game, "g2", "Production", "Local")
                    .await
            })
        };
        let ra = a.await.unwrap().unwrap();
        let rb = b.await.unwrap().unwrap();
        assert_eq!(ra.total_count, 5);
        assert_eq!(rb.total_count, 5);

        assert_eq!(store.get_all(EntityKind::Team, "Local").await.unwrap().len(), 2);
        assert_eq!(store.get_all(EntityKind::Game, "Local").await.unwrap().len(), 2);
        assert_eq!(
            store
                .get_all(EntityKind::Competition, "Local")
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
