//! SQLite-backed [`Store`] implementation.
//!
//! Every environment shares one `documents` table keyed by
//! `(environment, collection, id)`. The record itself lives in `body` as
//! JSON; `search_text` holds the lowercased text that `find_by_text`
//! matches against, and `seq` preserves insertion order within a
//! partition.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use envsync_core::error::{StoreError, StoreResult};
use envsync_core::models::{Document, EntityKind};
use envsync_core::store::{check_kind, Store};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Document count per collection in `environment`.
    pub async fn collection_counts(
        &self,
        environment: &str,
    ) -> StoreResult<Vec<(EntityKind, i64)>> {
        let rows = sqlx::query(
            "SELECT collection, COUNT(*) AS n FROM documents WHERE environment = ? GROUP BY collection",
        )
        .bind(environment)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_err(e, environment))?;

        let mut counts = Vec::new();
        for row in rows {
            let collection: String = row.get("collection");
            let n: i64 = row.get("n");
            let kind = collection
                .parse::<EntityKind>()
                .map_err(StoreError::Backend)?;
            counts.push((kind, n));
        }
        counts.sort_by_key(|(kind, _)| *kind);
        Ok(counts)
    }
}

/// Environment-wide failures become `Unavailable`; anything else is scoped
/// to the statement that raised it.
fn map_err(err: sqlx::Error, environment: &str) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => StoreError::unavailable(environment, err.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

fn decode(kind: EntityKind, body: &str) -> StoreResult<Document> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| StoreError::Backend(e.to_string()))?;
    Document::from_json(kind, value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn encode(document: &Document) -> StoreResult<String> {
    serde_json::to_string(document).map_err(|e| StoreError::Backend(e.to_string()))
}

fn decode_rows(kind: EntityKind, rows: Vec<sqlx::sqlite::SqliteRow>) -> StoreResult<Vec<Document>> {
    rows.iter()
        .map(|row| {
            let body: String = row.get("body");
            decode(kind, &body)
        })
        .collect()
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_all(
        &self,
        collection: EntityKind,
        environment: &str,
    ) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT body FROM documents WHERE environment = ? AND collection = ? ORDER BY seq",
        )
        .bind(environment)
        .bind(collection.collection())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_err(e, environment))?;

        decode_rows(collection, rows)
    }

    async fn find_one(
        &self,
        collection: EntityKind,
        id: &str,
        environment: &str,
    ) -> StoreResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT body FROM documents WHERE environment = ? AND collection = ? AND id = ?",
        )
        .bind(environment)
        .bind(collection.collection())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_err(e, environment))?;

        match row {
            Some(row) => {
                let body: String = row.get("body");
                decode(collection, &body).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn find_by_text(
        &self,
        collection: EntityKind,
        text: &str,
        environment: &str,
    ) -> StoreResult<Vec<Document>> {
        let needle = text.trim().to_lowercase();
        let rows = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE environment = ? AND collection = ? AND instr(search_text, ?) > 0
            ORDER BY seq
            "#,
        )
        .bind(environment)
        .bind(collection.collection())
        .bind(&needle)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_err(e, environment))?;

        decode_rows(collection, rows)
    }

    async fn insert_many(
        &self,
        collection: EntityKind,
        documents: &[Document],
        environment: &str,
    ) -> StoreResult<()> {
        for doc in documents {
            check_kind(collection, doc)?;
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_err(e, environment))?;

        let next_seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM documents WHERE environment = ? AND collection = ?",
        )
        .bind(environment)
        .bind(collection.collection())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_err(e, environment))?;

        for (offset, doc) in documents.iter().enumerate() {
            let exists = sqlx::query(
                "SELECT 1 FROM documents WHERE environment = ? AND collection = ? AND id = ?",
            )
            .bind(environment)
            .bind(collection.collection())
            .bind(doc.id())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_err(e, environment))?;

            if exists.is_some() {
                // Dropping the transaction rolls back the earlier rows.
                return Err(StoreError::Conflict {
                    collection,
                    id: doc.id().to_string(),
                    environment: environment.to_string(),
                });
            }

            sqlx::query(
                r#"
                INSERT INTO documents (environment, collection, id, seq, body, search_text, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(environment)
            .bind(collection.collection())
            .bind(doc.id())
            .bind(next_seq + offset as i64)
            .bind(encode(doc)?)
            .bind(doc.search_text())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_err(e, environment))?;
        }

        if !documents.is_empty() {
            sqlx::query("INSERT OR IGNORE INTO environments (name, created_at) VALUES (?, ?)")
                .bind(environment)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_err(e, environment))?;
        }

        tx.commit().await.map_err(|e| map_err(e, environment))?;
        Ok(())
    }

    async fn upsert(
        &self,
        collection: EntityKind,
        document: &Document,
        environment: &str,
    ) -> StoreResult<()> {
        check_kind(collection, document)?;
        let now = chrono::Utc::now().timestamp();
        let body = encode(document)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_err(e, environment))?;

        sqlx::query(
            r#"
            INSERT INTO documents (environment, collection, id, seq, body, search_text, updated_at)
            VALUES (?, ?, ?,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM documents WHERE environment = ? AND collection = ?),
                    ?, ?, ?)
            ON CONFLICT(environment, collection, id) DO UPDATE SET
                body = excluded.body,
                search_text = excluded.search_text,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(environment)
        .bind(collection.collection())
        .bind(document.id())
        .bind(environment)
        .bind(collection.collection())
        .bind(&body)
        .bind(document.search_text())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_err(e, environment))?;

        sqlx::query("INSERT OR IGNORE INTO environments (name, created_at) VALUES (?, ?)")
            .bind(environment)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_err(e, environment))?;

        tx.commit().await.map_err(|e| map_err(e, environment))?;
        Ok(())
    }

    async fn list_environments(&self) -> StoreResult<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT environment FROM documents ORDER BY environment")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_err(e, "*"))?;
        Ok(names)
    }

    async fn clear_environment(&self, environment: &str) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_err(e, environment))?;

        sqlx::query("DELETE FROM documents WHERE environment = ?")
            .bind(environment)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_err(e, environment))?;

        sqlx::query("DELETE FROM environments WHERE name = ?")
            .bind(environment)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_err(e, environment))?;

        tx.commit().await.map_err(|e| map_err(e, environment))?;
        Ok(())
    }
}
