//! Environment management commands: `import`, `envs`, and `clear`.
//!
//! A fixture file is a JSON object keyed by collection name, each holding
//! an array of records of that kind:
//!
//! ```json
//! {
//!   "games": [{ "id": "g1", "date": "2024-03-10T15:00:00Z", "homeTeam": { "id": "t1" } }],
//!   "teams": [{ "id": "t1", "name": "Arsenal" }]
//! }
//! ```
//!
//! Every collection is checked for ids that already exist in the target
//! environment before anything is written, so a conflicting file imports
//! nothing. Each collection is then inserted with `insert_many`.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use envsync_core::models::{Document, EntityKind};
use envsync_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Parse a fixture file body into documents grouped by kind.
pub fn parse_fixture(content: &str) -> Result<BTreeMap<EntityKind, Vec<Document>>> {
    let root: Value = serde_json::from_str(content).context("fixture is not valid JSON")?;
    let Value::Object(collections) = root else {
        bail!("fixture must be a JSON object keyed by collection name");
    };

    let mut grouped = BTreeMap::new();
    for (name, records) in collections {
        let kind: EntityKind = match name.parse() {
            Ok(kind) => kind,
            Err(e) => bail!(e),
        };
        let Value::Array(records) = records else {
            bail!("fixture collection '{}' must be an array", name);
        };

        let mut docs = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let doc = Document::from_json(kind, record)
                .with_context(|| format!("invalid record #{} in '{}'", i, name))?;
            docs.push(doc);
        }
        grouped.insert(kind, docs);
    }
    Ok(grouped)
}

/// Insert grouped fixture documents into `environment`.
///
/// Fails without writing when any id already exists there. Returns the
/// number of records written.
pub async fn import_documents<S: Store + ?Sized>(
    store: &S,
    grouped: &BTreeMap<EntityKind, Vec<Document>>,
    environment: &str,
) -> Result<usize> {
    let mut conflicts = Vec::new();
    for (kind, docs) in grouped {
        for doc in docs {
            if store.find_one(*kind, doc.id(), environment).await?.is_some() {
                conflicts.push(format!("{}/{}", kind.collection(), doc.id()));
            }
        }
    }
    if !conflicts.is_empty() {
        bail!(
            "{} record(s) already exist in '{}': {}",
            conflicts.len(),
            environment,
            conflicts.join(", ")
        );
    }

    let mut total = 0;
    for (kind, docs) in grouped {
        store
            .insert_many(*kind, docs, environment)
            .await
            .with_context(|| format!("Failed to import {} into '{}'", kind, environment))?;
        info!(collection = %kind, count = docs.len(), environment, "imported");
        total += docs.len();
    }
    Ok(total)
}

/// `envsync import <environment> <file>`.
pub async fn run_import(config: &Config, environment: &str, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read fixture file: {}", file.display()))?;
    let grouped = parse_fixture(&content)?;

    let store = SqliteStore::open(config).await?;
    let imported = import_documents(&store, &grouped, environment).await;
    store.pool().close().await;
    let total = imported?;

    for (kind, docs) in &grouped {
        println!("  {:<14} {}", kind.collection(), docs.len());
    }
    println!("Imported {} record(s) into '{}'.", total, environment);
    Ok(())
}

/// `envsync envs`: every environment with its per-collection counts.
pub async fn run_envs(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let environments = store.list_environments().await?;

    if environments.is_empty() {
        println!("No environments hold data.");
    }

    for environment in &environments {
        let since = sqlx::query("SELECT created_at FROM environments WHERE name = ?")
            .bind(environment)
            .fetch_optional(store.pool())
            .await?
            .and_then(|row| chrono::DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0))
            .map(|dt| format!(" (since {})", dt.format("%Y-%m-%d %H:%M:%S UTC")))
            .unwrap_or_default();

        println!("{}{}", environment, since);
        for (kind, count) in store.collection_counts(environment).await? {
            println!("  {:<14} {}", kind.collection(), count);
        }
    }

    store.pool().close().await;
    Ok(())
}

/// `envsync clear <environment>`.
pub async fn run_clear(config: &Config, environment: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    store.clear_environment(environment).await?;
    store.pool().close().await;

    info!(environment, "environment cleared");
    println!("Cleared environment '{}'.", environment);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsync_core::store::memory::InMemoryStore;

    #[test]
    fn test_parse_fixture_groups_by_kind() {
        let grouped = parse_fixture(
            r#"{
                "teams": [{ "id": "t1", "name": "Arsenal" }, { "id": "t2", "name": "Chelsea" }],
                "games": [{ "id": "g1", "date": "2024-03-10T15:00:00Z",
                            "homeTeam": { "id": "t1", "name": "Arsenal" } }]
            }"#,
        )
        .unwrap();

        assert_eq!(grouped[&EntityKind::Team].len(), 2);
        assert_eq!(grouped[&EntityKind::Game][0].id(), "g1");
        assert_eq!(grouped.keys().next(), Some(&EntityKind::Game));
    }

    #[test]
    fn test_unknown_collection_rejected() {
        assert!(parse_fixture(r#"{ "stadiums": [] }"#).is_err());
    }

    #[test]
    fn test_non_array_collection_rejected() {
        let err = parse_fixture(r#"{ "teams": { "id": "t1" } }"#).unwrap_err();
        assert!(err.to_string().contains("must be an array"));
    }

    #[test]
    fn test_bad_record_names_its_position() {
        let err = parse_fixture(r#"{ "games": [{ "id": "g1" }] }"#).unwrap_err();
        assert!(err.to_string().contains("invalid record #0 in 'games'"));
    }

    #[tokio::test]
    async fn test_conflicting_import_writes_nothing() {
        let store = InMemoryStore::new();
        let first = parse_fixture(r#"{ "teams": [{ "id": "t1", "name": "Arsenal" }] }"#).unwrap();
        assert_eq!(import_documents(&store, &first, "Production").await.unwrap(), 1);

        // "games" sorts before "teams", so it would be written first.
        let second = parse_fixture(
            r#"{
                "games": [{ "id": "g1", "date": "2024-03-10T15:00:00Z" }],
                "teams": [{ "id": "t1", "name": "Arsenal" }]
            }"#,
        )
        .unwrap();
        let err = import_documents(&store, &second, "Production")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exist in 'Production': teams/t1"));
        assert!(store
            .get_all(EntityKind::Game, "Production")
            .await
            .unwrap()
            .is_empty());
    }
}
