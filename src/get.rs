//! Document retrieval by collection and id (`envsync get`).

use anyhow::{bail, Result};

use envsync_core::models::{Document, EntityKind};
use envsync_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Fetch one document from `environment`, failing when it is absent.
pub async fn get_document(
    config: &Config,
    collection: EntityKind,
    id: &str,
    environment: &str,
) -> Result<Document> {
    let store = SqliteStore::open(config).await?;
    let doc = store.find_one(collection, id, environment).await?;
    store.pool().close().await;

    match doc {
        Some(doc) => Ok(doc),
        None => bail!(
            "{} '{}' not found in environment '{}'",
            collection.name(),
            id,
            environment
        ),
    }
}

/// CLI entry point. Prints the document as pretty JSON, including any
/// `syncInfo` stamped by a previous commit.
pub async fn run_get(
    config: &Config,
    collection: &str,
    id: &str,
    environment: Option<&str>,
) -> Result<()> {
    let kind: EntityKind = match collection.parse() {
        Ok(kind) => kind,
        Err(e) => bail!(e),
    };
    let environment = environment.unwrap_or(config.sync.default_source.as_str());

    let doc = get_document(config, kind, id, environment).await?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
