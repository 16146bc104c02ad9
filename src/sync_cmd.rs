//! `envsync preview` and `envsync commit`.
//!
//! Both commands print the report text to stdout and exit non-zero only on
//! a request-level failure. A missing root is a normal report. Pressing
//! Ctrl-C during a commit stops it before the next record and prints the
//! partial report.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::warn;

use envsync_core::{CancelFlag, EntityKind, SyncOrchestrator, SyncReport};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

fn parse_kind(kind: &str) -> Result<EntityKind> {
    match kind.parse() {
        Ok(kind) => Ok(kind),
        Err(e) => bail!(e),
    }
}

async fn orchestrator(config: &Config) -> Result<SyncOrchestrator<SqliteStore>> {
    let store = Arc::new(SqliteStore::open(config).await?);
    Ok(SyncOrchestrator::new(store, config.sync.options()))
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

pub async fn run_preview(
    config: &Config,
    id: &str,
    kind: &str,
    source: Option<&str>,
    json: bool,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let source = source.unwrap_or(config.sync.default_source.as_str());

    let orchestrator = orchestrator(config).await?;
    let report = orchestrator.preview(kind, id, source).await?;
    orchestrator.store().pool().close().await;

    print_report(&report, json)
}

pub async fn run_commit(
    config: &Config,
    id: &str,
    kind: &str,
    source: Option<&str>,
    target: Option<&str>,
    json: bool,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let source = source.unwrap_or(config.sync.default_source.as_str());
    let target = target.unwrap_or(config.sync.default_target.as_str());

    let orchestrator = orchestrator(config).await?;

    let cancel = CancelFlag::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after the current record");
                cancel.cancel();
            }
        })
    };

    let result = orchestrator
        .commit_with_cancel(kind, id, source, target, &cancel)
        .await;
    watcher.abort();
    orchestrator.store().pool().close().await;

    print_report(&result?, json)
}
