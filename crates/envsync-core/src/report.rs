//! Preview and commit reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::models::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Preview,
    Commit,
}

/// A `(collection, id)` pair named in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRef {
    #[serde(serialize_with = "collection_name")]
    pub collection: EntityKind,
    pub id: String,
}

/// A record whose copy failed; excluded from the counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    #[serde(serialize_with = "collection_name")]
    pub collection: EntityKind,
    pub id: String,
    pub error: String,
}

/// Serialize a kind by its collection name, matching `perCollectionCounts`.
fn collection_name<S: Serializer>(kind: &EntityKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.collection())
}

/// Outcome of a preview or commit.
///
/// For a preview the counts are the ids the closure requires; for a
/// commit they are the records actually written to the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub root_id: String,
    pub root_kind: EntityKind,
    pub mode: SyncMode,
    pub source_environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_environment: Option<String>,
    pub per_collection_counts: BTreeMap<String, usize>,
    pub total_count: usize,
    pub not_found: bool,
    /// Referenced ids with no backing document in the source.
    pub missing: Vec<RecordRef>,
    pub failed: Vec<FailedRecord>,
    pub cancelled: bool,
}

impl SyncReport {
    pub(crate) fn new(
        mode: SyncMode,
        root_kind: EntityKind,
        root_id: &str,
        source: &str,
        target: Option<&str>,
    ) -> Self {
        Self {
            root_id: root_id.to_string(),
            root_kind,
            mode,
            source_environment: source.to_string(),
            target_environment: target.map(str::to_string),
            per_collection_counts: BTreeMap::new(),
            total_count: 0,
            not_found: false,
            missing: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
        }
    }

    pub(crate) fn not_found(mut self) -> Self {
        self.not_found = true;
        self
    }

    pub(crate) fn set_count(&mut self, kind: EntityKind, count: usize) {
        self.per_collection_counts
            .insert(kind.collection().to_string(), count);
        self.total_count = self.per_collection_counts.values().sum();
    }

    /// Count for one collection, zero when absent.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.per_collection_counts
            .get(kind.collection())
            .copied()
            .unwrap_or(0)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.not_found {
            return write!(
                f,
                "{} '{}' not found in environment '{}'.",
                self.root_kind.name(),
                self.root_id, self.source_environment
            );
        }

        match (self.mode, &self.target_environment) {
            (SyncMode::Commit, Some(target)) => writeln!(
                f,
                "Synced {} '{}' from '{}' to '{}'{}",
                self.root_kind.name(),
                self.root_id,
                self.source_environment,
                target,
                if self.cancelled { " (cancelled)" } else { "" }
            )?,
            _ => writeln!(
                f,
                "Sync preview for {} '{}' in '{}'",
                self.root_kind.name(),
                self.root_id, self.source_environment
            )?,
        }

        for (collection, count) in &self.per_collection_counts {
            writeln!(f, "  {:<14} {}", collection, count)?;
        }
        write!(f, "  {:<14} {}", "total", self.total_count)?;

        if !self.missing.is_empty() {
            write!(f, "\nmissing in source:")?;
            for r in &self.missing {
                write!(f, "\n  {}/{}", r.collection, r.id)?;
            }
        }
        if !self.failed.is_empty() {
            write!(f, "\nfailed:")?;
            for r in &self.failed {
                write!(f, "\n  {}/{}: {}", r.collection, r.id, r.error)?;
            }
        }
        Ok(())
    }
}
