//! The per-request dependency closure.
//!
//! A [`Closure`] is built by [`resolve`](crate::resolver::resolve) and
//! consumed by the orchestrator in the same request. It is never persisted
//! or shared.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Document, EntityKind};

/// The root entity plus the ids it references one hop away.
#[derive(Debug, Clone, Default)]
pub struct Closure {
    root: Option<(EntityKind, String)>,
    entities: BTreeMap<EntityKind, Vec<Document>>,
    dependencies: BTreeMap<EntityKind, BTreeSet<String>>,
}

impl Closure {
    /// The "root not found" closure.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start a closure from the materialized root document.
    pub fn with_root(root: Document) -> Self {
        let kind = root.kind();
        let mut closure = Self {
            root: Some((kind, root.id().to_string())),
            ..Self::default()
        };
        closure.entities.entry(kind).or_default().push(root);
        closure
    }

    /// Record a referenced id verbatim. Blank ids are ignored.
    pub fn add_dependency(&mut self, kind: EntityKind, id: &str) {
        if id.trim().is_empty() {
            return;
        }
        self.dependencies
            .entry(kind)
            .or_default()
            .insert(id.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.entities.values().all(Vec::is_empty)
            && self.dependencies.values().all(BTreeSet::is_empty)
    }

    pub fn root_kind(&self) -> Option<EntityKind> {
        self.root.as_ref().map(|(kind, _)| *kind)
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root.as_ref().map(|(_, id)| id.as_str())
    }

    pub fn entities(&self) -> &BTreeMap<EntityKind, Vec<Document>> {
        &self.entities
    }

    pub fn dependencies(&self) -> &BTreeMap<EntityKind, BTreeSet<String>> {
        &self.dependencies
    }

    /// Union of collections holding explicit entities or dependency ids.
    pub fn collections(&self) -> BTreeSet<EntityKind> {
        self.entities
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(kind, _)| *kind)
            .chain(
                self.dependencies
                    .iter()
                    .filter(|(_, ids)| !ids.is_empty())
                    .map(|(kind, _)| *kind),
            )
            .collect()
    }

    /// Explicit ids plus dependency ids for one collection, deduplicated.
    pub fn required_ids(&self, kind: EntityKind) -> BTreeSet<&str> {
        let explicit = self
            .entities
            .get(&kind)
            .into_iter()
            .flatten()
            .map(Document::id);
        let referenced = self
            .dependencies
            .get(&kind)
            .into_iter()
            .flatten()
            .map(String::as_str);
        explicit.chain(referenced).collect()
    }

    /// Collections in copy order: every non-root collection in kind order,
    /// then the root's own collection last.
    pub fn copy_order(&self) -> Vec<EntityKind> {
        let root = self.root_kind();
        let mut order: Vec<EntityKind> = self
            .collections()
            .into_iter()
            .filter(|kind| Some(*kind) != root)
            .collect();
        if let Some(root) = root {
            order.push(root);
        }
        order
    }
}
