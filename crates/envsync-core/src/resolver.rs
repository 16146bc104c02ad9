//! Dependency resolver.
//!
//! Builds a one-hop [`Closure`] for a root document: the root itself plus
//! every id named by the reference fields its kind declares. References of
//! references are not followed, so the closure of a game holds its teams
//! but not the teams' players.
//!
//! A missing root yields an empty closure rather than an error; callers
//! must check [`Closure::is_empty`]. Referenced ids are not checked for
//! existence here.

use tracing::debug;

use crate::closure::Closure;
use crate::error::SyncError;
use crate::models::EntityKind;
use crate::store::Store;

/// Resolve the closure of `root_kind/root_id` in `source_environment`.
///
/// # Errors
///
/// Any store failure while fetching the root surfaces as
/// [`SyncError::StoreUnavailable`].
pub async fn resolve<S: Store + ?Sized>(
    store: &S,
    root_kind: EntityKind,
    root_id: &str,
    source_environment: &str,
) -> Result<Closure, SyncError> {
    let root = match store
        .find_one(root_kind, root_id, source_environment)
        .await?
    {
        Some(doc) => doc,
        None => {
            debug!(
                collection = %root_kind,
                id = root_id,
                environment = source_environment,
                "root not found"
            );
            return Ok(Closure::empty());
        }
    };

    let mut closure = Closure::with_root(root.clone());
    for edge in root.edges() {
        closure.add_dependency(edge.field.target, edge.id);
    }

    debug!(
        collection = %root_kind,
        id = root_id,
        environment = source_environment,
        dependencies = closure.dependencies().values().map(|ids| ids.len()).sum::<usize>(),
        "resolved closure"
    );
    Ok(closure)
}
