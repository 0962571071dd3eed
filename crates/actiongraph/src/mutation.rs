//! Structural mutations of the containment tree.
//!
//! Deletion under the three [`DeletePolicy`] variants, moving and detaching
//! actions, and the read-side traversals (children, descendants, ancestor
//! chain).
//!
//! Every multi-row change follows the same shape:
//!
//! 1. Load a `family` [`EdgeIndex`] from the store (one round-trip)
//! 2. Apply the planned removals and insertions to that scratch copy,
//!    checking each insertion with the invariant checks
//! 3. Commit the plan as one [`StoreBatch`]
//!
//! A rejected plan never reaches the store, and a batch that fails at commit
//! time (for example because a concurrent task deleted a row) is rolled back
//! by the store, so any failure leaves the graph unchanged.

use crate::domain::{Action, ActionId, DeletePolicy, Edge, EdgeKind};
use crate::error::{Error, Result};
use crate::invariants::{check_add_family_edge, violation_error, EdgeIndex};
use crate::store::{require_action, ActionStore, StoreBatch};
use std::collections::{HashMap, HashSet};

/// Delete an action according to `policy`.
///
/// Returns the IDs of every deleted action, starting with `id`. For
/// [`DeletePolicy::DeleteRecursive`] the descendants follow in BFS order.
///
/// # Errors
///
/// - `Error::NotFound` if `id` (or the reparent target) doesn't exist
/// - `Error::Validation` if asked to reparent children onto `id` itself
/// - `Error::CycleDetected` if the reparent target lies inside the deleted
///   action's subtree
pub async fn delete_action(
    store: &mut dyn ActionStore,
    id: &ActionId,
    policy: &DeletePolicy,
) -> Result<Vec<ActionId>> {
    require_action(&*store, id).await?;

    let mut batch = StoreBatch::new();
    let mut removed = vec![id.clone()];

    match policy {
        DeletePolicy::Orphan => {
            batch.delete_action(id.clone());
        }
        DeletePolicy::DeleteRecursive => {
            let family = EdgeIndex::load(&*store, EdgeKind::Family).await?;
            removed.extend(family.reachable_from(id));
            for action_id in &removed {
                batch.delete_action(action_id.clone());
            }
        }
        DeletePolicy::Reparent(new_parent) => {
            if new_parent == id {
                return Err(Error::Validation(
                    "Cannot reparent children onto the action being deleted".to_string(),
                ));
            }
            require_action(&*store, new_parent).await?;

            let mut family = EdgeIndex::load(&*store, EdgeKind::Family).await?;
            let children = family.targets_from(id);

            // Deleting `id` cascades all of its family edges
            for parent in family.sources_into(id) {
                family.remove(&parent, id);
            }
            for child in &children {
                family.remove(id, child);
            }

            for child in &children {
                if let Err(violation) = check_add_family_edge(&family, new_parent, child) {
                    return Err(violation_error(&*store, violation).await);
                }
                family.insert(new_parent, child);
                batch
                    .delete_edge(Edge::family(id, child))
                    .insert_edge(Edge::family(new_parent, child));
            }
            batch.delete_action(id.clone());
        }
    }

    store.apply(batch).await?;

    tracing::debug!(
        action_id = %id,
        policy = %policy,
        removed = removed.len(),
        "Deleted action"
    );
    Ok(removed)
}

/// Move `id` under `new_parent_id`, replacing its current parent if any.
///
/// Moving an action under its current parent is a no-op.
///
/// # Errors
///
/// - `Error::NotFound` if either action doesn't exist
/// - `Error::CycleDetected` if `new_parent_id` is `id` or one of its descendants
pub async fn move_action(
    store: &mut dyn ActionStore,
    id: &ActionId,
    new_parent_id: &ActionId,
) -> Result<Edge> {
    require_action(&*store, id).await?;
    require_action(&*store, new_parent_id).await?;

    let mut family = EdgeIndex::load(&*store, EdgeKind::Family).await?;
    let current_parents = family.sources_into(id);
    let new_edge = Edge::family(new_parent_id, id);

    if current_parents.iter().any(|p| p == new_parent_id) {
        return Ok(new_edge);
    }

    let mut batch = StoreBatch::new();
    for parent in &current_parents {
        family.remove(parent, id);
        batch.delete_edge(Edge::family(parent, id));
    }

    if let Err(violation) = check_add_family_edge(&family, new_parent_id, id) {
        return Err(violation_error(&*store, violation).await);
    }
    batch.insert_edge(new_edge.clone());

    store.apply(batch).await?;

    tracing::debug!(
        action_id = %id,
        new_parent = %new_parent_id,
        "Moved action"
    );
    Ok(new_edge)
}

/// Remove the parent edge of `id`, making it a root.
///
/// Returns the removed edge, or `None` if `id` was already a root.
///
/// # Errors
///
/// `Error::NotFound` if the action doesn't exist.
pub async fn detach_action(store: &mut dyn ActionStore, id: &ActionId) -> Result<Option<Edge>> {
    require_action(&*store, id).await?;

    let family = EdgeIndex::load(&*store, EdgeKind::Family).await?;
    let Some(parent) = family.sources_into(id).into_iter().next() else {
        return Ok(None);
    };

    let edge = store.delete_edge(&parent, id, EdgeKind::Family).await?;
    tracing::debug!(action_id = %id, former_parent = %parent, "Detached action");
    Ok(Some(edge))
}

/// Direct children of `id`, sorted by ID.
///
/// # Errors
///
/// `Error::NotFound` if the action doesn't exist.
pub async fn children(store: &dyn ActionStore, id: &ActionId) -> Result<Vec<Action>> {
    require_action(store, id).await?;
    let family = EdgeIndex::load(store, EdgeKind::Family).await?;
    resolve(store, family.targets_from(id)).await
}

/// Every descendant of `id` in BFS order (children first).
///
/// # Errors
///
/// `Error::NotFound` if the action doesn't exist.
pub async fn descendants(store: &dyn ActionStore, id: &ActionId) -> Result<Vec<Action>> {
    require_action(store, id).await?;
    let family = EdgeIndex::load(store, EdgeKind::Family).await?;
    resolve(store, family.reachable_from(id)).await
}

/// The chain of ancestors of `id`, nearest parent first, ending at the root.
///
/// Empty for a root action.
///
/// # Errors
///
/// `Error::NotFound` if the action doesn't exist.
pub async fn ancestor_chain(store: &dyn ActionStore, id: &ActionId) -> Result<Vec<Action>> {
    require_action(store, id).await?;
    let family = EdgeIndex::load(store, EdgeKind::Family).await?;

    let mut chain = Vec::new();
    let mut visited: HashSet<ActionId> = HashSet::from([id.clone()]);
    let mut current = id.clone();

    while let Some(parent) = family.sources_into(&current).into_iter().next() {
        if !visited.insert(parent.clone()) {
            tracing::warn!(action_id = %parent, "Cycle in family edges while walking ancestors");
            break;
        }
        chain.push(parent.clone());
        current = parent;
    }

    resolve(store, chain).await
}

/// Look up actions for `ids` with one `list` call, keeping the order of `ids`.
async fn resolve(store: &dyn ActionStore, ids: Vec<ActionId>) -> Result<Vec<Action>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut by_id: HashMap<ActionId, Action> = store
        .list()
        .await?
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect();

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}
