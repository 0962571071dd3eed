//! Workable-set computation.
//!
//! An action is **workable** when it is not done, every direct prerequisite
//! is done, and every direct child is done:
//!
//! ```text
//! workable(A) := !done(A)
//!            AND all(done(p) for p in prerequisites(A))
//!            AND all(done(c) for c in children(A))
//! ```
//!
//! The computation takes exactly two store round-trips (`list` and one
//! unfiltered `list_edges`) and then runs in O(actions + edges), so its cost
//! does not grow with tree depth or with the number of actions queried.

use crate::domain::{Action, ActionId, Edge, EdgeFilter, EdgeKind};
use crate::error::Result;
use crate::store::ActionStore;
use std::collections::{HashMap, HashSet};

/// Compute the IDs of workable actions from a snapshot.
///
/// Prerequisites (from `depends_on` edges) and children (from `family`
/// edges) are folded into one waits-on map in a single pass over `edges`.
/// Edges naming an action missing from `actions` are treated as satisfied and
/// logged.
///
/// The result follows the order of `actions`.
pub fn workable_ids(actions: &[Action], edges: &[Edge]) -> Vec<ActionId> {
    let done: HashMap<&ActionId, bool> = actions.iter().map(|a| (&a.id, a.done)).collect();

    // action -> prerequisites and children
    let mut waits_on: HashMap<&ActionId, Vec<&ActionId>> = HashMap::new();
    for edge in edges {
        let (waiter, blocker) = match edge.kind {
            EdgeKind::DependsOn => (&edge.dst, &edge.src),
            EdgeKind::Family => (&edge.src, &edge.dst),
        };
        waits_on.entry(waiter).or_default().push(blocker);
    }

    let mut dangling: HashSet<&ActionId> = HashSet::new();
    let workable = actions
        .iter()
        .filter(|action| !action.done)
        .filter(|action| {
            waits_on.get(&action.id).is_none_or(|blockers| {
                blockers.iter().all(|blocker| match done.get(blocker) {
                    Some(&is_done) => is_done,
                    None => {
                        dangling.insert(*blocker);
                        true
                    }
                })
            })
        })
        .map(|action| action.id.clone())
        .collect();

    for id in dangling {
        tracing::warn!(action_id = %id, "Edge references unknown action; treating as satisfied");
    }

    workable
}

/// Load a snapshot from the store and return the workable actions.
///
/// The result keeps the store's `list` order (creation time, then ID). It is
/// advisory: a concurrent writer can change the graph right after the
/// snapshot is read.
///
/// # Errors
///
/// Propagates store errors.
pub async fn compute_workable(store: &dyn ActionStore) -> Result<Vec<Action>> {
    let actions = store.list().await?;
    let edges = store.list_edges(&EdgeFilter::default()).await?;

    let ids: HashSet<ActionId> = workable_ids(&actions, &edges).into_iter().collect();
    tracing::debug!(
        actions = actions.len(),
        edges = edges.len(),
        workable = ids.len(),
        "Computed workable set"
    );

    Ok(actions
        .into_iter()
        .filter(|action| ids.contains(&action.id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn action(id: &str, done: bool) -> Action {
        let now = Utc::now();
        Action {
            id: ActionId::new(id),
            title: id.to_string(),
            description: None,
            vision: None,
            done,
            version: 1,
            created_at: now,
            updated_at: now,
            done_at: done.then_some(now),
            derived: Default::default(),
        }
    }

    fn ids(values: &[&str]) -> Vec<ActionId> {
        values.iter().map(|v| ActionId::new(*v)).collect()
    }

    #[test]
    fn test_standalone_actions() {
        let actions = vec![action("a", false), action("b", true)];
        assert_eq!(workable_ids(&actions, &[]), ids(&["a"]));
    }

    #[test]
    fn test_unmet_prerequisite_blocks() {
        let actions = vec![action("a", false), action("b", false)];
        let edges = vec![Edge::depends_on(&ActionId::new("a"), &ActionId::new("b"))];
        assert_eq!(workable_ids(&actions, &edges), ids(&["a"]));
    }

    #[test]
    fn test_done_prerequisite_unblocks() {
        let actions = vec![action("a", true), action("b", false)];
        let edges = vec![Edge::depends_on(&ActionId::new("a"), &ActionId::new("b"))];
        assert_eq!(workable_ids(&actions, &edges), ids(&["b"]));
    }

    #[test]
    fn test_incomplete_child_blocks_parent() {
        let actions = vec![action("p", false), action("c1", true), action("c2", false)];
        let edges = vec![
            Edge::family(&ActionId::new("p"), &ActionId::new("c1")),
            Edge::family(&ActionId::new("p"), &ActionId::new("c2")),
        ];
        assert_eq!(workable_ids(&actions, &edges), ids(&["c2"]));
    }

    #[test]
    fn test_only_direct_children_count() {
        // Grandchild is pending but the child is done
        let actions = vec![action("p", false), action("c", true), action("g", false)];
        let edges = vec![
            Edge::family(&ActionId::new("p"), &ActionId::new("c")),
            Edge::family(&ActionId::new("c"), &ActionId::new("g")),
        ];
        assert_eq!(workable_ids(&actions, &edges), ids(&["p", "g"]));
    }

    #[test]
    fn test_dangling_edge_is_satisfied() {
        let actions = vec![action("a", false)];
        let edges = vec![Edge::depends_on(&ActionId::new("ghost"), &ActionId::new("a"))];
        assert_eq!(workable_ids(&actions, &edges), ids(&["a"]));
    }
}
