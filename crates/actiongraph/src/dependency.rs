//! Prerequisite (`depends_on`) edge management.
//!
//! Callers speak in terms of "`action_id` depends on `depends_on_id`"; the
//! stored edge points the other way, from prerequisite to dependent:
//! `depends_on(depends_on_id, action_id)`.

use crate::domain::{ActionId, Edge, EdgeFilter, EdgeKind};
use crate::error::{ActionRef, Error, Result};
use crate::invariants::validate_add_dependency_edge;
use crate::store::{require_action, ActionStore};

/// Make `action_id` depend on `depends_on_id`.
///
/// # Errors
///
/// - `Error::NotFound` if either action doesn't exist
/// - `Error::SelfDependency` if both IDs are the same
/// - `Error::DuplicateEdge` if the dependency already exists
/// - `Error::CycleDetected` if `depends_on_id` already (transitively) depends
///   on `action_id`
pub async fn add_dependency(
    store: &mut dyn ActionStore,
    action_id: &ActionId,
    depends_on_id: &ActionId,
) -> Result<Edge> {
    require_action(&*store, action_id).await?;
    require_action(&*store, depends_on_id).await?;

    validate_add_dependency_edge(&*store, depends_on_id, action_id).await?;
    let edge = store
        .insert_edge(depends_on_id, action_id, EdgeKind::DependsOn)
        .await?;

    tracing::debug!(
        action_id = %action_id,
        depends_on = %depends_on_id,
        "Added dependency"
    );
    Ok(edge)
}

/// Remove the dependency of `action_id` on `depends_on_id`.
///
/// # Errors
///
/// - `Error::NotFound` if either action doesn't exist
/// - `Error::NoDependencyFound` if there is no such dependency; nothing is
///   changed
pub async fn remove_dependency(
    store: &mut dyn ActionStore,
    action_id: &ActionId,
    depends_on_id: &ActionId,
) -> Result<Edge> {
    let action = require_action(&*store, action_id).await?;
    let depends_on = require_action(&*store, depends_on_id).await?;

    let filter = EdgeFilter {
        kind: Some(EdgeKind::DependsOn),
        src: Some(depends_on_id.clone()),
        dst: Some(action_id.clone()),
        touching: None,
    };
    if store.list_edges(&filter).await?.is_empty() {
        return Err(Error::NoDependencyFound {
            action: ActionRef::new(action_id, action.title),
            depends_on: ActionRef::new(depends_on_id, depends_on.title),
        });
    }

    let edge = store
        .delete_edge(depends_on_id, action_id, EdgeKind::DependsOn)
        .await?;

    tracing::debug!(
        action_id = %action_id,
        depends_on = %depends_on_id,
        "Removed dependency"
    );
    Ok(edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewAction;
    use crate::store::memory::new_in_memory_store;

    #[tokio::test]
    async fn test_edge_points_from_prerequisite() {
        let mut store = new_in_memory_store("test".to_string());
        let a = store.create(NewAction::titled("A")).await.unwrap().id;
        let b = store.create(NewAction::titled("B")).await.unwrap().id;

        let edge = add_dependency(store.as_mut(), &b, &a).await.unwrap();
        assert_eq!(edge, Edge::depends_on(&a, &b));
    }

    #[tokio::test]
    async fn test_remove_missing_dependency_names_both_titles() {
        let mut store = new_in_memory_store("test".to_string());
        let a = store.create(NewAction::titled("Write docs")).await.unwrap().id;
        let b = store.create(NewAction::titled("Ship it")).await.unwrap().id;

        let err = remove_dependency(store.as_mut(), &b, &a).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No dependency found: Ship it does not depend on Write docs"
        );
    }
}
