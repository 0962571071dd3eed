//! Core in-memory storage data structures.
//!
//! This module contains the inner store that holds all rows and is wrapped
//! in `Arc<Mutex<>>` for thread safety. Every mutation helper here is
//! synchronous and checks referential integrity itself, so the trait
//! implementation and batch application share one set of rules.

use crate::domain::{Action, ActionId, ActionUpdate, Edge, NewAction};
use crate::error::{ActionRef, Error, Result, StorageError};
use crate::id_generation::IdGenerator;
use crate::store::{StoreBatch, StoreOp};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};

/// An action removed by [`InMemoryStoreInner::remove_action`], kept so the
/// removal can be undone.
#[derive(Debug)]
pub(super) struct RemovedAction {
    pub(super) action: Action,
    pub(super) edges: Vec<Edge>,
}

/// Undo record for one applied batch op.
#[derive(Debug)]
enum Undo {
    InsertedEdge(Edge),
    DeletedEdge(Edge),
    DeletedAction(RemovedAction),
}

/// Inner store (not thread-safe).
///
/// Actions live in an ID-indexed map and edges in an ordered set of
/// `(src, dst, kind)` rows. There are no object references between actions.
pub(crate) struct InMemoryStoreInner {
    /// Actions indexed by ID for O(1) lookups
    pub(super) actions: HashMap<ActionId, Action>,

    /// Edge rows, ordered for deterministic listing and serialization
    pub(super) edges: BTreeSet<Edge>,

    /// ID generator for new actions
    pub(super) id_generator: IdGenerator,
}

impl InMemoryStoreInner {
    /// Create a new empty store
    pub(crate) fn new(prefix: String) -> Self {
        Self {
            actions: HashMap::new(),
            edges: BTreeSet::new(),
            id_generator: IdGenerator::new(prefix),
        }
    }

    /// Title-bearing reference for error messages
    pub(super) fn action_ref(&self, id: &ActionId) -> ActionRef {
        let title = self
            .actions
            .get(id)
            .map_or_else(|| id.as_str().to_string(), |a| a.title.clone());
        ActionRef::new(id, title)
    }

    pub(super) fn require(&self, id: &ActionId) -> Result<&Action> {
        self.actions
            .get(id)
            .ok_or_else(|| Error::action_not_found(id))
    }

    /// Generate a new unique ID for an action
    fn generate_id(&mut self, title: &str) -> Result<ActionId> {
        let count = self.actions.len();
        self.id_generator
            .generate(title, count)
            .map_err(|e| StorageError::IdGeneration(e.to_string()).into())
    }

    /// Returns `true` if `id` can never be handed out by `create` again.
    pub(crate) fn is_reserved(&self, id: &ActionId) -> bool {
        self.id_generator.is_reserved(id)
    }

    /// Keep every ID `previous` issued reserved in this store.
    pub(super) fn absorb_ids_from(&mut self, previous: &InMemoryStoreInner) {
        self.id_generator.absorb(&previous.id_generator);
    }

    /// The prefix for generated IDs
    pub(super) fn prefix(&self) -> &str {
        self.id_generator.prefix()
    }

    /// Insert an already-built action (used by loading).
    pub(super) fn insert_action(&mut self, action: Action) {
        self.id_generator.register_id(&action.id);
        self.actions.insert(action.id.clone(), action);
    }

    pub(super) fn create(&mut self, new_action: NewAction) -> Result<Action> {
        // === Phase 1: validation, no mutations ===
        new_action.validate().map_err(Error::Validation)?;

        if let Some(parent_id) = &new_action.parent_id {
            self.require(parent_id)?;
        }
        for depends_on_id in &new_action.depends_on_ids {
            self.require(depends_on_id)?;
        }

        // === Phase 2: insert the row and its initial edges ===
        let id = self.generate_id(&new_action.title)?;
        let now = Utc::now();
        let action = Action {
            id: id.clone(),
            title: new_action.title.trim().to_string(),
            description: new_action.description,
            vision: new_action.vision,
            done: false,
            version: 1,
            created_at: now,
            updated_at: now,
            done_at: None,
            derived: Default::default(),
        };
        self.actions.insert(id.clone(), action.clone());

        if let Some(parent_id) = &new_action.parent_id {
            self.edges.insert(Edge::family(parent_id, &id));
        }
        for depends_on_id in &new_action.depends_on_ids {
            self.edges.insert(Edge::depends_on(depends_on_id, &id));
        }

        Ok(action)
    }

    pub(super) fn update(
        &mut self,
        id: &ActionId,
        updates: ActionUpdate,
        expected_version: u64,
    ) -> Result<Action> {
        if updates.is_empty() {
            return Err(Error::Validation("No fields to update".to_string()));
        }

        let current = self.require(id)?;
        if current.version != expected_version {
            return Err(Error::VersionConflict {
                id: id.clone(),
                title: current.title.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }

        // Build the candidate first so a failed validation leaves the row untouched
        let mut candidate = current.clone();
        let now = Utc::now();
        if let Some(title) = updates.title {
            candidate.title = title.trim().to_string();
        }
        if let Some(description) = updates.description {
            candidate.description = description;
        }
        if let Some(vision) = updates.vision {
            candidate.vision = vision;
        }
        if let Some(done) = updates.done {
            if done && !candidate.done {
                candidate.done_at = Some(now);
            } else if !done {
                candidate.done_at = None;
            }
            candidate.done = done;
        }
        candidate.validate().map_err(Error::Validation)?;

        candidate.version += 1;
        candidate.updated_at = now;
        self.actions.insert(id.clone(), candidate.clone());
        Ok(candidate)
    }

    pub(super) fn insert_edge(&mut self, edge: Edge) -> Result<()> {
        self.require(&edge.src)?;
        self.require(&edge.dst)?;
        if self.edges.contains(&edge) {
            return Err(Error::DuplicateEdge {
                kind: edge.kind,
                src: self.action_ref(&edge.src),
                dst: self.action_ref(&edge.dst),
            });
        }
        self.edges.insert(edge);
        Ok(())
    }

    pub(super) fn delete_edge(&mut self, edge: &Edge) -> Result<()> {
        if self.edges.remove(edge) {
            Ok(())
        } else {
            Err(Error::edge_not_found(edge))
        }
    }

    /// Remove an action and cascade every edge touching it.
    pub(super) fn remove_action(&mut self, id: &ActionId) -> Result<RemovedAction> {
        let action = self
            .actions
            .remove(id)
            .ok_or_else(|| Error::action_not_found(id))?;

        let edges: Vec<Edge> = self.edges.iter().filter(|e| e.touches(id)).cloned().collect();
        for edge in &edges {
            self.edges.remove(edge);
        }

        Ok(RemovedAction { action, edges })
    }

    fn restore_action(&mut self, removed: RemovedAction) {
        self.actions
            .insert(removed.action.id.clone(), removed.action);
        self.edges.extend(removed.edges);
    }

    /// Apply a batch all-or-nothing using an undo log.
    pub(super) fn apply_batch(&mut self, batch: StoreBatch) -> Result<()> {
        let mut undo_log: Vec<Undo> = Vec::with_capacity(batch.len());

        for op in batch {
            let outcome = match op {
                StoreOp::InsertEdge(edge) => self
                    .insert_edge(edge.clone())
                    .map(|()| Undo::InsertedEdge(edge)),
                StoreOp::DeleteEdge(edge) => {
                    self.delete_edge(&edge).map(|()| Undo::DeletedEdge(edge))
                }
                StoreOp::DeleteAction(id) => self.remove_action(&id).map(Undo::DeletedAction),
            };

            match outcome {
                Ok(undo) => undo_log.push(undo),
                Err(e) => {
                    tracing::debug!(
                        applied = undo_log.len(),
                        error = %e,
                        "Batch op failed, rolling back"
                    );
                    self.rollback(undo_log);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn rollback(&mut self, undo_log: Vec<Undo>) {
        for undo in undo_log.into_iter().rev() {
            match undo {
                Undo::InsertedEdge(edge) => {
                    self.edges.remove(&edge);
                }
                Undo::DeletedEdge(edge) => {
                    self.edges.insert(edge);
                }
                Undo::DeletedAction(removed) => self.restore_action(removed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(titles: &[&str]) -> (InMemoryStoreInner, Vec<ActionId>) {
        let mut inner = InMemoryStoreInner::new("test".to_string());
        let ids = titles
            .iter()
            .map(|t| inner.create(NewAction::titled(*t)).unwrap().id)
            .collect();
        (inner, ids)
    }

    #[test]
    fn test_remove_action_cascades_edges() {
        let (mut inner, ids) = store_with(&["a", "b", "c"]);
        inner.insert_edge(Edge::family(&ids[0], &ids[1])).unwrap();
        inner.insert_edge(Edge::depends_on(&ids[1], &ids[2])).unwrap();
        inner.insert_edge(Edge::family(&ids[0], &ids[2])).unwrap();

        let removed = inner.remove_action(&ids[1]).unwrap();
        assert_eq!(removed.edges.len(), 2);
        assert_eq!(inner.edges.len(), 1);
    }

    #[test]
    fn test_failed_batch_rolls_back_everything() {
        let (mut inner, ids) = store_with(&["a", "b", "c"]);
        let family = Edge::family(&ids[0], &ids[1]);
        inner.insert_edge(family.clone()).unwrap();
        let edges_before = inner.edges.clone();

        let mut batch = StoreBatch::new();
        batch
            .delete_edge(family)
            .insert_edge(Edge::family(&ids[2], &ids[1]))
            .delete_action(ids[0].clone())
            .delete_action(ActionId::new("test-missing"));

        let err = inner.apply_batch(batch).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(inner.edges, edges_before);
        assert_eq!(inner.actions.len(), 3);
    }

    #[test]
    fn test_update_validation_failure_leaves_row_untouched() {
        let (mut inner, ids) = store_with(&["a"]);
        let update = ActionUpdate {
            title: Some("   ".to_string()),
            done: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            inner.update(&ids[0], update, 1),
            Err(Error::Validation(_))
        ));
        let action = &inner.actions[&ids[0]];
        assert!(!action.done);
        assert_eq!(action.version, 1);
    }

    #[test]
    fn test_create_with_missing_reference_inserts_nothing() {
        let (mut inner, ids) = store_with(&["a"]);
        let missing = ActionId::new("test-missing");

        let under_missing = NewAction {
            parent_id: Some(missing.clone()),
            ..NewAction::titled("b")
        };
        assert!(matches!(inner.create(under_missing), Err(Error::NotFound(_))));

        let after_missing = NewAction {
            parent_id: Some(ids[0].clone()),
            depends_on_ids: vec![missing],
            ..NewAction::titled("c")
        };
        assert!(matches!(inner.create(after_missing), Err(Error::NotFound(_))));

        assert_eq!(inner.actions.len(), 1);
        assert!(inner.edges.is_empty());
    }

    #[test]
    fn test_done_toggle_tracks_done_at() {
        let (mut inner, ids) = store_with(&["a"]);
        let done = inner.update(&ids[0], ActionUpdate::done(true), 1).unwrap();
        assert!(done.done_at.is_some());
        let undone = inner.update(&ids[0], ActionUpdate::done(false), 2).unwrap();
        assert!(undone.done_at.is_none());
        assert_eq!(undone.version, 3);
    }
}
