//! ActionStore trait implementation for in-memory storage.

use super::InMemoryStore;
use crate::domain::{
    Action, ActionId, ActionUpdate, DerivedFields, Edge, EdgeFilter, EdgeKind, NewAction,
};
use crate::error::{Error, Result};
use crate::store::{ActionStore, StoreBatch};
use async_trait::async_trait;
use chrono::Utc;

#[async_trait]
impl ActionStore for InMemoryStore {
    async fn get(&self, id: &ActionId) -> Result<Option<Action>> {
        let inner = self.lock().await;
        Ok(inner.actions.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Action>> {
        let inner = self.lock().await;
        let mut actions: Vec<Action> = inner.actions.values().cloned().collect();
        actions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(actions)
    }

    async fn create(&mut self, new_action: NewAction) -> Result<Action> {
        let mut inner = self.lock().await;
        let action = inner.create(new_action)?;
        tracing::debug!(action_id = %action.id, "Created action");
        Ok(action)
    }

    async fn update(
        &mut self,
        id: &ActionId,
        updates: ActionUpdate,
        expected_version: u64,
    ) -> Result<Action> {
        let mut inner = self.lock().await;
        inner.update(id, updates, expected_version)
    }

    async fn update_derived(&mut self, id: &ActionId, derived: DerivedFields) -> Result<Action> {
        derived.validate().map_err(Error::Validation)?;
        let mut inner = self.lock().await;
        let action = inner
            .actions
            .get_mut(id)
            .ok_or_else(|| Error::action_not_found(id))?;
        action.derived = DerivedFields {
            updated_at: derived.updated_at.or_else(|| Some(Utc::now())),
            ..derived
        };
        Ok(action.clone())
    }

    async fn delete(&mut self, id: &ActionId) -> Result<()> {
        let mut inner = self.lock().await;
        let removed = inner.remove_action(id)?;
        tracing::debug!(
            action_id = %id,
            cascaded_edges = removed.edges.len(),
            "Deleted action"
        );
        Ok(())
    }

    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        let inner = self.lock().await;
        Ok(inner
            .edges
            .iter()
            .filter(|edge| filter.matches(edge))
            .cloned()
            .collect())
    }

    async fn insert_edge(
        &mut self,
        src: &ActionId,
        dst: &ActionId,
        kind: EdgeKind,
    ) -> Result<Edge> {
        let mut inner = self.lock().await;
        let edge = Edge {
            src: src.clone(),
            dst: dst.clone(),
            kind,
        };
        inner.insert_edge(edge.clone())?;
        Ok(edge)
    }

    async fn delete_edge(
        &mut self,
        src: &ActionId,
        dst: &ActionId,
        kind: EdgeKind,
    ) -> Result<Edge> {
        let mut inner = self.lock().await;
        let edge = Edge {
            src: src.clone(),
            dst: dst.clone(),
            kind,
        };
        inner.delete_edge(&edge)?;
        Ok(edge)
    }

    async fn apply(&mut self, batch: StoreBatch) -> Result<()> {
        let mut inner = self.lock().await;
        let ops = batch.len();
        inner.apply_batch(batch)?;
        tracing::debug!(ops, "Applied store batch");
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        // In-memory storage doesn't persist to disk
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        // No backing store to reload from
        Ok(())
    }
}
