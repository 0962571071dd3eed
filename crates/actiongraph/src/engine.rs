//! The `ActionGraph` facade.
//!
//! [`ActionGraph`] owns a store handle and is the single entry point for
//! callers. It routes each call to the component that implements it
//! ([`dependency`](crate::dependency), [`mutation`](crate::mutation),
//! [`workable`](crate::workable), [`maintenance`](crate::maintenance)) and
//! persists after every successful mutation.
//!
//! # Persistence
//!
//! After a mutation succeeds the store is saved. If the save fails, the
//! in-memory state is reloaded from disk so it matches what was persisted,
//! and the save error is returned. A mutation that fails never triggers a
//! save.
//!
//! # Example
//!
//! ```no_run
//! use actiongraph::domain::{DeletePolicy, NewAction};
//! use actiongraph::engine::ActionGraph;
//! use actiongraph::store::StoreBackend;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut graph = ActionGraph::open(StoreBackend::InMemory, "act".to_string()).await?;
//!     let offsite = graph.create_action(NewAction::titled("Plan the offsite")).await?;
//!     let venue = graph.create_action(NewAction::titled("Book a venue")).await?;
//!     graph.move_action(&venue.id, &offsite.id).await?;
//!
//!     for action in graph.compute_workable().await? {
//!         println!("ready: {}", action.title);
//!     }
//!
//!     graph.delete_action(&offsite.id, &DeletePolicy::DeleteRecursive).await?;
//!     graph.close().await?;
//!     Ok(())
//! }
//! ```

use crate::dependency;
use crate::domain::{
    Action, ActionId, ActionUpdate, DeletePolicy, DerivedFields, Edge, EdgeFilter, EdgeKind,
    NewAction,
};
use crate::error::Result;
use crate::maintenance::{
    self, BackfillReport, BatchConfig, DerivedFieldProvider, MirrorRepairReport,
};
use crate::mutation;
use crate::store::{create_store, ActionStore, StoreBackend};
use crate::workable;

/// Action graph engine bound to one store.
pub struct ActionGraph {
    store: Box<dyn ActionStore>,
}

impl std::fmt::Debug for ActionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionGraph")
            .field("store", &"<dyn ActionStore>")
            .finish()
    }
}

impl ActionGraph {
    /// Wrap an existing store handle.
    pub fn new(store: Box<dyn ActionStore>) -> Self {
        Self { store }
    }

    /// Create a store for `backend` and wrap it.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`create_store`].
    pub async fn open(backend: StoreBackend, prefix: String) -> Result<Self> {
        Ok(Self::new(create_store(backend, prefix).await?))
    }

    /// Save one last time and release the store.
    ///
    /// # Errors
    ///
    /// Returns the save error; the store is released either way.
    pub async fn close(self) -> Result<()> {
        self.store.save().await?;
        tracing::debug!("Closed action graph");
        Ok(())
    }

    /// Read-only access to the underlying store.
    pub fn store(&self) -> &dyn ActionStore {
        self.store.as_ref()
    }

    async fn persist(&mut self) -> Result<()> {
        if let Err(save_error) = self.store.save().await {
            tracing::warn!(error = %save_error, "Save failed, reloading persisted state");
            if let Err(reload_error) = self.store.reload().await {
                tracing::warn!(error = %reload_error, "Reload after failed save also failed");
            }
            return Err(save_error);
        }
        Ok(())
    }

    async fn commit<T>(&mut self, outcome: Result<T>) -> Result<T> {
        let value = outcome?;
        self.persist().await?;
        Ok(value)
    }

    // ========== Actions ==========

    /// Create an action, optionally with an initial parent and prerequisites.
    ///
    /// # Errors
    ///
    /// `Validation` for bad content, `NotFound` for a missing parent or
    /// prerequisite.
    pub async fn create_action(&mut self, new_action: NewAction) -> Result<Action> {
        let outcome = self.store.create(new_action).await;
        self.commit(outcome).await
    }

    /// Edit an action's content or completion flag.
    ///
    /// # Errors
    ///
    /// `NotFound`, `VersionConflict` or `Validation`.
    pub async fn update_action(
        &mut self,
        id: &ActionId,
        updates: ActionUpdate,
        expected_version: u64,
    ) -> Result<Action> {
        let outcome = self.store.update(id, updates, expected_version).await;
        self.commit(outcome).await
    }

    /// Get an action by ID.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn get_action(&self, id: &ActionId) -> Result<Option<Action>> {
        self.store.get(id).await
    }

    /// List every action in creation order.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn list_actions(&self) -> Result<Vec<Action>> {
        self.store.list().await
    }

    /// Write collaborator-owned derived fields.
    ///
    /// # Errors
    ///
    /// `NotFound` if the action doesn't exist, `Validation` for a non-finite
    /// embedding value.
    pub async fn update_derived(
        &mut self,
        id: &ActionId,
        derived: DerivedFields,
    ) -> Result<Action> {
        let outcome = self.store.update_derived(id, derived).await;
        self.commit(outcome).await
    }

    // ========== Structure ==========

    /// Delete an action under `policy`; returns every deleted ID.
    ///
    /// # Errors
    ///
    /// See [`mutation::delete_action`].
    pub async fn delete_action(
        &mut self,
        id: &ActionId,
        policy: &DeletePolicy,
    ) -> Result<Vec<ActionId>> {
        let outcome = mutation::delete_action(self.store.as_mut(), id, policy).await;
        self.commit(outcome).await
    }

    /// Move an action under a new parent.
    ///
    /// # Errors
    ///
    /// See [`mutation::move_action`].
    pub async fn move_action(&mut self, id: &ActionId, new_parent_id: &ActionId) -> Result<Edge> {
        let outcome = mutation::move_action(self.store.as_mut(), id, new_parent_id).await;
        self.commit(outcome).await
    }

    /// Make an action a root.
    ///
    /// # Errors
    ///
    /// `NotFound` if the action doesn't exist.
    pub async fn detach_action(&mut self, id: &ActionId) -> Result<Option<Edge>> {
        let outcome = mutation::detach_action(self.store.as_mut(), id).await;
        self.commit(outcome).await
    }

    /// Direct children of an action.
    ///
    /// # Errors
    ///
    /// `NotFound` if the action doesn't exist.
    pub async fn children(&self, id: &ActionId) -> Result<Vec<Action>> {
        mutation::children(self.store.as_ref(), id).await
    }

    /// All descendants of an action, BFS order.
    ///
    /// # Errors
    ///
    /// `NotFound` if the action doesn't exist.
    pub async fn descendants(&self, id: &ActionId) -> Result<Vec<Action>> {
        mutation::descendants(self.store.as_ref(), id).await
    }

    /// Ancestors of an action, nearest parent first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the action doesn't exist.
    pub async fn ancestor_chain(&self, id: &ActionId) -> Result<Vec<Action>> {
        mutation::ancestor_chain(self.store.as_ref(), id).await
    }

    /// `family` edges with `id` at either end.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn list_family_edges(&self, id: &ActionId) -> Result<Vec<Edge>> {
        self.store
            .list_edges(&EdgeFilter::touching(EdgeKind::Family, id))
            .await
    }

    // ========== Dependencies ==========

    /// Make `action_id` depend on `depends_on_id`.
    ///
    /// # Errors
    ///
    /// See [`dependency::add_dependency`].
    pub async fn add_dependency(
        &mut self,
        action_id: &ActionId,
        depends_on_id: &ActionId,
    ) -> Result<Edge> {
        let outcome =
            dependency::add_dependency(self.store.as_mut(), action_id, depends_on_id).await;
        self.commit(outcome).await
    }

    /// Remove the dependency of `action_id` on `depends_on_id`.
    ///
    /// # Errors
    ///
    /// See [`dependency::remove_dependency`].
    pub async fn remove_dependency(
        &mut self,
        action_id: &ActionId,
        depends_on_id: &ActionId,
    ) -> Result<Edge> {
        let outcome =
            dependency::remove_dependency(self.store.as_mut(), action_id, depends_on_id).await;
        self.commit(outcome).await
    }

    /// `depends_on` edges with `id` at either end.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn list_dependency_edges(&self, id: &ActionId) -> Result<Vec<Edge>> {
        self.store
            .list_edges(&EdgeFilter::touching(EdgeKind::DependsOn, id))
            .await
    }

    // ========== Queries & maintenance ==========

    /// Actions that are ready to work on right now.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn compute_workable(&self) -> Result<Vec<Action>> {
        workable::compute_workable(self.store.as_ref()).await
    }

    /// Add missing `depends_on(child, parent)` mirrors.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn repair_family_mirrors(&mut self) -> Result<MirrorRepairReport> {
        let outcome = maintenance::repair_family_mirrors(self.store.as_mut()).await;
        self.commit(outcome).await
    }

    /// Backfill missing derived fields through `provider`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn backfill_derived(
        &mut self,
        provider: &dyn DerivedFieldProvider,
        config: BatchConfig,
    ) -> Result<BackfillReport> {
        let outcome = maintenance::backfill_derived(self.store.as_mut(), provider, config).await;
        self.commit(outcome).await
    }
}
