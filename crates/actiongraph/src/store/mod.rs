//! Storage abstraction layer for actiongraph.
//!
//! This module provides the [`ActionStore`] trait and a factory for creating
//! store handles. Two backends are available:
//!
//! - **In-memory**: ephemeral storage backed by `HashMap`/`BTreeSet`
//! - **JSONL**: the in-memory store wrapped so that `save()` writes the whole
//!   graph to a JSON Lines file and `reload()` reads it back
//!
//! # Architecture
//!
//! The trait is async and object-safe, so the engine holds a
//! `Box<dyn ActionStore>` and never knows which backend it talks to. Store
//! handles are constructed explicitly with [`create_store`] and disposed of by
//! whoever owns them; there is no process-wide store.
//!
//! Single-row operations are atomic. Multi-row structural changes are
//! expressed as a [`StoreBatch`] and committed with [`ActionStore::apply`],
//! which either applies every op or none.
//!
//! # Example
//!
//! ```no_run
//! use actiongraph::store::{create_store, StoreBackend};
//! use actiongraph::domain::NewAction;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut store = create_store(StoreBackend::InMemory, "act".to_string()).await?;
//!     let action = store.create(NewAction::titled("Plan the offsite")).await?;
//!     println!("Created action: {}", action.id);
//!     Ok(())
//! }
//! ```

use crate::domain::{
    Action, ActionId, ActionUpdate, DerivedFields, Edge, EdgeFilter, EdgeKind, NewAction,
};
use crate::error::{Error, Result, StorageError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod memory;

/// Core storage trait for actions and edges.
///
/// # Method Categories
///
/// - **Actions**: `get`, `list`, `create`, `update`, `update_derived`, `delete`
/// - **Edges**: `list_edges`, `insert_edge`, `delete_edge`
/// - **Batches**: `apply`
/// - **Persistence**: `save`, `reload`
///
/// The store enforces referential integrity (edges only between existing
/// actions, no duplicate triples, cascading deletes) and optimistic
/// concurrency on `update`. Graph-shape invariants (single parent, no
/// cycles) are checked by the callers before they reach the store.
#[async_trait]
pub trait ActionStore: Send + Sync {
    // ========== Actions ==========

    /// Get an action by ID.
    ///
    /// Returns `None` if the action doesn't exist.
    async fn get(&self, id: &ActionId) -> Result<Option<Action>>;

    /// List every action, ordered by creation time then ID.
    async fn list(&self) -> Result<Vec<Action>>;

    /// Create a new action together with its initial edges.
    ///
    /// The action, its `family` edge from `parent_id` and its `depends_on`
    /// edges from `depends_on_ids` are inserted atomically. The new action
    /// has no descendants and no dependents, so none of these edges can close
    /// a cycle or give anything a second parent.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if `new_action.validate()` fails
    /// - `Error::NotFound` if the parent or any prerequisite doesn't exist
    async fn create(&mut self, new_action: NewAction) -> Result<Action>;

    /// Update an existing action if its stored version equals `expected_version`.
    ///
    /// Bumps `version` and `updated_at`.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the action doesn't exist
    /// - `Error::VersionConflict` if the stored version differs
    /// - `Error::Validation` if the update is empty or produces invalid content
    async fn update(
        &mut self,
        id: &ActionId,
        updates: ActionUpdate,
        expected_version: u64,
    ) -> Result<Action>;

    /// Replace the collaborator-owned derived fields of an action.
    ///
    /// Does not bump `version`: these fields are not user edits.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if the embedding holds `NaN` or an infinity
    /// - `Error::NotFound` if the action doesn't exist
    async fn update_derived(&mut self, id: &ActionId, derived: DerivedFields) -> Result<Action>;

    /// Delete an action and every edge that references it.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the action doesn't exist
    async fn delete(&mut self, id: &ActionId) -> Result<()>;

    // ========== Edges ==========

    /// List edges matching the filter, in sorted order.
    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>>;

    /// Insert a new edge.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if either endpoint doesn't exist
    /// - `Error::DuplicateEdge` if the exact edge already exists
    async fn insert_edge(&mut self, src: &ActionId, dst: &ActionId, kind: EdgeKind)
    -> Result<Edge>;

    /// Delete an edge and return it.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the edge doesn't exist
    async fn delete_edge(&mut self, src: &ActionId, dst: &ActionId, kind: EdgeKind)
    -> Result<Edge>;

    // ========== Batches ==========

    /// Apply a batch of row operations all-or-nothing.
    ///
    /// Ops run in order with the same semantics as the single-row methods.
    /// If any op fails, the ops already applied are undone and the error is
    /// returned.
    async fn apply(&mut self, batch: StoreBatch) -> Result<()>;

    // ========== Persistence ==========

    /// Save changes to persistent storage.
    ///
    /// For the in-memory backend this is a no-op; the JSONL backend writes
    /// the whole graph atomically.
    async fn save(&self) -> Result<()>;

    /// Reload state from persistent storage, discarding unsaved changes.
    ///
    /// Used to restore consistency after a failed `save()`.
    async fn reload(&mut self) -> Result<()>;
}

/// A single row operation inside a [`StoreBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Insert an edge
    InsertEdge(Edge),
    /// Delete an edge
    DeleteEdge(Edge),
    /// Delete an action and cascade its edges
    DeleteAction(ActionId),
}

/// An ordered list of row operations committed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreBatch {
    ops: Vec<StoreOp>,
}

impl StoreBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edge insertion
    pub fn insert_edge(&mut self, edge: Edge) -> &mut Self {
        self.ops.push(StoreOp::InsertEdge(edge));
        self
    }

    /// Append an edge deletion
    pub fn delete_edge(&mut self, edge: Edge) -> &mut Self {
        self.ops.push(StoreOp::DeleteEdge(edge));
        self
    }

    /// Append an action deletion
    pub fn delete_action(&mut self, id: ActionId) -> &mut Self {
        self.ops.push(StoreOp::DeleteAction(id));
        self
    }

    /// The operations in commit order
    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if the batch has no operations
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for StoreBatch {
    type Item = StoreOp;
    type IntoIter = std::vec::IntoIter<StoreOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// In-memory storage persisted to a JSONL file
    Jsonl(PathBuf),
}

impl StoreBackend {
    /// Returns the data file path for file-based backends.
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            StoreBackend::Jsonl(path) => Some(path),
            StoreBackend::InMemory => None,
        }
    }
}

/// Wrapper that adds JSONL file persistence to the in-memory store.
struct JsonlBackedStore {
    inner: memory::InMemoryStore,
    path: PathBuf,
}

impl JsonlBackedStore {
    async fn open(path: PathBuf, prefix: String) -> Result<Self> {
        let (inner, warnings) = memory::open_jsonl(&path, prefix).await?;
        log_load_warnings(&warnings);
        Ok(Self { inner, path })
    }
}

#[async_trait]
impl ActionStore for JsonlBackedStore {
    async fn get(&self, id: &ActionId) -> Result<Option<Action>> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Action>> {
        self.inner.list().await
    }

    async fn create(&mut self, new_action: NewAction) -> Result<Action> {
        self.inner.create(new_action).await
    }

    async fn update(
        &mut self,
        id: &ActionId,
        updates: ActionUpdate,
        expected_version: u64,
    ) -> Result<Action> {
        self.inner.update(id, updates, expected_version).await
    }

    async fn update_derived(&mut self, id: &ActionId, derived: DerivedFields) -> Result<Action> {
        self.inner.update_derived(id, derived).await
    }

    async fn delete(&mut self, id: &ActionId) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        self.inner.list_edges(filter).await
    }

    async fn insert_edge(
        &mut self,
        src: &ActionId,
        dst: &ActionId,
        kind: EdgeKind,
    ) -> Result<Edge> {
        self.inner.insert_edge(src, dst, kind).await
    }

    async fn delete_edge(
        &mut self,
        src: &ActionId,
        dst: &ActionId,
        kind: EdgeKind,
    ) -> Result<Edge> {
        self.inner.delete_edge(src, dst, kind).await
    }

    async fn apply(&mut self, batch: StoreBatch) -> Result<()> {
        self.inner.apply(batch).await
    }

    async fn save(&self) -> Result<()> {
        memory::save_to_jsonl(&self.inner, &self.path).await
    }

    async fn reload(&mut self) -> Result<()> {
        let warnings = memory::reload_jsonl(&self.inner, &self.path).await?;
        log_load_warnings(&warnings);
        Ok(())
    }
}

/// Fetch an action that must exist.
///
/// # Errors
///
/// `Error::NotFound` if the action is missing; store errors propagate.
pub async fn require_action(store: &dyn ActionStore, id: &ActionId) -> Result<Action> {
    store
        .get(id)
        .await?
        .ok_or_else(|| Error::action_not_found(id))
}

fn log_load_warnings(warnings: &[memory::LoadWarning]) {
    for warning in warnings {
        // Storage is still usable; problematic records were skipped
        tracing::warn!(warning = %warning, "JSONL load warning");
    }
}

/// Create a store handle for the given backend.
///
/// # Arguments
///
/// * `backend` - The storage backend to use
/// * `prefix` - The prefix for generated action IDs (e.g., "act")
///
/// # Errors
///
/// - `Error::Io` if the JSONL file exists but cannot be read
/// - `Error::Storage` if the file is not a valid action graph
pub async fn create_store(backend: StoreBackend, prefix: String) -> Result<Box<dyn ActionStore>> {
    match backend {
        StoreBackend::InMemory => Ok(memory::new_in_memory_store(prefix)),
        StoreBackend::Jsonl(path) => {
            if path.as_os_str().is_empty() {
                return Err(StorageError::UnsupportedBackend(
                    "JSONL backend requires a data file path".to_string(),
                )
                .into());
            }
            Ok(Box::new(JsonlBackedStore::open(path, prefix).await?))
        }
    }
}
