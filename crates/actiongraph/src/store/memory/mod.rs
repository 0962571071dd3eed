//! In-memory storage backend.
//!
//! This module provides a fast, **ephemeral** store where all rows are held
//! in RAM. It backs both [`StoreBackend::InMemory`](crate::store::StoreBackend)
//! and, through [`load_from_jsonl`] / [`save_to_jsonl`], the JSONL backend.
//!
//! # Architecture
//!
//! - `HashMap<ActionId, Action>` for O(1) action lookups
//! - `BTreeSet<Edge>` holding `(src, dst, kind)` rows in sorted order
//! - Hash-based ID generation with adaptive length (4-6 chars)
//!
//! Edges reference actions only by ID. Graph algorithms build transient
//! `petgraph` indexes from edge listings (see [`crate::invariants`]), so the
//! store itself never holds a pointer graph.
//!
//! # Thread Safety
//!
//! The store is wrapped in `Arc<Mutex<InMemoryStoreInner>>`. Every trait
//! method holds the lock for its whole duration, so single operations and
//! [`apply`](crate::store::ActionStore::apply) batches are atomic with respect
//! to other tasks sharing the handle.
//!
//! # Performance Characteristics
//!
//! - Get / update: O(1)
//! - Create: O(d) for d initial edges
//! - Delete: O(e) where e is the number of edges (cascade scan)
//! - List edges: O(e)

mod inner;
mod jsonl;
mod trait_impl;

use crate::error::Result;
use crate::store::ActionStore;
use inner::InMemoryStoreInner;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use jsonl::{load_from_jsonl, save_to_jsonl, LoadWarning, Record};

/// Thread-safe in-memory store.
pub(crate) type InMemoryStore = Arc<Mutex<InMemoryStoreInner>>;

/// Create a new in-memory store.
///
/// # Arguments
///
/// * `prefix` - The prefix for action IDs (e.g., "act")
///
/// # Example
///
/// ```
/// use actiongraph::store::memory::new_in_memory_store;
///
/// let store = new_in_memory_store("act".to_string());
/// ```
pub fn new_in_memory_store(prefix: String) -> Box<dyn ActionStore> {
    Box::new(Arc::new(Mutex::new(InMemoryStoreInner::new(prefix))))
}

/// Open `path` as a store, or start empty if the file doesn't exist yet.
pub(crate) async fn open_jsonl(
    path: &Path,
    prefix: String,
) -> Result<(InMemoryStore, Vec<LoadWarning>)> {
    let (inner, warnings) = read_or_empty(path, prefix).await?;
    Ok((Arc::new(Mutex::new(inner)), warnings))
}

/// Replace the contents of `store` with what is on disk at `path`.
///
/// IDs the store handed out before the reload stay reserved, including those
/// of actions that were never saved.
pub(crate) async fn reload_jsonl(store: &InMemoryStore, path: &Path) -> Result<Vec<LoadWarning>> {
    let prefix = store.lock().await.prefix().to_string();
    let (mut fresh, warnings) = read_or_empty(path, prefix).await?;

    let mut current = store.lock().await;
    fresh.absorb_ids_from(&current);
    *current = fresh;
    Ok(warnings)
}

async fn read_or_empty(
    path: &Path,
    prefix: String,
) -> Result<(InMemoryStoreInner, Vec<LoadWarning>)> {
    if tokio::fs::try_exists(path).await? {
        jsonl::load_inner(path, prefix).await
    } else {
        Ok((InMemoryStoreInner::new(prefix), Vec::new()))
    }
}
