//! Batch maintenance jobs.
//!
//! Two idempotent jobs that can be re-run at any time:
//!
//! - [`repair_family_mirrors`] adds the `depends_on(child, parent)` edge that
//!   conventionally accompanies every `family(parent, child)` edge
//! - [`backfill_derived`] asks a [`DerivedFieldProvider`] to fill in missing
//!   derived fields, a few actions at a time with a pause between batches
//!
//! Neither job holds a lock across store calls, so both are safe to run next
//! to normal traffic. Interrupted runs resume by running again.

use crate::domain::{Action, ActionId, DerivedFields, Edge, EdgeFilter, EdgeKind};
use crate::error::{Error, Result};
use crate::invariants::{check_add_dependency_edge, EdgeIndex};
use crate::store::{ActionStore, StoreBatch};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Outcome of [`repair_family_mirrors`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorRepairReport {
    /// Family edges inspected
    pub checked: usize,
    /// Mirror edges inserted
    pub added: Vec<Edge>,
    /// Mirrors left out because they would close a dependency cycle
    pub skipped: Vec<Edge>,
}

/// Insert missing `depends_on(child, parent)` mirrors for every family edge.
///
/// A mirror that would make the dependency graph cyclic is skipped and
/// reported instead. Mirrors are checked against the dependency graph as it
/// grows during the run, so the result is acyclic regardless of edge order.
/// Every accepted mirror is committed in one [`StoreBatch`].
///
/// # Errors
///
/// Propagates store errors. If the batch fails, no mirror is inserted.
pub async fn repair_family_mirrors(store: &mut dyn ActionStore) -> Result<MirrorRepairReport> {
    let family = store
        .list_edges(&EdgeFilter::kind(EdgeKind::Family))
        .await?;
    let mut depends_on = EdgeIndex::load(&*store, EdgeKind::DependsOn).await?;

    let mut report = MirrorRepairReport {
        checked: family.len(),
        ..MirrorRepairReport::default()
    };
    let mut batch = StoreBatch::new();

    for edge in family {
        let (parent, child) = (&edge.src, &edge.dst);
        if depends_on.contains(child, parent) {
            continue;
        }

        let mirror = Edge::depends_on(child, parent);
        if check_add_dependency_edge(&depends_on, child, parent).is_err() {
            tracing::warn!(edge = %mirror, "Skipping mirror edge that would create a cycle");
            report.skipped.push(mirror);
            continue;
        }

        depends_on.insert(child, parent);
        batch.insert_edge(mirror.clone());
        report.added.push(mirror);
    }

    if !batch.is_empty() {
        store.apply(batch).await?;
    }

    tracing::info!(
        checked = report.checked,
        added = report.added.len(),
        skipped = report.skipped.len(),
        "Repaired family mirrors"
    );
    Ok(report)
}

/// Produces derived fields for one action.
///
/// Implemented by the collaborator that owns summaries and embeddings.
#[async_trait]
pub trait DerivedFieldProvider: Send + Sync {
    /// Compute derived fields for `action`.
    ///
    /// `ancestors` is the action's ancestor chain, nearest parent first.
    async fn derive(&self, action: &Action, ancestors: &[Action]) -> Result<DerivedFields>;
}

/// Pacing for batch jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Actions per batch; `0` is treated as `1`
    pub batch_size: usize,
    /// Pause between batches
    pub batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_secs(1),
        }
    }
}

/// Outcome of [`backfill_derived`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Actions selected because their derived fields were missing
    pub candidates: usize,
    /// Actions whose derived fields were written
    pub updated: usize,
    /// Actions the provider failed on
    pub failed: Vec<ActionId>,
    /// Batches processed
    pub batches: usize,
}

/// Fill in missing derived fields through `provider`.
///
/// Selects every action whose derived fields are missing and processes them
/// `batch_size` at a time, sleeping `batch_delay` between batches. Provider
/// failures are logged and counted; the action is left as it was and picked
/// up again by the next run. Actions deleted while the job runs are skipped.
///
/// # Errors
///
/// Propagates store errors from the initial snapshot or from writes.
pub async fn backfill_derived(
    store: &mut dyn ActionStore,
    provider: &dyn DerivedFieldProvider,
    config: BatchConfig,
) -> Result<BackfillReport> {
    let actions = store.list().await?;
    let parents: HashMap<ActionId, ActionId> = store
        .list_edges(&EdgeFilter::kind(EdgeKind::Family))
        .await?
        .into_iter()
        .map(|edge| (edge.dst, edge.src))
        .collect();
    let by_id: HashMap<ActionId, Action> =
        actions.iter().map(|a| (a.id.clone(), a.clone())).collect();

    let candidates: Vec<&Action> = actions.iter().filter(|a| a.derived.is_missing()).collect();
    let mut report = BackfillReport {
        candidates: candidates.len(),
        ..BackfillReport::default()
    };

    let batch_size = config.batch_size.max(1);
    for (index, batch) in candidates.chunks(batch_size).enumerate() {
        if index > 0 && !config.batch_delay.is_zero() {
            tokio::time::sleep(config.batch_delay).await;
        }

        for action in batch {
            let ancestors = ancestors_of(&action.id, &parents, &by_id);
            match provider.derive(action, &ancestors).await {
                Ok(derived) => match store.update_derived(&action.id, derived).await {
                    Ok(_) => report.updated += 1,
                    Err(Error::NotFound(_)) => {
                        tracing::debug!(action_id = %action.id, "Action deleted during backfill");
                    }
                    Err(Error::Validation(reason)) => {
                        tracing::warn!(
                            action_id = %action.id,
                            reason,
                            "Provider returned invalid derived fields"
                        );
                        report.failed.push(action.id.clone());
                    }
                    Err(e) => return Err(e),
                },
                Err(e) => {
                    tracing::warn!(
                        action_id = %action.id,
                        error = %e,
                        "Derived field provider failed"
                    );
                    report.failed.push(action.id.clone());
                }
            }
        }

        report.batches += 1;
        tracing::info!(
            batch = report.batches,
            updated = report.updated,
            remaining = report
                .candidates
                .saturating_sub(report.updated + report.failed.len()),
            "Backfill batch complete"
        );
    }

    Ok(report)
}

fn ancestors_of(
    id: &ActionId,
    parents: &HashMap<ActionId, ActionId>,
    by_id: &HashMap<ActionId, Action>,
) -> Vec<Action> {
    let mut chain = Vec::new();
    let mut current = id;
    while let Some(parent) = parents.get(current) {
        if parent == id || chain.len() > parents.len() {
            break;
        }
        if let Some(action) = by_id.get(parent) {
            chain.push(action.clone());
        }
        current = parent;
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionUpdate, NewAction};
    use crate::store::memory::new_in_memory_store;

    struct TitleSummary;

    #[async_trait]
    impl DerivedFieldProvider for TitleSummary {
        async fn derive(&self, action: &Action, ancestors: &[Action]) -> Result<DerivedFields> {
            if action.title == "fails" {
                return Err(Error::Validation("provider refused".to_string()));
            }
            Ok(DerivedFields {
                node_summary: Some(format!("{} ({} up)", action.title, ancestors.len())),
                ..DerivedFields::default()
            })
        }
    }

    fn no_delay(batch_size: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            batch_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_mirror_repair_is_idempotent() {
        let mut store = new_in_memory_store("test".to_string());
        let p = store.create(NewAction::titled("P")).await.unwrap().id;
        let c = store
            .create(NewAction {
                parent_id: Some(p.clone()),
                ..NewAction::titled("C")
            })
            .await
            .unwrap()
            .id;

        let first = repair_family_mirrors(store.as_mut()).await.unwrap();
        assert_eq!(first.added, vec![Edge::depends_on(&c, &p)]);

        let second = repair_family_mirrors(store.as_mut()).await.unwrap();
        assert!(second.added.is_empty());
        assert!(second.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_mirror_that_would_cycle_is_skipped() {
        let mut store = new_in_memory_store("test".to_string());
        let p = store.create(NewAction::titled("P")).await.unwrap().id;
        // C already depends on P, so depends_on(C, P) would close a loop
        let c = store
            .create(NewAction {
                parent_id: Some(p.clone()),
                depends_on_ids: vec![p.clone()],
                ..NewAction::titled("C")
            })
            .await
            .unwrap()
            .id;

        let report = repair_family_mirrors(store.as_mut()).await.unwrap();
        assert!(report.added.is_empty());
        assert_eq!(report.skipped, vec![Edge::depends_on(&c, &p)]);
    }

    /// In-memory store whose batch commits always fail.
    struct RejectingBatches(Box<dyn ActionStore>);

    #[async_trait]
    impl ActionStore for RejectingBatches {
        async fn get(&self, id: &ActionId) -> Result<Option<Action>> {
            self.0.get(id).await
        }

        async fn list(&self) -> Result<Vec<Action>> {
            self.0.list().await
        }

        async fn create(&mut self, new_action: NewAction) -> Result<Action> {
            self.0.create(new_action).await
        }

        async fn update(
            &mut self,
            id: &ActionId,
            updates: ActionUpdate,
            expected_version: u64,
        ) -> Result<Action> {
            self.0.update(id, updates, expected_version).await
        }

        async fn update_derived(
            &mut self,
            id: &ActionId,
            derived: DerivedFields,
        ) -> Result<Action> {
            self.0.update_derived(id, derived).await
        }

        async fn delete(&mut self, id: &ActionId) -> Result<()> {
            self.0.delete(id).await
        }

        async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
            self.0.list_edges(filter).await
        }

        async fn insert_edge(
            &mut self,
            src: &ActionId,
            dst: &ActionId,
            kind: EdgeKind,
        ) -> Result<Edge> {
            self.0.insert_edge(src, dst, kind).await
        }

        async fn delete_edge(
            &mut self,
            src: &ActionId,
            dst: &ActionId,
            kind: EdgeKind,
        ) -> Result<Edge> {
            self.0.delete_edge(src, dst, kind).await
        }

        async fn apply(&mut self, _batch: StoreBatch) -> Result<()> {
            Err(Error::Validation("batch rejected".to_string()))
        }

        async fn save(&self) -> Result<()> {
            self.0.save().await
        }

        async fn reload(&mut self) -> Result<()> {
            self.0.reload().await
        }
    }

    #[tokio::test]
    async fn test_failed_mirror_commit_inserts_nothing() {
        let mut store = RejectingBatches(new_in_memory_store("test".to_string()));
        let p = store.create(NewAction::titled("P")).await.unwrap().id;
        for title in ["A", "B"] {
            store
                .create(NewAction {
                    parent_id: Some(p.clone()),
                    ..NewAction::titled(title)
                })
                .await
                .unwrap();
        }

        let err = repair_family_mirrors(&mut store).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let mirrors = store
            .list_edges(&EdgeFilter::kind(EdgeKind::DependsOn))
            .await
            .unwrap();
        assert!(mirrors.is_empty());
    }

    #[tokio::test]
    async fn test_backfill_counts_failures_and_resumes() {
        let mut store = new_in_memory_store("test".to_string());
        let root = store.create(NewAction::titled("root")).await.unwrap().id;
        store
            .create(NewAction {
                parent_id: Some(root.clone()),
                ..NewAction::titled("fails")
            })
            .await
            .unwrap();
        let child = store
            .create(NewAction {
                parent_id: Some(root.clone()),
                ..NewAction::titled("child")
            })
            .await
            .unwrap()
            .id;

        let report = backfill_derived(store.as_mut(), &TitleSummary, no_delay(2))
            .await
            .unwrap();
        assert_eq!(report.candidates, 3);
        assert_eq!(report.updated, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.batches, 2);

        let child = store.get(&child).await.unwrap().unwrap();
        assert_eq!(child.derived.node_summary.as_deref(), Some("child (1 up)"));
        assert!(child.derived.updated_at.is_some());
        assert_eq!(child.version, 1);

        // Only the failed action is still a candidate
        let rerun = backfill_derived(store.as_mut(), &TitleSummary, no_delay(2))
            .await
            .unwrap();
        assert_eq!(rerun.candidates, 1);
    }
}
