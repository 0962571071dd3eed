//! Structural invariant checks for edge mutations.
//!
//! Every path that adds an edge goes through this module before the store
//! commits:
//!
//! - **Single parent**: an action has at most one incoming `family` edge
//! - **Containment acyclicity**: no action is its own `family` ancestor
//! - **Dependency acyclicity**: no action is its own transitive prerequisite
//!
//! # Algorithm
//!
//! Checks run against an [`EdgeIndex`]: a `petgraph::DiGraph` holding the
//! edges of one kind, built from a single bulk `list_edges` call. Cycle checks
//! are an iterative BFS from the *target* node of the proposed edge, so each
//! check costs O(edges) and never issues per-hop store queries.
//!
//! The same index doubles as a scratch copy for multi-edge plans: callers
//! remove and insert planned edges on the index, checking each insertion
//! against the planned state, and only then commit the plan to the store.
//!
//! # Edge Direction
//!
//! Index edges keep the store's direction: `src -> dst`. For `family` that is
//! parent -> child, so descendants are reachable nodes. For `depends_on` it
//! is prerequisite -> dependent, so everything reachable from an action
//! transitively depends on it.

use crate::domain::{ActionId, Edge, EdgeFilter, EdgeKind};
use crate::error::{ActionRef, Error, Result};
use crate::store::ActionStore;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use std::collections::HashMap;

/// In-memory adjacency index over the edges of one kind.
#[derive(Debug, Clone)]
pub struct EdgeIndex {
    kind: EdgeKind,
    graph: DiGraph<ActionId, ()>,
    nodes: HashMap<ActionId, NodeIndex>,
}

impl EdgeIndex {
    /// Create an empty index for `kind`.
    pub fn new(kind: EdgeKind) -> Self {
        Self {
            kind,
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    /// Build an index from the edges of `kind` in `edges`; other kinds are ignored.
    pub fn from_edges<'a>(kind: EdgeKind, edges: impl IntoIterator<Item = &'a Edge>) -> Self {
        let mut index = Self::new(kind);
        for edge in edges.into_iter().filter(|e| e.kind == kind) {
            index.insert(&edge.src, &edge.dst);
        }
        index
    }

    /// Bulk-load every edge of `kind` from the store (one round-trip).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn load(store: &dyn ActionStore, kind: EdgeKind) -> Result<Self> {
        let edges = store.list_edges(&EdgeFilter::kind(kind)).await?;
        Ok(Self::from_edges(kind, &edges))
    }

    /// The edge kind this index holds.
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Number of edges in the index.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn node(&mut self, id: &ActionId) -> NodeIndex {
        if let Some(&node) = self.nodes.get(id) {
            return node;
        }
        let node = self.graph.add_node(id.clone());
        self.nodes.insert(id.clone(), node);
        node
    }

    /// Returns `true` if `src -> dst` is in the index.
    pub fn contains(&self, src: &ActionId, dst: &ActionId) -> bool {
        match (self.nodes.get(src), self.nodes.get(dst)) {
            (Some(&s), Some(&d)) => self.graph.find_edge(s, d).is_some(),
            _ => false,
        }
    }

    /// Add `src -> dst`. Returns `false` if it was already present.
    pub fn insert(&mut self, src: &ActionId, dst: &ActionId) -> bool {
        if self.contains(src, dst) {
            return false;
        }
        let s = self.node(src);
        let d = self.node(dst);
        self.graph.add_edge(s, d, ());
        true
    }

    /// Remove `src -> dst`. Returns `false` if it was not present.
    pub fn remove(&mut self, src: &ActionId, dst: &ActionId) -> bool {
        let (Some(&s), Some(&d)) = (self.nodes.get(src), self.nodes.get(dst)) else {
            return false;
        };
        match self.graph.find_edge(s, d) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                true
            }
            None => false,
        }
    }

    /// Sources of edges pointing at `id`: parents for `family`, direct
    /// prerequisites for `depends_on`. Sorted.
    pub fn sources_into(&self, id: &ActionId) -> Vec<ActionId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Targets of edges leaving `id`: children for `family`, direct
    /// dependents for `depends_on`. Sorted.
    pub fn targets_from(&self, id: &ActionId) -> Vec<ActionId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &ActionId, direction: Direction) -> Vec<ActionId> {
        let Some(&node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<ActionId> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                self.graph[other].clone()
            })
            .collect();
        ids.sort();
        ids
    }

    /// Returns `true` if `to` is reachable from `from` following edge
    /// direction. Every node reaches itself.
    pub fn reaches(&self, from: &ActionId, to: &ActionId) -> bool {
        if from == to {
            return true;
        }
        let (Some(&start), Some(&goal)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return false;
        };
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(node) = bfs.next(&self.graph) {
            if node == goal {
                return true;
            }
        }
        false
    }

    /// Every node reachable from `start`, in BFS order, excluding `start`.
    ///
    /// For `family` these are the descendants of `start`.
    pub fn reachable_from(&self, start: &ActionId) -> Vec<ActionId> {
        let Some(&node) = self.nodes.get(start) else {
            return Vec::new();
        };
        let mut bfs = Bfs::new(&self.graph, node);
        let mut result = Vec::new();
        while let Some(next) = bfs.next(&self.graph) {
            if next != node {
                result.push(self.graph[next].clone());
            }
        }
        result
    }
}

/// An invariant the proposed edge would break, before titles are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// `child` already has `existing_parent`
    DuplicateParent {
        /// Action that would get a second parent
        child: ActionId,
        /// Its current parent
        existing_parent: ActionId,
    },
    /// The edge would close a cycle
    Cycle {
        /// Graph the cycle would appear in
        kind: EdgeKind,
        /// Proposed edge source
        src: ActionId,
        /// Proposed edge destination
        dst: ActionId,
    },
    /// An action depending on itself
    SelfDependency(ActionId),
    /// The edge already exists
    DuplicateEdge(Edge),
}

/// Check `family(parent, child)` against the index.
///
/// # Errors
///
/// - `DuplicateParent` if `child` already has a parent (including `parent`
///   itself: the edge would be a duplicate and the same rule covers it)
/// - `Cycle` if `parent == child` or `parent` is already a descendant of `child`
pub fn check_add_family_edge(
    index: &EdgeIndex,
    parent: &ActionId,
    child: &ActionId,
) -> std::result::Result<(), Violation> {
    debug_assert_eq!(index.kind(), EdgeKind::Family);

    if let Some(existing_parent) = index.sources_into(child).into_iter().next() {
        return Err(Violation::DuplicateParent {
            child: child.clone(),
            existing_parent,
        });
    }

    // Walk down from the child: if the parent is below it, the new edge
    // would make the child its own ancestor.
    if index.reaches(child, parent) {
        return Err(Violation::Cycle {
            kind: EdgeKind::Family,
            src: parent.clone(),
            dst: child.clone(),
        });
    }

    Ok(())
}

/// Check `depends_on(before, after)` against the index.
///
/// # Errors
///
/// - `SelfDependency` if `before == after`
/// - `DuplicateEdge` if the edge already exists
/// - `Cycle` if `after` is already a transitive prerequisite of `before`
pub fn check_add_dependency_edge(
    index: &EdgeIndex,
    before: &ActionId,
    after: &ActionId,
) -> std::result::Result<(), Violation> {
    debug_assert_eq!(index.kind(), EdgeKind::DependsOn);

    if before == after {
        return Err(Violation::SelfDependency(before.clone()));
    }

    if index.contains(before, after) {
        return Err(Violation::DuplicateEdge(Edge::depends_on(before, after)));
    }

    if index.reaches(after, before) {
        return Err(Violation::Cycle {
            kind: EdgeKind::DependsOn,
            src: before.clone(),
            dst: after.clone(),
        });
    }

    Ok(())
}

/// Resolve an action's title for an error message.
///
/// Falls back to the raw ID if the action cannot be read.
pub async fn action_ref(store: &dyn ActionStore, id: &ActionId) -> ActionRef {
    match store.get(id).await {
        Ok(Some(action)) => ActionRef::new(id, action.title),
        _ => ActionRef::new(id, id.as_str()),
    }
}

/// Turn a [`Violation`] into the user-facing [`Error`], looking up titles.
pub async fn violation_error(store: &dyn ActionStore, violation: Violation) -> Error {
    match violation {
        Violation::DuplicateParent {
            child,
            existing_parent,
        } => Error::DuplicateParent {
            child: action_ref(store, &child).await,
            existing_parent: action_ref(store, &existing_parent).await,
        },
        Violation::Cycle { kind, src, dst } => Error::CycleDetected {
            kind,
            src: action_ref(store, &src).await,
            dst: action_ref(store, &dst).await,
        },
        Violation::SelfDependency(id) => Error::SelfDependency(action_ref(store, &id).await),
        Violation::DuplicateEdge(edge) => Error::DuplicateEdge {
            kind: edge.kind,
            src: action_ref(store, &edge.src).await,
            dst: action_ref(store, &edge.dst).await,
        },
    }
}

/// Validate adding `family(parent, child)` against the current store state.
///
/// # Errors
///
/// `Error::DuplicateParent` or `Error::CycleDetected`; store errors propagate.
pub async fn validate_add_family_edge(
    store: &dyn ActionStore,
    parent: &ActionId,
    child: &ActionId,
) -> Result<()> {
    let index = EdgeIndex::load(store, EdgeKind::Family).await?;
    match check_add_family_edge(&index, parent, child) {
        Ok(()) => Ok(()),
        Err(violation) => Err(violation_error(store, violation).await),
    }
}

/// Validate adding `depends_on(before, after)` against the current store state.
///
/// # Errors
///
/// `Error::SelfDependency`, `Error::DuplicateEdge` or `Error::CycleDetected`;
/// store errors propagate.
pub async fn validate_add_dependency_edge(
    store: &dyn ActionStore,
    before: &ActionId,
    after: &ActionId,
) -> Result<()> {
    let index = EdgeIndex::load(store, EdgeKind::DependsOn).await?;
    match check_add_dependency_edge(&index, before, after) {
        Ok(()) => Ok(()),
        Err(violation) => Err(violation_error(store, violation).await),
    }
}
