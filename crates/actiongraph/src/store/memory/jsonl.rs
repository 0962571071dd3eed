//! JSONL persistence for the in-memory store.
//!
//! The whole graph lives in one JSON Lines file. Each line is a tagged
//! [`Record`]: actions first (sorted by ID), then edges (sorted by
//! `(src, dst, kind)`), so saves are deterministic and diff cleanly under
//! version control.
//!
//! ```text
//! {"record":"action","id":"act-4f2k","title":"Plan the offsite",...}
//! {"record":"edge","src":"act-4f2k","dst":"act-9x1m","kind":"family"}
//! ```

use super::inner::InMemoryStoreInner;
use crate::domain::{Action, ActionId, Edge, EdgeFilter, EdgeKind};
use crate::error::{Result, StorageError};
use crate::invariants::{check_add_dependency_edge, check_add_family_edge, EdgeIndex, Violation};
use crate::store::ActionStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;

/// One line of the data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    /// An action row
    Action(Action),
    /// An edge row
    Edge(Edge),
}

/// Warnings that can occur during JSONL file loading.
///
/// These are non-fatal: the offending line or edge is skipped and loading
/// continues, so the resulting store always satisfies the graph invariants.
/// Callers should surface them, since they point at data that needs manual
/// attention.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    /// A line that couldn't be parsed as a record.
    ///
    /// **Effect**: the line is skipped entirely.
    MalformedRecord {
        /// 1-based line number
        line_number: usize,
        /// Parser error
        error: String,
    },

    /// An action whose content failed validation.
    ///
    /// **Effect**: the action is skipped, and so are edges referencing it.
    InvalidAction {
        /// Action ID from the record
        action_id: ActionId,
        /// 1-based line number
        line_number: usize,
        /// Validation error
        error: String,
    },

    /// A second record with an already-loaded action ID.
    ///
    /// **Effect**: the later record is skipped.
    DuplicateAction {
        /// Repeated ID
        action_id: ActionId,
        /// 1-based line number of the skipped record
        line_number: usize,
    },

    /// An edge whose endpoint doesn't exist.
    OrphanedEdge(Edge),

    /// An edge that appeared more than once.
    DuplicateEdge(Edge),

    /// A `family` edge giving a child a second parent.
    SecondParent(Edge),

    /// An edge that would close a cycle, or a self-dependency.
    CircularEdge(Edge),
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MalformedRecord { line_number, error } => {
                write!(f, "skipped malformed record at line {line_number}: {error}")
            }
            LoadWarning::InvalidAction {
                action_id,
                line_number,
                error,
            } => write!(
                f,
                "skipped invalid action {action_id} at line {line_number}: {error}"
            ),
            LoadWarning::DuplicateAction {
                action_id,
                line_number,
            } => write!(
                f,
                "skipped duplicate action {action_id} at line {line_number}"
            ),
            LoadWarning::OrphanedEdge(edge) => write!(f, "skipped orphaned edge {edge}"),
            LoadWarning::DuplicateEdge(edge) => write!(f, "skipped duplicate edge {edge}"),
            LoadWarning::SecondParent(edge) => {
                write!(f, "skipped edge giving a second parent: {edge}")
            }
            LoadWarning::CircularEdge(edge) => write!(f, "broke cycle by skipping edge {edge}"),
        }
    }
}

/// Load a store from a JSONL file.
///
/// # Error Handling
///
/// - **Malformed lines**: skipped with a warning
/// - **Invalid or duplicate actions**: skipped with a warning
/// - **Edges that are orphaned, duplicated, or would violate a graph
///   invariant**: skipped with a warning, in file order, so the first edge
///   wins
///
/// Edges are resolved after every action has been read, so their position in
/// the file relative to actions doesn't matter.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be opened or read.
pub async fn load_from_jsonl(
    path: &Path,
    prefix: String,
) -> Result<(Box<dyn ActionStore>, Vec<LoadWarning>)> {
    let (inner, warnings) = load_inner(path, prefix).await?;
    Ok((Box::new(Arc::new(Mutex::new(inner))), warnings))
}

pub(super) async fn load_inner(
    path: &Path,
    prefix: String,
) -> Result<(InMemoryStoreInner, Vec<LoadWarning>)> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut warnings = Vec::new();
    let mut actions: Vec<Action> = Vec::new();
    let mut seen_ids: HashSet<ActionId> = HashSet::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut line_number = 0;

    // First pass: parse records
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Record>(trimmed) {
            Ok(Record::Action(action)) => {
                if let Err(error) = action.validate() {
                    warnings.push(LoadWarning::InvalidAction {
                        action_id: action.id,
                        line_number,
                        error,
                    });
                } else if seen_ids.insert(action.id.clone()) {
                    actions.push(action);
                } else {
                    warnings.push(LoadWarning::DuplicateAction {
                        action_id: action.id,
                        line_number,
                    });
                }
            }
            Ok(Record::Edge(edge)) => edges.push(edge),
            Err(e) => warnings.push(LoadWarning::MalformedRecord {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    // Second pass: accept edges that keep the graph valid
    let mut family = EdgeIndex::new(EdgeKind::Family);
    let mut depends_on = EdgeIndex::new(EdgeKind::DependsOn);
    let mut accepted = Vec::with_capacity(edges.len());

    for edge in edges {
        if !seen_ids.contains(&edge.src) || !seen_ids.contains(&edge.dst) {
            warnings.push(LoadWarning::OrphanedEdge(edge));
            continue;
        }

        let check = match edge.kind {
            EdgeKind::Family => check_add_family_edge(&family, &edge.src, &edge.dst),
            EdgeKind::DependsOn => check_add_dependency_edge(&depends_on, &edge.src, &edge.dst),
        };

        match check {
            Ok(()) => {
                let index = match edge.kind {
                    EdgeKind::Family => &mut family,
                    EdgeKind::DependsOn => &mut depends_on,
                };
                index.insert(&edge.src, &edge.dst);
                accepted.push(edge);
            }
            Err(Violation::DuplicateParent {
                existing_parent, ..
            }) if existing_parent == edge.src => {
                warnings.push(LoadWarning::DuplicateEdge(edge));
            }
            Err(Violation::DuplicateParent { .. }) => {
                warnings.push(LoadWarning::SecondParent(edge));
            }
            Err(Violation::DuplicateEdge(_)) => warnings.push(LoadWarning::DuplicateEdge(edge)),
            Err(Violation::Cycle { .. } | Violation::SelfDependency(_)) => {
                warnings.push(LoadWarning::CircularEdge(edge));
            }
        }
    }

    let mut inner = InMemoryStoreInner::new(prefix);
    for action in actions {
        inner.insert_action(action);
    }
    inner.edges.extend(accepted);

    tracing::debug!(
        path = %path.display(),
        actions = inner.actions.len(),
        edges = inner.edges.len(),
        warnings = warnings.len(),
        "Loaded JSONL store"
    );

    Ok((inner, warnings))
}

/// Save a store to a JSONL file with an atomic write.
///
/// Writes to `<path>.tmp` first, then renames over `path`, so a crash never
/// leaves a half-written data file behind.
///
/// # Errors
///
/// Returns `Error::Io` for filesystem failures and `Error::Storage` if a
/// record cannot be serialized.
pub async fn save_to_jsonl(store: &dyn ActionStore, path: &Path) -> Result<()> {
    let mut actions = store.list().await?;
    actions.sort_by(|a, b| a.id.cmp(&b.id));
    let edges = store.list_edges(&EdgeFilter::default()).await?;

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_path);

    let file = File::create(&temp_path).await?;
    let mut writer = BufWriter::new(file);

    let records = actions
        .into_iter()
        .map(Record::Action)
        .chain(edges.into_iter().map(Record::Edge));

    for record in records {
        let json = serde_json::to_string(&record).map_err(StorageError::Serialization)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.flush().await?;
    drop(writer);

    tokio::fs::rename(&temp_path, path).await?;

    tracing::debug!(path = %path.display(), "Saved JSONL store");
    Ok(())
}
