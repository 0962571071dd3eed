//! Error types for actiongraph operations.
//!
//! Domain errors ([`Error::NotFound`] through [`Error::VersionConflict`]) are
//! detected locally by the store or the invariant checks and are never
//! retried internally. Infrastructure failures (`Io`, `Json`, `Storage`,
//! `Config`) are passed through without further classification.

use crate::domain::{ActionId, Edge, EdgeKind};
use std::fmt;
use std::io;
use thiserror::Error;

/// An action named in an error message.
///
/// Carries the ID for programmatic use and the title for the human-readable
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    /// Action ID
    pub id: ActionId,
    /// Action title at the time the error was raised
    pub title: String,
}

impl ActionRef {
    /// Create a reference from an ID and a title.
    pub fn new(id: &ActionId, title: impl Into<String>) -> Self {
        Self {
            id: id.clone(),
            title: title.into(),
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// The thing a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// An action that does not exist
    Action(ActionId),
    /// An edge that does not exist
    Edge(Edge),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Action(id) => write!(f, "action {id}"),
            Missing::Edge(edge) => write!(f, "edge {edge}"),
        }
    }
}

/// The error type for actiongraph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced action or edge does not exist.
    #[error("Not found: {0}")]
    NotFound(Missing),

    /// Malformed identifier or field value.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The child already has a family parent.
    #[error("'{child}' already has a parent: '{existing_parent}'")]
    DuplicateParent {
        /// Action that would receive a second parent
        child: ActionRef,
        /// Its current parent
        existing_parent: ActionRef,
    },

    /// Adding the edge would close a cycle.
    #[error("Adding {kind} edge '{src}' -> '{dst}' would create a cycle")]
    CycleDetected {
        /// Which graph the cycle would appear in
        kind: EdgeKind,
        /// Source of the rejected edge
        src: ActionRef,
        /// Destination of the rejected edge
        dst: ActionRef,
    },

    /// An action was asked to depend on itself.
    #[error("'{0}' cannot depend on itself")]
    SelfDependency(ActionRef),

    /// The exact `(src, dst, kind)` edge already exists.
    #[error("Edge already exists: {kind} '{src}' -> '{dst}'")]
    DuplicateEdge {
        /// Edge kind
        kind: EdgeKind,
        /// Edge source
        src: ActionRef,
        /// Edge destination
        dst: ActionRef,
    },

    /// Removing a dependency that does not exist.
    #[error("No dependency found: {action} does not depend on {depends_on}")]
    NoDependencyFound {
        /// The would-be dependent action
        action: ActionRef,
        /// The would-be prerequisite
        depends_on: ActionRef,
    },

    /// The caller's version is stale.
    #[error("Version conflict on '{title}' ({id}): expected version {expected}, found {actual}")]
    VersionConflict {
        /// Action ID
        id: ActionId,
        /// Action title
        title: String,
        /// Version supplied by the caller
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage backend error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Shorthand for a missing action.
    pub fn action_not_found(id: &ActionId) -> Self {
        Error::NotFound(Missing::Action(id.clone()))
    }

    /// Shorthand for a missing edge.
    pub fn edge_not_found(edge: &Edge) -> Self {
        Error::NotFound(Missing::Edge(edge.clone()))
    }
}

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The data file has an unexpected shape.
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// A record could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// No unique ID could be generated.
    #[error("ID generation failed: {0}")]
    IdGeneration(String),

    /// The requested backend is not available.
    #[error("Unsupported storage backend: {0}")]
    UnsupportedBackend(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.actiongraph/` directory was found.
    #[error("Not an actiongraph workspace (run `actiongraph init` first)")]
    NotInitialized,

    /// `init` was run in an already initialized directory.
    #[error("Actiongraph is already initialized in this directory. Found existing '{0}'")]
    AlreadyInitialized(String),

    /// The ID prefix is malformed.
    #[error("Invalid prefix: {0}")]
    InvalidPrefix(String),

    /// The config file could not be parsed or written.
    #[error("Config file error: {0}")]
    Yaml(String),

    /// A config value is out of range or unknown.
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// A specialized Result type for actiongraph operations.
pub type Result<T> = std::result::Result<T, Error>;
