//! CLI value enums and their domain conversions.

use clap::ValueEnum;
use serde::Serialize;

use crate::domain::{Action, ActionId, DeletePolicy};

/// Delete policy for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicyArg {
    /// Delete only the action; its children become roots
    #[default]
    Orphan,
    /// Delete the action and its whole subtree
    Recursive,
    /// Move the children under `--new-parent`, then delete
    Reparent,
}

impl std::fmt::Display for DeletePolicyArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Orphan => write!(f, "orphan"),
            Self::Recursive => write!(f, "recursive"),
            Self::Reparent => write!(f, "reparent"),
        }
    }
}

impl DeletePolicyArg {
    /// Combine with the optional `--new-parent` into a domain policy.
    ///
    /// # Errors
    ///
    /// Returns a message when `reparent` lacks a new parent, or when a new
    /// parent is given for any other policy.
    pub fn into_policy(self, new_parent: Option<ActionId>) -> Result<DeletePolicy, String> {
        match (self, new_parent) {
            (Self::Orphan, None) => Ok(DeletePolicy::Orphan),
            (Self::Recursive, None) => Ok(DeletePolicy::DeleteRecursive),
            (Self::Reparent, Some(id)) => Ok(DeletePolicy::Reparent(id)),
            (Self::Reparent, None) => Err("--policy reparent requires --new-parent".to_string()),
            (policy, Some(_)) => Err(format!("--new-parent cannot be used with --policy {policy}")),
        }
    }
}

// ============================================================================
// Batch Results
// ============================================================================

/// One failed item of a multi-ID command.
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    /// The action the command failed on
    pub action_id: ActionId,
    /// Rendered error
    pub error: String,
}

/// Outcome of a multi-ID command such as `done a b c`.
///
/// Each ID is processed independently; one failure does not stop the rest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// Actions updated successfully
    pub succeeded: Vec<Action>,
    /// Actions that failed, with reasons
    pub failed: Vec<BatchError>,
}

impl BatchResult {
    /// Whether any item failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Number of items processed.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
