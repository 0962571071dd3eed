//! Per-command argument structs.

use clap::{Parser, Subcommand};

use super::types::DeletePolicyArg;
use super::validators::{validate_action_id, validate_prefix, validate_text, validate_title};
use crate::domain::ActionId;

/// Arguments for the init command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// ID prefix for generated action IDs (2-20 alphanumerics, default "act")
    #[arg(short, long, value_parser = validate_prefix)]
    pub prefix: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the create command
#[derive(Parser, Debug, Clone)]
pub struct CreateArgs {
    /// Action title
    #[arg(long, value_parser = validate_title)]
    pub title: String,

    /// Longer description
    #[arg(short = 'D', long, value_parser = validate_text)]
    pub description: Option<String>,

    /// What "done" looks like
    #[arg(short, long, value_parser = validate_text)]
    pub vision: Option<String>,

    /// Parent action
    #[arg(short, long, value_parser = validate_action_id)]
    pub parent: Option<ActionId>,

    /// Prerequisites (comma-separated action IDs)
    #[arg(short, long, value_delimiter = ',', value_parser = validate_action_id)]
    pub deps: Vec<ActionId>,
}

/// Arguments for the show command
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Action ID
    #[arg(value_parser = validate_action_id)]
    pub id: ActionId,
}

/// Arguments for the list command
#[derive(Parser, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only actions that are done
    #[arg(long, conflicts_with = "pending")]
    pub done: bool,

    /// Only actions that are not done
    #[arg(long)]
    pub pending: bool,

    /// Only children of this action
    #[arg(short, long, value_parser = validate_action_id)]
    pub parent: Option<ActionId>,
}

/// Arguments for the update command
#[derive(Parser, Debug, Clone)]
pub struct UpdateArgs {
    /// Action ID
    #[arg(value_parser = validate_action_id)]
    pub id: ActionId,

    /// New title
    #[arg(long, value_parser = validate_title)]
    pub title: Option<String>,

    /// New description (empty string clears it)
    #[arg(short = 'D', long, value_parser = validate_text)]
    pub description: Option<String>,

    /// New vision (empty string clears it)
    #[arg(short, long, value_parser = validate_text)]
    pub vision: Option<String>,
}

/// Arguments for the done and undone commands
#[derive(Parser, Debug, Clone)]
pub struct DoneArgs {
    /// Action IDs
    #[arg(required = true, value_parser = validate_action_id)]
    pub ids: Vec<ActionId>,
}

/// Arguments for the delete command
#[derive(Parser, Debug, Clone)]
pub struct DeleteArgs {
    /// Action ID
    #[arg(value_parser = validate_action_id)]
    pub id: ActionId,

    /// What happens to the action's children
    #[arg(long, value_enum, default_value = "orphan")]
    pub policy: DeletePolicyArg,

    /// New parent for the children (with `--policy reparent`)
    #[arg(long, value_parser = validate_action_id)]
    pub new_parent: Option<ActionId>,
}

/// Arguments for the move command
#[derive(Parser, Debug, Clone)]
pub struct MoveArgs {
    /// Action to move
    #[arg(value_parser = validate_action_id)]
    pub id: ActionId,

    /// New parent
    #[arg(value_parser = validate_action_id)]
    pub new_parent: ActionId,
}

/// Arguments for the detach, ancestors commands
#[derive(Parser, Debug, Clone)]
pub struct IdArgs {
    /// Action ID
    #[arg(value_parser = validate_action_id)]
    pub id: ActionId,
}

/// Arguments for the dep command
#[derive(Parser, Debug, Clone)]
pub struct DepArgs {
    /// Dependency operation
    #[command(subcommand)]
    pub action: DepAction,
}

/// Dependency operations
#[derive(Subcommand, Debug, Clone)]
pub enum DepAction {
    /// Make an action depend on another
    Add {
        /// The action that waits
        #[arg(value_parser = validate_action_id)]
        action: ActionId,

        /// The prerequisite
        #[arg(value_parser = validate_action_id)]
        depends_on: ActionId,
    },

    /// Remove a dependency
    #[command(alias = "remove")]
    Rm {
        /// The action that waits
        #[arg(value_parser = validate_action_id)]
        action: ActionId,

        /// The prerequisite
        #[arg(value_parser = validate_action_id)]
        depends_on: ActionId,
    },

    /// List dependency edges touching an action
    List {
        /// Action ID
        #[arg(value_parser = validate_action_id)]
        action: ActionId,
    },
}

/// Arguments for the tree command
#[derive(Parser, Debug, Clone, Default)]
pub struct TreeArgs {
    /// Show only this action's subtree
    #[arg(value_parser = validate_action_id)]
    pub root: Option<ActionId>,
}
