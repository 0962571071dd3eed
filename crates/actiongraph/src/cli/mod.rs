//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `init`: Initialize a workspace
//! - `create`, `show`, `list`, `update`, `done`, `undone`: action lifecycle
//! - `delete`, `move`, `detach`, `ancestors`, `tree`: containment
//! - `dep add|rm|list`: prerequisites
//! - `ready`: workable actions
//! - `repair-mirrors`: restore `depends_on(child, parent)` mirrors
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! actiongraph create --title "Plan offsite"
//! actiongraph create --title "Book venue" --parent act-4f2k --deps act-9x1m
//! actiongraph delete act-4f2k --policy reparent --new-parent act-2b7q
//! actiongraph ready
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use args::{
    CreateArgs, DeleteArgs, DepAction, DepArgs, DoneArgs, IdArgs, InitArgs, ListArgs, MoveArgs,
    ShowArgs, TreeArgs, UpdateArgs,
};
pub use types::{BatchError, BatchResult, DeletePolicyArg};
pub use validators::{validate_action_id, validate_prefix, validate_text, validate_title};

/// Actiongraph - hierarchical action tracking
///
/// Break work into nested actions, record which must finish before which,
/// and ask what is ready to work on. Data lives in `.actiongraph/actions.jsonl`.
#[derive(Parser, Debug)]
#[command(name = "actiongraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new actiongraph workspace
    ///
    /// Creates `.actiongraph/` with configuration and an empty action file.
    Init(InitArgs),

    /// Create a new action
    Create(CreateArgs),

    /// Show an action with its parent, children and dependencies
    Show(ShowArgs),

    /// List actions
    List(ListArgs),

    /// Edit an action's title, description or vision
    Update(UpdateArgs),

    /// Mark actions as done
    Done(DoneArgs),

    /// Mark actions as not done
    Undone(DoneArgs),

    /// Delete an action
    ///
    /// `--policy` decides what happens to its children: `orphan` makes them
    /// roots, `recursive` deletes them too, `reparent` moves them under
    /// `--new-parent`.
    Delete(DeleteArgs),

    /// Move an action under a new parent
    Move(MoveArgs),

    /// Detach an action from its parent
    Detach(IdArgs),

    /// Manage dependencies between actions
    Dep(DepArgs),

    /// Show actions ready to work on
    ///
    /// An action is ready when it is not done, every prerequisite is done,
    /// and every child is done.
    Ready,

    /// Show the containment tree
    Tree(TreeArgs),

    /// Show an action's ancestors, nearest first
    Ancestors(IdArgs),

    /// Add missing `depends_on(child, parent)` edges for every parent link
    RepairMirrors,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let Some(command) = &self.command else {
            println!("Actiongraph - hierarchical action tracking");
            println!("Run 'actiongraph --help' for usage information.");
            return Ok(());
        };

        if let Commands::Init(args) = command {
            return execute::execute_init(args).await;
        }

        let mut app = App::from_directory(&std::env::current_dir()?).await?;
        let outcome = match command {
            Commands::Init(_) => Ok(()),
            Commands::Create(args) => execute::execute_create(&mut app, args, output_mode).await,
            Commands::Show(args) => execute::execute_show(&app, args, output_mode).await,
            Commands::List(args) => execute::execute_list(&app, args, output_mode).await,
            Commands::Update(args) => execute::execute_update(&mut app, args, output_mode).await,
            Commands::Done(args) => {
                execute::execute_set_done(&mut app, args, true, output_mode).await
            }
            Commands::Undone(args) => {
                execute::execute_set_done(&mut app, args, false, output_mode).await
            }
            Commands::Delete(args) => execute::execute_delete(&mut app, args, output_mode).await,
            Commands::Move(args) => execute::execute_move(&mut app, args, output_mode).await,
            Commands::Detach(args) => execute::execute_detach(&mut app, args, output_mode).await,
            Commands::Dep(args) => execute::execute_dep(&mut app, args, output_mode).await,
            Commands::Ready => execute::execute_ready(&app, output_mode).await,
            Commands::Tree(args) => execute::execute_tree(&app, args, output_mode).await,
            Commands::Ancestors(args) => {
                execute::execute_ancestors(&app, args, output_mode).await
            }
            Commands::RepairMirrors => execute::execute_repair_mirrors(&mut app, output_mode).await,
        };

        app.close().await?;
        outcome
    }
}
