//! Application context for CLI command execution.
//!
//! [`App`] locates the workspace, loads its config and opens the
//! [`ActionGraph`] engine. It is constructed explicitly per invocation and
//! closed explicitly when the command finishes. Batch jobs started through
//! the app are paced by the config's `maintenance` section.
//!
//! # Example
//!
//! ```no_run
//! use actiongraph::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!     println!("{} actions", app.graph().list_actions().await?.len());
//!     app.close().await?;
//!     Ok(())
//! }
//! ```

use crate::commands::init::{
    find_actiongraph_root, ActiongraphConfig, ACTIONGRAPH_DIR_NAME, CONFIG_FILE_NAME,
};
use crate::engine::ActionGraph;
use crate::error::{ConfigError, Result};
use crate::maintenance::{BackfillReport, BatchConfig, DerivedFieldProvider};
use std::path::{Path, PathBuf};

/// Application context for CLI operations.
#[derive(Debug)]
pub struct App {
    graph: ActionGraph,

    /// Path to the `.actiongraph` directory
    actiongraph_dir: PathBuf,

    /// Loaded configuration
    config: ActiongraphConfig,

    /// Pacing from the `maintenance` section
    batch_config: BatchConfig,
}

impl App {
    /// Create an App from the given working directory.
    ///
    /// Searches up the directory tree for `.actiongraph/`, loads the config
    /// and opens the store it names.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NotInitialized` if no workspace is found
    /// - `ConfigError::InvalidValue` for an unusable `maintenance` section
    /// - Config or storage errors while loading
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_actiongraph_root(working_dir).ok_or(ConfigError::NotInitialized)?;
        let actiongraph_dir = root_dir.join(ACTIONGRAPH_DIR_NAME);

        let config = ActiongraphConfig::load(&actiongraph_dir.join(CONFIG_FILE_NAME)).await?;
        let batch_config = config.maintenance.to_batch_config()?;
        let backend = config.storage.to_backend(&root_dir)?;
        let graph = ActionGraph::open(backend, config.id_prefix.clone()).await?;

        tracing::debug!(root = %root_dir.display(), "Opened workspace");

        Ok(Self {
            graph,
            actiongraph_dir,
            config,
            batch_config,
        })
    }

    /// The engine.
    pub fn graph(&self) -> &ActionGraph {
        &self.graph
    }

    /// The engine, for mutations.
    pub fn graph_mut(&mut self) -> &mut ActionGraph {
        &mut self.graph
    }

    /// The loaded configuration.
    pub fn config(&self) -> &ActiongraphConfig {
        &self.config
    }

    /// Path to the `.actiongraph` directory.
    pub fn actiongraph_dir(&self) -> &Path {
        &self.actiongraph_dir
    }

    /// Pacing for batch jobs, from the config's `maintenance` section.
    pub fn batch_config(&self) -> BatchConfig {
        self.batch_config
    }

    /// Backfill missing derived fields, paced by the workspace config.
    ///
    /// # Errors
    ///
    /// See [`ActionGraph::backfill_derived`].
    pub async fn backfill_derived(
        &mut self,
        provider: &dyn DerivedFieldProvider,
    ) -> Result<BackfillReport> {
        self.graph
            .backfill_derived(provider, self.batch_config)
            .await
    }

    /// Save and release the engine.
    ///
    /// # Errors
    ///
    /// Returns the final save error.
    pub async fn close(self) -> Result<()> {
        self.graph.close().await
    }
}
