//! Implementation of the `init` command and the workspace config file.
//!
//! `init` creates the `.actiongraph/` directory with a YAML config, an empty
//! JSONL data file and a `.gitignore`. Every other command locates that
//! directory by walking up from the working directory.

use crate::error::{ConfigError, Result};
use crate::maintenance::BatchConfig;
use crate::store::StoreBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Default action ID prefix if none specified
pub const DEFAULT_PREFIX: &str = "act";

/// Name of the workspace directory
pub const ACTIONGRAPH_DIR_NAME: &str = ".actiongraph";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the actions data file
pub const ACTIONS_FILE_NAME: &str = "actions.jsonl";

/// Name of the gitignore file within `.actiongraph`
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Minimum prefix length
pub const MIN_PREFIX_LENGTH: usize = 2;

/// Maximum prefix length
pub const MAX_PREFIX_LENGTH: usize = 20;

/// Maximum directory depth to traverse when searching for the workspace root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Backend name for the in-memory store persisted to JSONL
pub const MEMORY_BACKEND: &str = "memory";

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiongraphConfig {
    /// Action ID prefix (e.g., "act" for "act-4f2k")
    #[serde(rename = "id-prefix")]
    pub id_prefix: String,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Batch job pacing
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Storage backend type ("memory" for in-memory with JSONL persistence)
    pub backend: String,

    /// Path to the data file, relative to the workspace root
    pub data_file: String,
}

/// Maintenance section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// Actions per batch
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    pub batch_delay_ms: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_ms: 1000,
        }
    }
}

impl MaintenanceConfig {
    /// Convert to the pacing used by batch jobs.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` if `batch_size` is zero.
    pub fn to_batch_config(&self) -> Result<BatchConfig> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maintenance.batch_size",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(BatchConfig {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        })
    }
}

impl StorageConfig {
    /// Resolve the storage section into a backend, with `data_file` taken
    /// relative to `root_dir`.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` for an unknown backend or an empty data
    /// file path.
    pub fn to_backend(&self, root_dir: &Path) -> Result<StoreBackend> {
        if self.backend != MEMORY_BACKEND {
            return Err(ConfigError::InvalidValue {
                field: "storage.backend",
                reason: format!("unknown backend '{}'", self.backend),
            }
            .into());
        }
        if self.data_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.data_file",
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        Ok(StoreBackend::Jsonl(root_dir.join(&self.data_file)))
    }
}

impl ActiongraphConfig {
    /// Create a new configuration with the given prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            id_prefix: prefix.to_string(),
            storage: StorageConfig {
                backend: MEMORY_BACKEND.to_string(),
                data_file: format!("{ACTIONGRAPH_DIR_NAME}/{ACTIONS_FILE_NAME}"),
            },
            maintenance: MaintenanceConfig::default(),
        }
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// `Error::Io` if the file can't be read, `ConfigError` if it doesn't
    /// parse or carries an invalid prefix.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        validate_prefix(&config.id_prefix)?;
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// `Error::Io` if the file can't be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for ActiongraphConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created `.actiongraph` directory
    pub actiongraph_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the created data file
    pub actions_file: PathBuf,
    /// Path to the created gitignore file
    pub gitignore_file: PathBuf,
    /// The prefix used for action IDs
    pub prefix: String,
}

/// Validate the action ID prefix.
///
/// Requirements: 2-20 ASCII letters or digits. Expects pre-trimmed input.
///
/// # Errors
///
/// `ConfigError::InvalidPrefix` describing the first rule broken.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.len() < MIN_PREFIX_LENGTH {
        return Err(ConfigError::InvalidPrefix(format!(
            "must be at least {MIN_PREFIX_LENGTH} characters"
        ))
        .into());
    }

    if prefix.len() > MAX_PREFIX_LENGTH {
        return Err(ConfigError::InvalidPrefix(format!(
            "cannot exceed {MAX_PREFIX_LENGTH} characters"
        ))
        .into());
    }

    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidPrefix(
            "must contain only alphanumeric characters".to_string(),
        )
        .into());
    }

    Ok(())
}

/// Initialize a new workspace in `base_dir`.
///
/// # Errors
///
/// - `ConfigError::InvalidPrefix` for a bad prefix
/// - `ConfigError::AlreadyInitialized` if `.actiongraph/` already exists
/// - `Error::Io` for filesystem failures
pub async fn init(base_dir: &Path, prefix: Option<&str>) -> Result<InitResult> {
    let prefix = prefix.unwrap_or(DEFAULT_PREFIX).trim();
    validate_prefix(prefix)?;

    let actiongraph_dir = base_dir.join(ACTIONGRAPH_DIR_NAME);
    if fs::try_exists(&actiongraph_dir).await? {
        return Err(ConfigError::AlreadyInitialized(ACTIONGRAPH_DIR_NAME.to_string()).into());
    }

    fs::create_dir_all(&actiongraph_dir).await?;

    let config_file = actiongraph_dir.join(CONFIG_FILE_NAME);
    ActiongraphConfig::new(prefix).save(&config_file).await?;

    let actions_file = actiongraph_dir.join(ACTIONS_FILE_NAME);
    fs::write(&actions_file, "").await?;

    // Only the atomic-write scratch file is ignored; actions.jsonl is tracked
    let gitignore_file = actiongraph_dir.join(GITIGNORE_FILE_NAME);
    fs::write(&gitignore_file, "*.tmp\n").await?;

    tracing::info!(dir = %actiongraph_dir.display(), prefix, "Initialized workspace");

    Ok(InitResult {
        actiongraph_dir,
        config_file,
        actions_file,
        gitignore_file,
        prefix: prefix.to_string(),
    })
}

/// Find the workspace root by searching up the directory tree.
///
/// Returns the directory containing `.actiongraph/`, or `None` if none is
/// found before the filesystem root or [`MAX_TRAVERSAL_DEPTH`].
pub fn find_actiongraph_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(ACTIONGRAPH_DIR_NAME).is_dir() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case::short("ab")]
    #[case::default_prefix("act")]
    #[case::digits("team42")]
    #[case::max_length("a1b2c3d4e5f6g7h8i9j0")]
    fn test_validate_prefix_valid(#[case] prefix: &str) {
        assert!(validate_prefix(prefix).is_ok());
    }

    #[rstest]
    #[case::empty("", "at least 2")]
    #[case::single("a", "at least 2")]
    #[case::too_long("a".repeat(21), "cannot exceed 20")]
    #[case::hyphen("act-x", "alphanumeric")]
    #[case::space("my act", "alphanumeric")]
    fn test_validate_prefix_invalid(#[case] prefix: impl AsRef<str>, #[case] expected: &str) {
        let err = validate_prefix(prefix.as_ref()).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidPrefix(_))));
        assert!(err.to_string().contains(expected), "got: {err}");
    }

    #[tokio::test]
    async fn test_config_yaml_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        ActiongraphConfig::new("plan").save(&path).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("id-prefix: plan"));
        assert!(content.contains("backend: memory"));
        assert!(content.contains("data_file: .actiongraph/actions.jsonl"));
        assert!(content.contains("batch_size: 10"));

        let loaded = ActiongraphConfig::load(&path).await.unwrap();
        assert_eq!(loaded, ActiongraphConfig::new("plan"));
    }

    #[tokio::test]
    async fn test_maintenance_section_is_optional() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(
            &path,
            "id-prefix: act\nstorage:\n  backend: memory\n  data_file: data.jsonl\n",
        )
        .await
        .unwrap();

        let config = ActiongraphConfig::load(&path).await.unwrap();
        assert_eq!(config.maintenance, MaintenanceConfig::default());
    }

    #[test]
    fn test_to_backend_resolves_relative_to_root() {
        let config = ActiongraphConfig::new("act");
        let backend = config.storage.to_backend(Path::new("/work")).unwrap();
        assert_eq!(
            backend,
            StoreBackend::Jsonl(PathBuf::from("/work/.actiongraph/actions.jsonl"))
        );
    }

    #[test]
    fn test_to_backend_rejects_unknown_backend() {
        let storage = StorageConfig {
            backend: "postgres".to_string(),
            data_file: "x".to_string(),
        };
        assert!(matches!(
            storage.to_backend(Path::new("/work")),
            Err(Error::Config(ConfigError::InvalidValue { field: "storage.backend", .. }))
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let maintenance = MaintenanceConfig {
            batch_size: 0,
            batch_delay_ms: 0,
        };
        assert!(maintenance.to_batch_config().is_err());
    }

    #[tokio::test]
    async fn test_init_creates_directory_structure() {
        let temp_dir = TempDir::new().unwrap();
        let result = init(temp_dir.path(), None).await.unwrap();

        assert!(result.config_file.exists());
        assert!(result.gitignore_file.exists());
        assert_eq!(
            tokio::fs::read_to_string(&result.actions_file).await.unwrap(),
            ""
        );
        assert_eq!(result.prefix, DEFAULT_PREFIX);
    }

    #[tokio::test]
    async fn test_init_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        init(temp_dir.path(), Some("plan")).await.unwrap();

        let err = init(temp_dir.path(), Some("plan")).await.unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }

    #[test]
    fn test_find_root_from_nested_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(ACTIONGRAPH_DIR_NAME)).unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_actiongraph_root(&nested),
            Some(temp_dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_find_root_not_found() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_actiongraph_root(temp_dir.path()).is_none());
    }
}
