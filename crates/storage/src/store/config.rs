#![forbid(unsafe_code)]

use super::error::{BackendError, StoreError};
use cr_core::{DEFAULT_WORKSPACE, WorkspaceName};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const IN_MEMORY_DATABASE: &str = ":memory:";

const DEFAULT_DATABASE_FILE: &str = "content_repository.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Repository connection settings, usually loaded from YAML.
///
/// ```yaml
/// database_path: /var/lib/repo/content.db
/// busy_timeout_ms: 2000
/// default_workspace: live
/// check_login_on_server: false
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
    pub default_workspace: String,
    pub check_login_on_server: bool,
    pub provision_schema: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            default_workspace: DEFAULT_WORKSPACE.to_string(),
            check_login_on_server: true,
            provision_schema: true,
        }
    }
}

impl RepositoryConfig {
    pub fn at(database_path: impl AsRef<Path>) -> Self {
        Self {
            database_path: database_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::at(IN_MEMORY_DATABASE)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, StoreError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(BackendError::Config("database_path must not be empty".to_string()).into());
        }
        WorkspaceName::try_new(self.default_workspace.as_str()).map_err(|err| {
            BackendError::Config(format!("default_workspace: {}", err.message()))
        })?;
        Ok(())
    }
}
