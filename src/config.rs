//! Coordinator configuration loaded from TOML.
//!
//! ```toml
//! team = "platform"
//! root_dir = "/srv/atelier"
//! escalation_contact = "alice"
//! max_concurrent = 4
//!
//! [repositories.web]
//! integration_branch = "main"
//! test_command = "npm test -- --ci"
//! ```

use crate::task::domain::{AgentName, BranchName, RepoName, TeamName};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONCURRENT: usize = 4;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_GIT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_TEST_TIMEOUT_SECS: u64 = 600;
const DEFAULT_MAX_MERGE_ATTEMPTS: u32 = 3;
const DEFAULT_INTEGRATION_BRANCH: &str = "main";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration '{path}': {source}")]
    Io {
        /// Path being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML or has the wrong shape.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Identity used for commits the coordinator creates (rebases).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitIdentity {
    /// `user.name`.
    pub name: String,
    /// `user.email`.
    pub email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: "atelier".to_owned(),
            email: "atelier@localhost".to_owned(),
        }
    }
}

/// Per-repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryConfig {
    /// Branch feature branches are rebased onto and merged into.
    #[serde(default = "default_integration_branch")]
    pub integration_branch: BranchName,
    /// Test command; auto-detected from marker files when absent.
    #[serde(default)]
    pub test_command: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            integration_branch: default_integration_branch(),
            test_command: None,
        }
    }
}

fn default_integration_branch() -> BranchName {
    BranchName::from_static(DEFAULT_INTEGRATION_BRANCH)
}

const fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_git_timeout_secs() -> u64 {
    DEFAULT_GIT_TIMEOUT_SECS
}

const fn default_test_timeout_secs() -> u64 {
    DEFAULT_TEST_TIMEOUT_SECS
}

const fn default_max_merge_attempts() -> u32 {
    DEFAULT_MAX_MERGE_ATTEMPTS
}

/// Settings for one team's coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Team served by this coordinator.
    pub team: TeamName,
    /// Root directory holding every team's repositories and worktrees.
    pub root_dir: Utf8PathBuf,
    /// Directory of workflow documents; defaults to
    /// `<root_dir>/<team>/workflows`.
    #[serde(default)]
    pub workflows_dir: Option<Utf8PathBuf>,
    /// Maximum simultaneous dispatches.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Seconds between scheduling ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Timeout for each git subprocess.
    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,
    /// Timeout for a repository's test command.
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,
    /// Retryable merge failures tolerated before escalation.
    #[serde(default = "default_max_merge_attempts")]
    pub max_merge_attempts: u32,
    /// Human notified when a task has no human DRI.
    pub escalation_contact: AgentName,
    /// Identity used for rebased commits.
    #[serde(default)]
    pub git_identity: GitIdentity,
    /// Per-repository overrides.
    #[serde(default)]
    pub repositories: BTreeMap<RepoName, RepositoryConfig>,
}

impl CoordinatorConfig {
    /// Creates a configuration with default tunables.
    #[must_use]
    pub fn new(team: TeamName, root_dir: Utf8PathBuf, escalation_contact: AgentName) -> Self {
        Self {
            team,
            root_dir,
            workflows_dir: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            git_timeout_secs: DEFAULT_GIT_TIMEOUT_SECS,
            test_timeout_secs: DEFAULT_TEST_TIMEOUT_SECS,
            max_merge_attempts: DEFAULT_MAX_MERGE_ATTEMPTS,
            escalation_contact,
            git_identity: GitIdentity::default(),
            repositories: BTreeMap::new(),
        }
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates `file_name` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// the errors of [`CoordinatorConfig::parse`].
    pub fn load(dir: &Dir, file_name: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = dir
            .read_to_string(file_name)
            .map_err(|source| ConfigError::Io {
                path: file_name.to_owned(),
                source,
            })?;
        Self::parse(&contents)
    }

    /// Reads and validates the file at `path` with ambient authority.
    ///
    /// # Errors
    ///
    /// See [`CoordinatorConfig::load`].
    pub fn load_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let file_name = path.file_name().ok_or_else(|| {
            ConfigError::Invalid(format!("configuration path '{path}' has no file name"))
        })?;
        let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|source| {
            ConfigError::Io {
                path: parent.to_owned(),
                source,
            }
        })?;
        Self::load(&dir, Utf8Path::new(file_name))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid("max_concurrent must be at least 1".to_owned()));
        }
        if self.max_merge_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_merge_attempts must be at least 1".to_owned(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".to_owned(),
            ));
        }
        if self.git_timeout_secs == 0 || self.test_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".to_owned()));
        }
        if self.git_identity.name.trim().is_empty() || self.git_identity.email.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "git_identity name and email must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns the interval between scheduling ticks.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Returns the timeout applied to each git subprocess.
    #[must_use]
    pub const fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    /// Returns the timeout applied to test commands.
    #[must_use]
    pub const fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    /// Returns the workflow document directory.
    #[must_use]
    pub fn workflows_dir(&self) -> Utf8PathBuf {
        self.workflows_dir.clone().unwrap_or_else(|| {
            self.root_dir.join(self.team.as_str()).join("workflows")
        })
    }

    /// Returns the settings for `repository`, falling back to defaults.
    #[must_use]
    pub fn repository(&self, repository: &RepoName) -> RepositoryConfig {
        self.repositories
            .get(repository)
            .cloned()
            .unwrap_or_default()
    }
}
