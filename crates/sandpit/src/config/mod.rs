use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::entry_point::public_type_name;
pub use crate::config::language::{
    CommandContext, CompileConfig, EntryPoint, FileExtension, Language, RunConfig,
};
use crate::types::{RequestLimits, ResourceLimits};

mod entry_point;
pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Holds the built-in language registry; library users can also write it out
/// as a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../sandpit.example.toml");

/// Prefix for environment variable overrides (e.g. `SANDPIT__WORKSPACE_ROOT`)
pub const ENV_PREFIX: &str = "SANDPIT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for sandpit
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding one child directory per execution
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Limits applied to every compile and run phase unless a language overrides them
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Size bounds checked before any workspace is allocated
    #[serde(default)]
    pub request_limits: RequestLimits,

    /// Periodic reclamation of orphaned workspaces
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

/// Settings for the reclamation sweeper
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Whether long-running front ends should start the sweeper
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Workspaces older than this many seconds are removed
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sweep_interval(),
            max_age_secs: default_max_age(),
        }
    }
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            default_limits: ResourceLimits::default(),
            request_limits: RequestLimits::default(),
            sweeper: SweeperConfig::default(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Registered language ids in sorted order
    pub fn language_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Merge a phase's limit overrides with the defaults
    pub fn effective_limits(&self, overrides: Option<&ResourceLimits>) -> ResourceLimits {
        match overrides {
            Some(limits) => self.default_limits.with_overrides(limits),
            None => self.default_limits.clone(),
        }
    }

    /// Override the workspace root (builder style)
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("sandpit")
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    5 * 60
}

fn default_max_age() -> u64 {
    10 * 60
}
