//! Cache configuration via `graphcache.toml`
//!
//! Every key is optional; absent keys take their defaults. A missing file
//! is not an error and yields the default configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::client::CachePolicy;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "graphcache.toml";

/// Failure to load or save a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or written
    #[error("Failed to access config file '{}': {source}", path.display())]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The content is not valid configuration TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Cache configuration loaded from `graphcache.toml`.
///
/// # Example
///
/// ```toml
/// refetch_on_failed_update = true
/// default_cache_policy = "cache-else-network"
/// notify_on_empty_changes = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether watchers fall back to a network refetch when a re-read fails
    #[serde(default = "default_refetch_on_failed_update")]
    pub refetch_on_failed_update: bool,
    /// Policy used by `Client::query`
    #[serde(default)]
    pub default_cache_policy: CachePolicy,
    /// Broadcast commits that changed nothing to store-level subscribers
    #[serde(default)]
    pub notify_on_empty_changes: bool,
}

fn default_refetch_on_failed_update() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refetch_on_failed_update: default_refetch_on_failed_update(),
            default_cache_policy: CachePolicy::default(),
            notify_on_empty_changes: false,
        }
    }
}

impl CacheConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# graphcache configuration
#
# Re-fetch a watched query from the network when a change leaves the cache
# unable to satisfy it (default: true). When false, such updates are skipped.
refetch_on_failed_update = true

# Policy used when a query is issued without an explicit one:
#   "server-only", "network-then-cache-always", "cache-only",
#   "cache-else-network" (default), "cache-then-network"
default_cache_policy = "cache-else-network"

# Broadcast write transactions that changed nothing (default: false)
notify_on_empty_changes = false
"#
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML or unknown policy names.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from `path`, falling back to defaults if the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Render this configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
