//! # bitfs-config
//!
//! Configuration management for bitfs.
//!
//! Loads configuration from:
//! 1. `~/.bitfs/config.toml` (global)
//! 2. `./bitfs.toml` (local, overrides global)
//! 3. Environment variables (highest priority)
//!
//! There is no process-wide config instance; the loaded [`Config`] is
//! handed to whatever needs it.

pub mod logging;
pub mod testing;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment override for `storage.root`.
pub const ENV_ROOT: &str = "BITFS_ROOT";
/// Environment override for `log.level`.
pub const ENV_LOG: &str = "BITFS_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub index: IndexConfig,
    pub ingest: IngestConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::read_file(&global_path)?;
            }
        }

        let local_path = Path::new("bitfs.toml");
        if local_path.exists() {
            debug!("Loading local config from {:?}", local_path);
            let local = Self::read_file(local_path)?;
            config.merge(local);
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load a single explicit file, then apply environment overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path.as_ref())?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.bitfs/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".bitfs/config.toml"))
    }

    /// Merge a local config over this one. Only values that differ from
    /// the defaults take effect.
    fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.storage.root != defaults.storage.root {
            self.storage.root = other.storage.root;
        }
        if other.index != defaults.index {
            self.index = other.index;
        }
        if other.ingest != defaults.ingest {
            self.ingest = other.ingest;
        }
        if other.log != defaults.log {
            self.log = other.log;
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(ENV_ROOT) {
            self.storage.root = PathBuf::from(root);
        }
        if let Ok(level) = std::env::var(ENV_LOG) {
            self.log.level = level;
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the on-disk layout (chunks, c, b, bcat, bitcom, lmdb, manifests)
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".bitfs");
        Self { root }
    }
}

/// LMDB sizing shared by the metadata and manifest indexes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Upper bound of each LMDB map, in bytes
    pub map_size: usize,
    pub max_readers: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            map_size: 2 * 1024 * 1024 * 1024,
            max_readers: 128,
        }
    }
}

/// Ingest queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Bounded capacity of the feed event queue
    pub queue_depth: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { queue_depth: 1024 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// error, warn, info, debug or trace
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.index.map_size, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.ingest.queue_depth, 1024);
        assert!(config.storage.root.ends_with(".bitfs"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml().unwrap();
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[index]"));
        assert!(toml_str.contains("map_size"));
    }

    #[test]
    fn test_merge_keeps_unset_sections() {
        let mut base = Config::default();
        base.storage.root = PathBuf::from("/srv/global");
        base.log.level = "debug".to_string();

        let mut local = Config::default();
        local.ingest.queue_depth = 8;
        base.merge(local);

        assert_eq!(base.storage.root, PathBuf::from("/srv/global"));
        assert_eq!(base.log.level, "debug");
        assert_eq!(base.ingest.queue_depth, 8);
    }
}
