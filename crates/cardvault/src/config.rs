//! # Configuration
//!
//! Cardvault configuration is a [`confique`] struct, loaded in layers.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `CARDVAULT_BACKEND`, `CARDVAULT_DATABASE_PATH`,
//!    `CARDVAULT_LOG_LEVEL`.
//! 2. **Config file**: `cardvault.toml`, either passed explicitly or found in the
//!    OS config directory (via `directories`). A missing file is not an error.
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `backend` | `sqlite` | Storage variant: `sqlite` or `memory` |
//! | `database_path` | `cards.db` | SQLite database file |
//! | `log_level` | `warn` | Default log filter when `RUST_LOG` is unset |

use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const CONFIG_FILE_NAME: &str = "cardvault.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded SQLite file
    #[default]
    Sqlite,
    /// Process-local, lost on exit
    Memory,
}

/// Configuration for cardvault, stored in `cardvault.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CardVaultConfig {
    /// Storage backend: "sqlite" or "memory"
    #[config(default = "sqlite", env = "CARDVAULT_BACKEND")]
    pub backend: BackendKind,

    /// Path of the SQLite database file
    #[config(default = "cards.db", env = "CARDVAULT_DATABASE_PATH")]
    pub database_path: PathBuf,

    /// Log filter used when RUST_LOG is not set (e.g. "warn", "cardvault=debug")
    #[config(default = "warn", env = "CARDVAULT_LOG_LEVEL")]
    pub log_level: String,
}

impl Default for CardVaultConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            database_path: PathBuf::from("cards.db"),
            log_level: "warn".to_string(),
        }
    }
}

impl CardVaultConfig {
    /// Load from the environment, then `path` (or the default config file),
    /// then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        let file = path.map(Path::to_path_buf).or_else(default_config_path);
        if let Some(file) = file {
            builder = builder.file(file);
        }
        Ok(builder.load()?)
    }
}

/// `<OS config dir>/cardvault/cardvault.toml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "cardvault", "cardvault")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CardVaultConfig::default();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.database_path, PathBuf::from("cards.db"));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "backend = \"memory\"\ndatabase_path = \"/tmp/elsewhere.db\"\n",
        )
        .unwrap();

        let config = CardVaultConfig::load(Some(&path)).unwrap();
        if std::env::var_os("CARDVAULT_BACKEND").is_none() {
            assert_eq!(config.backend, BackendKind::Memory);
        }
        if std::env::var_os("CARDVAULT_DATABASE_PATH").is_none() {
            assert_eq!(config.database_path, PathBuf::from("/tmp/elsewhere.db"));
        }
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CardVaultConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        if std::env::var_os("CARDVAULT_LOG_LEVEL").is_none() {
            assert_eq!(config.log_level, "warn");
        }
    }

    #[test]
    fn test_invalid_backend_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "backend = \"postgres\"\n").unwrap();

        if std::env::var_os("CARDVAULT_BACKEND").is_none() {
            assert!(CardVaultConfig::load(Some(&path)).is_err());
        }
    }

    #[test]
    fn test_default_path_ends_with_file_name() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with(CONFIG_FILE_NAME));
        }
    }
}
