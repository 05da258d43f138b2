use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use snapkeep_core::EncodeOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store used when neither the command line nor the config file names one.
pub const DEFAULT_STORE: &str = "snapshots";

/// Settings read from `config.toml`.
///
/// ```toml
/// store = "/var/backups/snapkeep"
/// follow_symlinks = false
/// exclude = ["/home/me/project/target"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: Option<PathBuf>,
    pub follow_symlinks: Option<bool>,
    pub exclude: Vec<PathBuf>,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "snapkeep").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads `explicit` if given (it must exist), otherwise the default
    /// location if present, otherwise an empty config.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Command line (or `SNAPKEEP_STORE`) wins over the config file.
    pub fn store_path(&self, cli_store: Option<&Path>) -> PathBuf {
        cli_store
            .map(Path::to_path_buf)
            .or_else(|| self.store.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE))
    }

    pub fn encode_options(&self) -> EncodeOptions {
        let defaults = EncodeOptions::default();
        EncodeOptions {
            follow_symlinks: self.follow_symlinks.unwrap_or(defaults.follow_symlinks),
            exclude: self.exclude.clone(),
        }
    }
}
