use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::cli::Cli;

/// Debounce between the last edit and the autosave
pub const DEFAULT_AUTOSAVE_MS: u64 = 500;

/// Drafts directory used when neither the CLI nor the config file names one
pub const DEFAULT_STORE_DIR: &str = ".hyperdraft";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Per-draft coordinator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftConfig {
    pub autosave_timeout: Duration,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            autosave_timeout: Duration::from_millis(DEFAULT_AUTOSAVE_MS),
        }
    }
}

/// Optional YAML config file. Every field can be overridden from the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub store: Option<PathBuf>,

    #[serde(default)]
    pub autosave_ms: Option<u64>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

/// Runtime configuration derived from CLI/env and the optional config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store_dir: PathBuf,
    pub draft: DraftConfig,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli.store.clone(), cli.autosave_ms, file)
    }

    /// Merge explicit settings over the file config, then defaults.
    pub fn resolve(
        store: Option<PathBuf>,
        autosave_ms: Option<u64>,
        file: FileConfig,
    ) -> Result<Self, ConfigError> {
        let autosave_ms = autosave_ms
            .or(file.autosave_ms)
            .unwrap_or(DEFAULT_AUTOSAVE_MS);
        if autosave_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "autosave_ms",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            store_dir: store
                .or(file.store)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
            draft: DraftConfig {
                autosave_timeout: Duration::from_millis(autosave_ms),
            },
        })
    }
}
