//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config at {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// NaN and infinities cannot be clamped into `[0, 1]`.
    #[error("injection.probability must be a finite number, got {0}")]
    NonFiniteProbability(f64),

    #[error("injection.name must not be empty")]
    EmptyName,

    #[error("Cannot locate user config directory")]
    NoUserConfigDir,
}
