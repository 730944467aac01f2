//! Configuration management for zkfault
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (ZKFAULT_* prefix, `__` between sections)
//! 2. zkfault.local.toml (gitignored, local overrides)
//! 3. zkfault.toml (git-tracked, project config)
//! 4. ~/.config/zkfault/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! ```toml
//! [injection]
//! probability = 0.05
//! seed = 42
//! name = "replicated-sink"
//! log_faults = true
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main zkfault configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZkFaultConfig {
    pub injection: InjectionConfig,
}

/// Fault injection settings for one proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// Chance in `[0, 1]` that each checkpoint injects a fault. Out-of-range
    /// values are clamped when the proxy is built; 0 disables injection.
    pub probability: f64,
    /// RNG seed; 0 means "pick a random seed".
    pub seed: u64,
    /// Label attached to every fault log line.
    pub name: String,
    /// Emit `tracing` events for injected faults and cleanups.
    pub log_faults: bool,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            probability: 0.0,
            seed: 0,
            name: "zkfault".to_string(),
            log_faults: true,
        }
    }
}

impl InjectionConfig {
    /// Rejects values that cannot be clamped into a probability.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.probability.is_finite() {
            return Err(ConfigError::NonFiniteProbability(self.probability));
        }
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.probability > 0.0
    }
}

impl ZkFaultConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML file, without layering.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.injection.validate()?;
        Ok(config)
    }

    /// A configuration that injects faults with the given probability and
    /// a fixed seed, for reproducible test runs.
    pub fn testing(probability: f64, seed: u64) -> Self {
        Self {
            injection: InjectionConfig {
                probability,
                seed,
                ..Default::default()
            },
        }
    }
}
