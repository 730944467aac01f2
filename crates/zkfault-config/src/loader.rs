//! Layered loading of [`ZkFaultConfig`]

use crate::{Paths, ZkFaultConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Builds a [`ZkFaultConfig`] from defaults, files and environment.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user: bool,
}

impl ConfigLoader {
    /// Loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "ZKFAULT".to_string(),
            include_user: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Defaults to `ZKFAULT`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Ignores the per-user config file.
    pub fn without_user_config(mut self) -> Self {
        self.include_user = false;
        self
    }

    /// Merges defaults, config files and environment, later sources
    /// overriding earlier ones, then validates the result.
    pub fn load(self) -> Result<ZkFaultConfig> {
        let defaults = config::Config::try_from(&ZkFaultConfig::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        for file in Paths::new().layers(&self.project_dir, self.include_user) {
            tracing::debug!(path = %file.display(), "layering config file");
            builder = builder.add_source(
                config::File::from(file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // ZKFAULT_INJECTION__PROBABILITY=0.1
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: ZkFaultConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        loaded
            .injection
            .validate()
            .context("Invalid fault injection settings")?;

        Ok(loaded)
    }

    /// Like [`load`](Self::load), falling back to defaults (injection
    /// disabled) when any layer is broken.
    pub fn load_or_default(self) -> ZkFaultConfig {
        self.load().unwrap_or_else(|err| {
            tracing::warn!(error = %format!("{err:#}"), "falling back to default zkfault config");
            ZkFaultConfig::default()
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(project_dir: &Path) -> ConfigLoader {
        // A prefix no real environment sets, so ambient variables cannot leak in.
        ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("ZKFAULT_LOADER_TEST")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config, ZkFaultConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[injection]
probability = 0.1
seed = 1234
name = "ingest"
"#;
        fs::write(project_dir.join("zkfault.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.injection.probability, 0.1);
        assert_eq!(config.injection.seed, 1234);
        assert_eq!(config.injection.name, "ingest");
        assert!(config.injection.log_faults);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("zkfault.toml"),
            r#"
[injection]
probability = 0.1
seed = 5
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("zkfault.local.toml"),
            r#"
[injection]
probability = 0.9
log_faults = false
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.injection.probability, 0.9);
        assert!(!config.injection.log_faults);
        assert_eq!(config.injection.seed, 5);
    }

    #[test]
    fn test_load_or_default_on_broken_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("zkfault.toml"), "[injection\n")
            .expect("Failed to write config");

        let config = loader(temp_dir.path()).load_or_default();
        assert_eq!(config, ZkFaultConfig::default());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("zkfault.toml"),
            "[injection]\nname = \"\"\n",
        )
        .expect("Failed to write config");

        let err = loader(temp_dir.path()).load().unwrap_err();
        assert!(format!("{err:#}").contains("injection.name"));
    }
}
