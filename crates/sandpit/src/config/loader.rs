//! Configuration file loading for sandpit
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};
use crate::types::ResourceLimits;

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the layered configuration used by front ends
    ///
    /// Layers, lowest precedence first: embedded defaults, the optional file,
    /// then `SANDPIT__*` environment variables (`__` separates nested keys).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));

        if let Some(path) = path {
            let content =
                std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            builder = builder.add_source(File::from_str(&content, FileFormat::Toml));
        }

        let config: Config = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("workspace_root is empty".to_owned()));
        }
        validate_limits("default_limits", &self.default_limits)?;
        if self.sweeper.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweeper.interval_secs must be positive".to_owned(),
            ));
        }

        // Validate all languages have required fields
        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty extension"
                )));
            }
            if !is_plain_file_name(&lang.stem) {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has invalid stem '{}'",
                    lang.stem
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if let Some(ref limits) = lang.run.limits {
                validate_limits(&format!("languages.{id}.run.limits"), limits)?;
            }
            if let Some(ref compile) = lang.compile {
                if compile.command.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty compile command"
                    )));
                }
                if !is_plain_file_name(&compile.output_name) {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has invalid output name '{}'",
                        compile.output_name
                    )));
                }
                if let Some(ref limits) = compile.limits {
                    validate_limits(&format!("languages.{id}.compile.limits"), limits)?;
                }
            }
        }

        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Zero timeouts and zero output caps would fail every run
fn validate_limits(scope: &str, limits: &ResourceLimits) -> Result<(), ConfigError> {
    if limits.timeout_ms == Some(0) {
        return Err(ConfigError::Invalid(format!(
            "{scope}.timeout_ms must be positive"
        )));
    }
    if limits.output_byte_cap == Some(0) {
        return Err(ConfigError::Invalid(format!(
            "{scope}.output_byte_cap must be positive"
        )));
    }
    Ok(())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}
