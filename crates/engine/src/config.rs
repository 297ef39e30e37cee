//! Engine configuration via `formtree.toml`
//!
//! Lists the extensions to activate and the messages and keys used when
//! `apply` fails. Read it once at startup and hand it to
//! [`ContextBuilder::from_config`](crate::context::ContextBuilder::from_config).

use std::path::Path;

use formtree_core::{Error, Result, BASE_KEY};
use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_SAVE_FAILURE_MESSAGE;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "formtree.toml";

/// `[apply]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplyConfig {
    /// Error key for failures not tied to an attribute
    #[serde(default = "default_base_error_key")]
    pub base_error_key: String,
    /// Message recorded when the adapter refuses a save
    #[serde(default = "default_save_failure_message")]
    pub save_failure_message: String,
}

fn default_base_error_key() -> String {
    BASE_KEY.to_string()
}

fn default_save_failure_message() -> String {
    DEFAULT_SAVE_FAILURE_MESSAGE.to_string()
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            base_error_key: default_base_error_key(),
            save_failure_message: default_save_failure_message(),
        }
    }
}

/// Engine configuration loaded from `formtree.toml`
///
/// # Example
///
/// ```toml
/// extensions = ["model"]
///
/// [apply]
/// base_error_key = "base"
/// save_failure_message = "could not be saved"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Extensions to activate, in order (dependencies are pulled in)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Failure reporting for `apply`
    #[serde(default)]
    pub apply: ApplyConfig,
}

fn default_extensions() -> Vec<String> {
    vec!["model".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            apply: ApplyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# formtree engine configuration
#
# Extensions to activate. Dependencies are activated first:
#   "model" pulls in "skipping" and "ordering" and needs a persistence adapter.
extensions = ["model"]

[apply]
# Error key for failures that do not belong to one attribute
base_error_key = "base"
# Message recorded when the adapter refuses a save without saying why
save_failure_message = "could not be saved"
"#
    }

    /// Parse config from TOML text
    ///
    /// # Errors
    ///
    /// `Error::Config` if the text is not valid config TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Read and parse config from a file
    ///
    /// # Errors
    ///
    /// `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist
    ///
    /// # Errors
    ///
    /// `Error::Config` if the file cannot be written.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to `path`
    ///
    /// # Errors
    ///
    /// `Error::Config` on serialization or write failure.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    fn check(&self) -> Result<()> {
        if self.apply.base_error_key.trim().is_empty() {
            return Err(Error::Config("apply.base_error_key must not be empty".to_string()));
        }
        if let Some(blank) = self.extensions.iter().find(|e| e.trim().is_empty()) {
            return Err(Error::Config(format!("invalid extension name '{}'", blank)));
        }
        Ok(())
    }
}

impl std::str::FromStr for EngineConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_toml(s)
    }
}
