//! Tracking configuration.
//!
//! Controls the loader instrumentation pass: whether it runs, which loader
//! globals it wraps, and how wrapped loaders are named. Field names are
//! camelCase and unknown fields are rejected, so a typo in a build config
//! fails loudly instead of silently disabling tracking.
//!
//! ```json
//! { "enabled": true, "instrumentedGlobals": ["__turbopack_load__"] }
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::instrument::BUNDLER_LOADER_GLOBALS;
use crate::track::TRACKED_NAME_PREFIX;

/// Errors produced while loading or validating a [`TrackingConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// The TOML document could not be parsed.
    #[cfg(feature = "config-file")]
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// A field holds a value the instrumentation cannot use.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Offending field, as spelled in the config document.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Configuration of the loader instrumentation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct TrackingConfig {
    /// Run the instrumentation pass at all.
    pub enabled: bool,
    /// Prefix of the diagnostic name given to wrapped loaders.
    pub function_name_prefix: String,
    /// Loader globals to wrap when they are registered.
    pub instrumented_globals: Vec<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            function_name_prefix: TRACKED_NAME_PREFIX.to_owned(),
            instrumented_globals: BUNDLER_LOADER_GLOBALS
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        }
    }
}

impl TrackingConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a TOML config document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file; `.json` is parsed as JSON, anything else as TOML.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&source)
        } else {
            Self::from_toml_str(&source)
        }
    }

    /// Returns a config with the pass switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Checks that the values can be used by the instrumentation pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.function_name_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "functionNamePrefix",
                reason: "must not be empty".into(),
            });
        }
        let mut seen = BTreeSet::new();
        for name in &self.instrumented_globals {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "instrumentedGlobals",
                    reason: "names must not be blank".into(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "instrumentedGlobals",
                    reason: format!("`{name}` is listed twice"),
                });
            }
        }
        Ok(())
    }
}
