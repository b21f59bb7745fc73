//! Configuration for the lock engine.
//!
//! Everything here has a default matching how the rule store has always
//! behaved, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scope matching configuration
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Rule loading configuration
    #[serde(default)]
    pub loading: LoadingConfig,
}

impl EngineConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match extension(path).as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            Some("json") => Self::from_json(&contents),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Scope matching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Separator of composite KPI ids (`"K1||K2"`). `None` compares whole strings only.
    #[serde(default = "default_kpi_separator")]
    pub kpi_separator: Option<String>,
}

fn default_kpi_separator() -> Option<String> {
    Some("||".to_string())
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            kpi_separator: default_kpi_separator(),
        }
    }
}

/// Rule loading configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingConfig {
    /// What to do with rows of the flat (non-hierarchical) lock model
    #[serde(default)]
    pub legacy_rules: LegacyRulePolicy,

    /// How to read a dimension whose scope column is missing
    #[serde(default)]
    pub absent_scope: AbsentScopePolicy,
}

/// Handling of legacy flat-model rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyRulePolicy {
    /// Drop the row with a warning
    #[default]
    Skip,

    /// Fail the whole load
    Reject,
}

/// Handling of a missing scope column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentScopePolicy {
    /// Missing scope reads as `all`, the store's column default
    #[default]
    MatchAll,

    /// Missing scope reads as `none`
    MatchNothing,
}
