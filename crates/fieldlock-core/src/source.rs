//! Rule Store Adapter seam.
//!
//! The engine never talks to the store itself. Callers hand it a snapshot,
//! either one they built or one read through a `RuleSource`.

use std::path::{Path, PathBuf};

use crate::config::LoadingConfig;
use crate::rules::{RuleLoadError, RuleSet};

/// Anything that can produce a rule snapshot.
pub trait RuleSource {
    /// Take a snapshot of the current rules.
    fn snapshot(&self) -> Result<RuleSet, RuleLoadError>;
}

impl RuleSource for RuleSet {
    fn snapshot(&self) -> Result<RuleSet, RuleLoadError> {
        Ok(self.clone())
    }
}

/// A snapshot file exported from the store (`.yaml`, `.yml` or `.json`).
#[derive(Debug, Clone)]
pub struct FileRuleSource {
    path: PathBuf,
    config: LoadingConfig,
}

impl FileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, LoadingConfig::default())
    }

    pub fn with_config(path: impl Into<PathBuf>, config: LoadingConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for FileRuleSource {
    /// Re-reads the file on every call.
    fn snapshot(&self) -> Result<RuleSet, RuleLoadError> {
        RuleSet::from_file(&self.path, &self.config)
    }
}
