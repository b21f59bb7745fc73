//! Lock rules and rule snapshots.
//!
//! Rules arrive from the store as loosely typed rows. This module normalizes
//! them once, at load, into typed `LockRule`s so evaluation never has to deal
//! with malformed data.

mod ids;
mod parser;
mod scope;

pub use parser::{LoadIssue, LoadWarning, LockRule, RawLockRule, RuleLoadError, RuleSet};
pub use scope::Scope;
