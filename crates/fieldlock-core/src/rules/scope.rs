//! Per-dimension rule scopes.
//!
//! Each dimension of a rule is a tagged variant rather than a nullable id
//! list plus a flag, so "Specific with no ids" cannot be represented.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;

use crate::types::{Dimension, ScopeKind};

/// Which values of one dimension a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope<T: Ord> {
    /// Every value matches.
    All,

    /// No value matches. Used to neuter one dimension without deleting the rule.
    None,

    /// Exactly the listed values match.
    Specific { ids: BTreeSet<T> },
}

impl<T: Ord> Scope<T> {
    /// Build a `Specific` scope from any collection of ids.
    pub fn specific(ids: impl IntoIterator<Item = T>) -> Self {
        Scope::Specific {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::All => ScopeKind::All,
            Scope::None => ScopeKind::None,
            Scope::Specific { .. } => ScopeKind::Specific,
        }
    }

    /// Whether `id` falls inside this scope.
    pub fn matches<Q>(&self, id: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self {
            Scope::All => true,
            Scope::None => false,
            // An empty id set matches nothing, same as `None`
            Scope::Specific { ids } if ids.is_empty() => false,
            Scope::Specific { ids } => ids.contains(id),
        }
    }

    /// Whether no value can ever match.
    pub fn matches_nothing(&self) -> bool {
        match self {
            Scope::All => false,
            Scope::None => true,
            Scope::Specific { ids } => ids.is_empty(),
        }
    }

    /// The ids of a `Specific` scope, if any.
    pub fn ids(&self) -> Option<&BTreeSet<T>> {
        match self {
            Scope::Specific { ids } => Some(ids),
            _ => None,
        }
    }

    /// Summary fragment such as `specific-users` or `all-KPIs`.
    pub fn summary(&self, dimension: Dimension) -> String {
        format!("{}-{}", self.kind().prefix(), dimension.plural())
    }

    /// Listing fragment such as `All Users` or `3 KPI(s)`.
    pub fn describe(&self, dimension: Dimension) -> String {
        let (plural, singular) = match dimension {
            Dimension::User => ("Users", "User"),
            Dimension::Kpi => ("KPIs", "KPI"),
            Dimension::Objective => ("Objectives", "Objective"),
        };
        match self {
            Scope::All => format!("All {}", plural),
            Scope::None => format!("No {}", plural),
            Scope::Specific { ids } => format!("{} {}(s)", ids.len(), singular),
        }
    }
}

impl<T: Ord> Default for Scope<T> {
    fn default() -> Self {
        Scope::All
    }
}
