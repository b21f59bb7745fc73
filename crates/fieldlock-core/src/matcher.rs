//! Scope Matcher: does a rule apply to a (user, KPI, objective) triple?
//!
//! A rule matches only when all three dimensions match on their own. There is
//! no OR across dimensions: a rule for user 8 on KPI X says nothing about
//! user 8 on KPI Y or user 9 on KPI X.
//!
//! Ids are compared as typed values. User and objective ids are `u64` by the
//! time they reach this module, so string/number mismatches cannot occur.

use crate::config::MatchingConfig;
use crate::rules::{LockRule, Scope};
use crate::types::{Dimension, EvaluationContext, KpiId, Subject};

/// Matches rule scopes against evaluation subjects.
#[derive(Debug, Clone)]
pub struct ScopeMatcher {
    kpi_separator: Option<String>,
}

impl Default for ScopeMatcher {
    fn default() -> Self {
        Self::new(&MatchingConfig::default())
    }
}

impl ScopeMatcher {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            kpi_separator: config.kpi_separator.clone().filter(|s| !s.is_empty()),
        }
    }

    /// A matcher comparing KPI ids as whole strings only.
    pub fn exact() -> Self {
        Self {
            kpi_separator: None,
        }
    }

    /// Whether `rule` applies to `context`. Ignores activity and fields.
    pub fn matches(&self, rule: &LockRule, context: &EvaluationContext) -> bool {
        self.mismatch(rule, context.subject()).is_none()
    }

    /// Whether `rule` applies to `subject`.
    pub fn matches_subject(&self, rule: &LockRule, subject: Subject<'_>) -> bool {
        self.mismatch(rule, subject).is_none()
    }

    /// The first dimension (user, KPI, objective) that rejects `subject`, if any.
    pub fn mismatch(&self, rule: &LockRule, subject: Subject<'_>) -> Option<Dimension> {
        if !rule.users.matches(&subject.user_id) {
            return Some(Dimension::User);
        }
        if !self.kpi_matches(&rule.kpis, subject.kpi_id) {
            return Some(Dimension::Kpi);
        }
        if !rule.objectives.matches(&subject.objective_id) {
            return Some(Dimension::Objective);
        }
        None
    }

    /// KPI matching with composite ids.
    ///
    /// With a separator configured, `"K1||K2"` matches a scope containing the
    /// whole string, `K1` or `K2`. Each comparison is still exact.
    pub fn kpi_matches(&self, scope: &Scope<KpiId>, kpi_id: &str) -> bool {
        if scope.matches(kpi_id) {
            return true;
        }
        match (scope, self.kpi_separator.as_deref()) {
            (Scope::Specific { .. }, Some(separator)) if kpi_id.contains(separator) => kpi_id
                .split(separator)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .any(|part| scope.matches(part)),
            _ => false,
        }
    }
}

/// Whether `rule`'s scopes all match `context`, with default matching settings.
pub fn matches(rule: &LockRule, context: &EvaluationContext) -> bool {
    ScopeMatcher::default().matches(rule, context)
}
