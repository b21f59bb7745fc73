//! Core types for field lock evaluation.
//!
//! These types are the data structures used throughout the engine for
//! evaluation requests, field categories, and lock decisions.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::rules::LockRule;

/// Identifier of a lock rule. Assigned in creation order by the rule store.
pub type RuleId = u64;

/// Identifier of a user.
pub type UserId = u64;

/// Identifier of a department objective.
pub type ObjectiveId = u64;

/// Identifier of a KPI. Opaque, compared by exact string equality.
pub type KpiId = String;

/// The six independently lockable aspects of an objective.
///
/// Ordered for deterministic iteration in `BTreeSet`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    AnnualTarget,
    MonthlyTarget,
    MonthlyActual,
    /// Every editable field except the three numeric ones (activity text,
    /// responsible person, MOV, ...). Does not imply any numeric field.
    OtherFields,
    AddObjective,
    DeleteObjective,
}

lazy_static! {
    /// Accepted spellings for each field category.
    ///
    /// `target` and `all_fields` are the names the objective editor sends.
    static ref FIELD_ALIASES: HashMap<&'static str, FieldCategory> = {
        let entries = [
            ("annual_target", FieldCategory::AnnualTarget),
            ("target", FieldCategory::AnnualTarget),
            ("monthly_target", FieldCategory::MonthlyTarget),
            ("monthly_actual", FieldCategory::MonthlyActual),
            ("other_fields", FieldCategory::OtherFields),
            ("all_other_fields", FieldCategory::OtherFields),
            ("all_fields", FieldCategory::OtherFields),
            ("add_objective", FieldCategory::AddObjective),
            ("delete_objective", FieldCategory::DeleteObjective),
        ];
        entries.into_iter().collect()
    };
}

impl FieldCategory {
    /// All categories in canonical order.
    pub const ALL: [FieldCategory; 6] = [
        FieldCategory::AnnualTarget,
        FieldCategory::MonthlyTarget,
        FieldCategory::MonthlyActual,
        FieldCategory::OtherFields,
        FieldCategory::AddObjective,
        FieldCategory::DeleteObjective,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldCategory::AnnualTarget => "annual_target",
            FieldCategory::MonthlyTarget => "monthly_target",
            FieldCategory::MonthlyActual => "monthly_actual",
            FieldCategory::OtherFields => "other_fields",
            FieldCategory::AddObjective => "add_objective",
            FieldCategory::DeleteObjective => "delete_objective",
        }
    }

    /// Label shown to administrators.
    pub fn label(&self) -> &'static str {
        match self {
            FieldCategory::AnnualTarget => "Annual Target",
            FieldCategory::MonthlyTarget => "Monthly Target",
            FieldCategory::MonthlyActual => "Monthly Actual",
            FieldCategory::OtherFields => "Other Fields",
            FieldCategory::AddObjective => "Add Objective",
            FieldCategory::DeleteObjective => "Delete Objective",
        }
    }

    /// Whether a month is meaningful for this category.
    pub fn is_monthly(&self) -> bool {
        matches!(self, FieldCategory::MonthlyTarget | FieldCategory::MonthlyActual)
    }
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldCategory::AnnualTarget => "AnnualTarget",
            FieldCategory::MonthlyTarget => "MonthlyTarget",
            FieldCategory::MonthlyActual => "MonthlyActual",
            FieldCategory::OtherFields => "OtherFields",
            FieldCategory::AddObjective => "AddObjective",
            FieldCategory::DeleteObjective => "DeleteObjective",
        };
        f.write_str(name)
    }
}

/// A field category name that does not name any lockable field.
///
/// Never mapped to "unlocked": callers must surface it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown field category: {0:?}")]
pub struct UnknownFieldCategory(pub String);

impl FromStr for FieldCategory {
    type Err = UnknownFieldCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        if let Some(field) = FIELD_ALIASES.get(key.as_str()) {
            return Ok(*field);
        }

        // Display names ("MonthlyActual") are accepted too
        FieldCategory::ALL
            .iter()
            .find(|f| f.to_string().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| UnknownFieldCategory(s.to_string()))
    }
}

/// The three scope dimensions of a lock rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    User,
    Kpi,
    Objective,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::User, Dimension::Kpi, Dimension::Objective];

    /// Plural noun used in scope summaries ("all-KPIs").
    pub fn plural(&self) -> &'static str {
        match self {
            Dimension::User => "users",
            Dimension::Kpi => "KPIs",
            Dimension::Objective => "objectives",
        }
    }

    /// Raw record field holding the scope value.
    pub fn scope_field(&self) -> &'static str {
        match self {
            Dimension::User => "user_scope",
            Dimension::Kpi => "kpi_scope",
            Dimension::Objective => "objective_scope",
        }
    }

    /// Raw record field holding the id collection.
    pub fn ids_field(&self) -> &'static str {
        match self {
            Dimension::User => "user_ids",
            Dimension::Kpi => "kpi_ids",
            Dimension::Objective => "objective_ids",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dimension::User => "user",
            Dimension::Kpi => "KPI",
            Dimension::Objective => "objective",
        })
    }
}

/// Shape of one scope dimension, without its ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    All,
    Specific,
    None,
}

impl ScopeKind {
    /// Per-dimension specificity: `Specific > All > None`.
    pub fn specificity(&self) -> u8 {
        match self {
            ScopeKind::Specific => 2,
            ScopeKind::All => 1,
            ScopeKind::None => 0,
        }
    }

    /// Prefix used in scope summaries ("specific-users").
    pub fn prefix(&self) -> &'static str {
        match self {
            ScopeKind::All => "all",
            ScopeKind::Specific => "specific",
            ScopeKind::None => "no",
        }
    }
}

/// One lock query: may this user edit this field of this objective?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// The user attempting the edit
    pub user_id: UserId,

    /// KPI the objective belongs to
    pub kpi_id: KpiId,

    /// The objective being edited
    pub objective_id: ObjectiveId,

    /// Which aspect of the objective is being edited
    pub field: FieldCategory,

    /// Month (YYYY-MM) for monthly fields. Carried for the caller only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

impl EvaluationContext {
    pub fn new(
        user_id: UserId,
        kpi_id: impl Into<KpiId>,
        objective_id: ObjectiveId,
        field: FieldCategory,
    ) -> Self {
        Self {
            user_id,
            kpi_id: kpi_id.into(),
            objective_id,
            field,
            month: None,
        }
    }

    /// Attach the month this check refers to.
    pub fn with_month(mut self, month: impl Into<String>) -> Self {
        self.month = Some(month.into());
        self
    }

    /// The scope-relevant part of the context.
    pub fn subject(&self) -> Subject<'_> {
        Subject {
            user_id: self.user_id,
            kpi_id: &self.kpi_id,
            objective_id: self.objective_id,
        }
    }
}

/// The (user, KPI, objective) triple that scope matching depends on.
///
/// Contexts sharing a subject share their scope-matching work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subject<'a> {
    pub user_id: UserId,
    pub kpi_id: &'a str,
    pub objective_id: ObjectiveId,
}

/// Result of evaluating one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDecision {
    /// Whether the edit is refused
    pub is_locked: bool,

    /// The rule reported as the cause (most specific, then oldest)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<RuleId>,

    /// Human-readable summary
    pub reason: String,
}

impl LockDecision {
    /// Decision for a context no active rule locks.
    pub fn unlocked(field: FieldCategory) -> Self {
        Self {
            is_locked: false,
            matched_rule_id: None,
            reason: format!("not locked: no active rule matching this context locks {}", field),
        }
    }

    /// Decision citing `rule` as the governing lock.
    pub fn locked_by(rule: &LockRule, field: FieldCategory) -> Self {
        Self {
            is_locked: true,
            matched_rule_id: Some(rule.id),
            reason: format!(
                "locked by rule #{}: {}, locks {}.",
                rule.id,
                rule.scope_summary(),
                field
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_category_parses_canonical_names() {
        for field in FieldCategory::ALL {
            assert_eq!(field.as_str().parse::<FieldCategory>(), Ok(field));
        }
    }

    #[test]
    fn test_field_category_parses_editor_aliases() {
        assert_eq!("target".parse::<FieldCategory>(), Ok(FieldCategory::AnnualTarget));
        assert_eq!("all_fields".parse::<FieldCategory>(), Ok(FieldCategory::OtherFields));
        assert_eq!("Monthly-Actual".parse::<FieldCategory>(), Ok(FieldCategory::MonthlyActual));
        assert_eq!("DeleteObjective".parse::<FieldCategory>(), Ok(FieldCategory::DeleteObjective));
    }

    #[test]
    fn test_unknown_field_category_is_an_error() {
        let err = "budget".parse::<FieldCategory>().unwrap_err();
        assert_eq!(err, UnknownFieldCategory("budget".to_string()));
        assert!("".parse::<FieldCategory>().is_err());
    }

    #[test]
    fn test_specificity_order() {
        assert!(ScopeKind::Specific.specificity() > ScopeKind::All.specificity());
        assert!(ScopeKind::All.specificity() > ScopeKind::None.specificity());
    }

    #[test]
    fn test_context_serialization_omits_missing_month() {
        let ctx = EvaluationContext::new(8, "K1", 42, FieldCategory::AnnualTarget);
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("month"));
        assert!(json.contains("\"field\":\"annual_target\""));

        let with_month = ctx.with_month("2025-03");
        let parsed: EvaluationContext =
            serde_json::from_str(&serde_json::to_string(&with_month).unwrap()).unwrap();
        assert_eq!(parsed.month.as_deref(), Some("2025-03"));
    }
}
