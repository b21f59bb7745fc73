//! Lock Evaluator: combines matching and field resolution into one decision.
//!
//! The evaluator applies fixed, non-configurable policy:
//! 1. Inactive rules are ignored
//! 2. A rule participates if its scopes match and it locks the requested field
//! 3. If ANY rule participates → locked. Nothing unlocks; locking is a monotonic OR
//! 4. The reported rule is the most specific participant, oldest id first on ties
//!
//! Precedence only picks which rule is cited. It never decides whether a
//! field is locked.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::matcher::ScopeMatcher;
use crate::rules::{LockRule, RuleSet};
use crate::types::{Dimension, EvaluationContext, FieldCategory, LockDecision, RuleId, Subject};

/// Why a rule did or did not govern a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOutcome {
    Inactive,
    UserScopeMismatch,
    KpiScopeMismatch,
    ObjectiveScopeMismatch,
    FieldNotLocked,
    Locks,
}

impl TraceOutcome {
    fn scope_mismatch(dimension: Dimension) -> Self {
        match dimension {
            Dimension::User => TraceOutcome::UserScopeMismatch,
            Dimension::Kpi => TraceOutcome::KpiScopeMismatch,
            Dimension::Objective => TraceOutcome::ObjectiveScopeMismatch,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TraceOutcome::Inactive => "inactive",
            TraceOutcome::UserScopeMismatch => "user scope does not match",
            TraceOutcome::KpiScopeMismatch => "KPI scope does not match",
            TraceOutcome::ObjectiveScopeMismatch => "objective scope does not match",
            TraceOutcome::FieldNotLocked => "field not locked by this rule",
            TraceOutcome::Locks => "locks",
        }
    }
}

/// Outcome of one rule for one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTrace {
    pub rule_id: RuleId,
    pub specificity: u8,
    pub outcome: TraceOutcome,
}

/// A decision together with what every rule in the snapshot did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub decision: LockDecision,

    /// One entry per rule, in id order
    pub traces: Vec<RuleTrace>,
}

impl Explanation {
    /// Rules that lock the field, i.e. every rule enforcing the decision.
    pub fn locking_rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.traces
            .iter()
            .filter(|t| t.outcome == TraceOutcome::Locks)
            .map(|t| t.rule_id)
    }
}

/// The Lock Evaluator.
#[derive(Debug, Clone, Default)]
pub struct LockEvaluator {
    matcher: ScopeMatcher,
}

impl LockEvaluator {
    pub fn new(matcher: ScopeMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &ScopeMatcher {
        &self.matcher
    }

    /// Evaluate one context against a rule snapshot.
    pub fn evaluate(&self, rules: &RuleSet, context: &EvaluationContext) -> LockDecision {
        let locking = rules
            .active()
            .filter(|rule| rule.locks(context.field))
            .filter(|rule| self.matcher.matches(rule, context));
        let decision = decide(locking, context.field);

        tracing::debug!(
            user_id = context.user_id,
            kpi_id = %context.kpi_id,
            objective_id = context.objective_id,
            field = %context.field,
            locked = decision.is_locked,
            rule_id = ?decision.matched_rule_id,
            "Evaluated field lock"
        );
        decision
    }

    /// Evaluate one context and record the outcome of every rule.
    pub fn explain(&self, rules: &RuleSet, context: &EvaluationContext) -> Explanation {
        let subject = context.subject();
        let traces: Vec<RuleTrace> = rules
            .rules()
            .iter()
            .map(|rule| {
                let outcome = self.trace(rule, subject, context.field);
                if outcome != TraceOutcome::Locks {
                    tracing::debug!(rule_id = rule.id, reason = outcome.as_str(), "Rule skipped");
                }
                RuleTrace {
                    rule_id: rule.id,
                    specificity: rule.specificity(),
                    outcome,
                }
            })
            .collect();

        let locking = rules
            .rules()
            .iter()
            .zip(&traces)
            .filter(|(_, trace)| trace.outcome == TraceOutcome::Locks)
            .map(|(rule, _)| rule);
        let decision = decide(locking, context.field);

        Explanation { decision, traces }
    }

    fn trace(&self, rule: &LockRule, subject: Subject<'_>, field: FieldCategory) -> TraceOutcome {
        if !rule.is_active {
            return TraceOutcome::Inactive;
        }
        if let Some(dimension) = self.matcher.mismatch(rule, subject) {
            return TraceOutcome::scope_mismatch(dimension);
        }
        if !rule.locks(field) {
            return TraceOutcome::FieldNotLocked;
        }
        TraceOutcome::Locks
    }
}

/// Pick the governing rule among rules that all lock `field`.
///
/// Highest specificity wins; among equals, the smallest id. The result does
/// not depend on iteration order.
pub(crate) fn decide<'a>(
    locking: impl IntoIterator<Item = &'a LockRule>,
    field: FieldCategory,
) -> LockDecision {
    locking
        .into_iter()
        .max_by_key(|rule| (rule.specificity(), Reverse(rule.id)))
        .map(|rule| LockDecision::locked_by(rule, field))
        .unwrap_or_else(|| LockDecision::unlocked(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Scope;

    fn rules(rules: Vec<LockRule>) -> RuleSet {
        RuleSet::new(rules).unwrap()
    }

    fn ctx(user: u64, field: FieldCategory) -> EvaluationContext {
        EvaluationContext::new(user, "K1", 42, field)
    }

    #[test]
    fn test_no_rules_is_unlocked() {
        let decision = LockEvaluator::default().evaluate(&RuleSet::default(), &ctx(8, FieldCategory::AnnualTarget));
        assert!(!decision.is_locked);
        assert_eq!(decision.matched_rule_id, None);
    }

    #[test]
    fn test_rule_11_specific_user() {
        let set = rules(vec![LockRule::new(11, [FieldCategory::MonthlyActual])
            .with_users(Scope::specific([8]))]);
        let evaluator = LockEvaluator::default();

        let locked = evaluator.evaluate(&set, &ctx(8, FieldCategory::MonthlyActual));
        assert!(locked.is_locked);
        assert_eq!(locked.matched_rule_id, Some(11));
        assert_eq!(
            locked.reason,
            "locked by rule #11: specific-users, all-KPIs, all-objectives, locks MonthlyActual."
        );

        let other_user = evaluator.evaluate(&set, &ctx(9, FieldCategory::MonthlyActual));
        assert!(!other_user.is_locked);
    }

    #[test]
    fn test_rule_5_other_fields_does_not_lock_annual_target() {
        let set = rules(vec![LockRule::new(5, [FieldCategory::OtherFields])]);
        let evaluator = LockEvaluator::default();
        assert!(!evaluator.evaluate(&set, &ctx(8, FieldCategory::AnnualTarget)).is_locked);
        assert!(evaluator.evaluate(&set, &ctx(8, FieldCategory::OtherFields)).is_locked);
    }

    #[test]
    fn test_most_specific_rule_is_reported() {
        let set = rules(vec![
            LockRule::new(3, [FieldCategory::AnnualTarget]),
            LockRule::new(7, [FieldCategory::AnnualTarget]).with_users(Scope::specific([8])),
        ]);
        let evaluator = LockEvaluator::default();
        assert_eq!(
            evaluator.evaluate(&set, &ctx(8, FieldCategory::AnnualTarget)).matched_rule_id,
            Some(7)
        );
        assert_eq!(
            evaluator.evaluate(&set, &ctx(9, FieldCategory::AnnualTarget)).matched_rule_id,
            Some(3)
        );
    }

    #[test]
    fn test_tie_goes_to_oldest_rule() {
        let set = rules(vec![
            LockRule::new(20, [FieldCategory::MonthlyTarget]).with_users(Scope::specific([8])),
            LockRule::new(4, [FieldCategory::MonthlyTarget]).with_kpis(Scope::specific(["K1".to_string()])),
        ]);
        let decision = LockEvaluator::default().evaluate(&set, &ctx(8, FieldCategory::MonthlyTarget));
        assert_eq!(decision.matched_rule_id, Some(4));
    }

    #[test]
    fn test_inactive_rules_are_ignored() {
        let set = rules(vec![LockRule::new(1, [FieldCategory::AnnualTarget]).inactive()]);
        assert!(!LockEvaluator::default().evaluate(&set, &ctx(8, FieldCategory::AnnualTarget)).is_locked);
    }

    #[test]
    fn test_none_scope_rule_cannot_lock() {
        let set = rules(vec![LockRule::new(1, [FieldCategory::AnnualTarget]).with_users(Scope::None)]);
        assert!(!LockEvaluator::default().evaluate(&set, &ctx(8, FieldCategory::AnnualTarget)).is_locked);
    }

    #[test]
    fn test_explain_traces_every_rule() {
        let set = rules(vec![
            LockRule::new(1, [FieldCategory::AnnualTarget]).inactive(),
            LockRule::new(2, [FieldCategory::AnnualTarget]).with_users(Scope::specific([9])),
            LockRule::new(3, [FieldCategory::AnnualTarget]).with_kpis(Scope::None),
            LockRule::new(4, [FieldCategory::AnnualTarget]).with_objectives(Scope::specific([1])),
            LockRule::new(5, [FieldCategory::OtherFields]),
            LockRule::new(6, [FieldCategory::AnnualTarget]),
        ]);
        let evaluator = LockEvaluator::default();
        let context = ctx(8, FieldCategory::AnnualTarget);
        let explanation = evaluator.explain(&set, &context);

        let outcomes: Vec<TraceOutcome> = explanation.traces.iter().map(|t| t.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                TraceOutcome::Inactive,
                TraceOutcome::UserScopeMismatch,
                TraceOutcome::KpiScopeMismatch,
                TraceOutcome::ObjectiveScopeMismatch,
                TraceOutcome::FieldNotLocked,
                TraceOutcome::Locks,
            ]
        );
        assert_eq!(explanation.decision, evaluator.evaluate(&set, &context));
        assert_eq!(explanation.locking_rules().collect::<Vec<_>>(), vec![6]);
    }

    #[test]
    fn test_decide_ignores_order() {
        let a = LockRule::new(2, [FieldCategory::AnnualTarget]).with_users(Scope::specific([1]));
        let b = LockRule::new(1, [FieldCategory::AnnualTarget]).with_kpis(Scope::specific(["K1".to_string()]));
        let forward = decide([&a, &b], FieldCategory::AnnualTarget);
        let backward = decide([&b, &a], FieldCategory::AnnualTarget);
        assert_eq!(forward, backward);
        assert_eq!(forward.matched_rule_id, Some(1));
    }

    mod order {
        use super::*;
        use proptest::prelude::*;

        fn arb_user_scope() -> impl Strategy<Value = Scope<u64>> {
            prop_oneof![Just(Scope::All), Just(Scope::specific([8]))]
        }

        fn arb_kpi_scope() -> impl Strategy<Value = Scope<String>> {
            prop_oneof![Just(Scope::All), Just(Scope::specific(["K1".to_string()]))]
        }

        /// Locking rules with unique ids, sorted by id.
        fn arb_locking_rules() -> impl Strategy<Value = Vec<LockRule>> {
            (
                prop::collection::btree_set(1u64..200, 1..8),
                prop::collection::vec((arb_user_scope(), arb_kpi_scope(), arb_user_scope()), 8),
            )
                .prop_map(|(ids, scopes)| {
                    ids.into_iter()
                        .zip(scopes)
                        .map(|(id, (users, kpis, objectives))| {
                            LockRule::new(id, [FieldCategory::AnnualTarget])
                                .with_users(users)
                                .with_kpis(kpis)
                                .with_objectives(objectives)
                        })
                        .collect()
                })
        }

        proptest! {
            #[test]
            fn decide_ignores_input_order(
                (sorted, shuffled) in arb_locking_rules()
                    .prop_flat_map(|rules| (Just(rules.clone()), Just(rules).prop_shuffle())),
            ) {
                let field = FieldCategory::AnnualTarget;
                let expected = decide(&sorted, field);
                prop_assert_eq!(&decide(&shuffled, field), &expected);
                prop_assert_eq!(&decide(sorted.iter().rev(), field), &expected);
                prop_assert!(expected.is_locked);
            }
        }
    }
}
