//! Batch Evaluator: many contexts against one snapshot in a single pass.
//!
//! A screen renders every cell of an objective table at once. Contexts are
//! grouped by their (user, KPI, objective) subject; scope matching runs once
//! per group and field resolution once per distinct field in the group.
//! Results are identical to evaluating each context on its own.

use std::collections::{BTreeMap, HashMap};

use crate::evaluator::{decide, LockEvaluator};
use crate::matcher::ScopeMatcher;
use crate::rules::{LockRule, RuleSet};
use crate::types::{EvaluationContext, FieldCategory, LockDecision, Subject};

/// Rules matching one subject, and the decisions already made for it.
struct SubjectGroup<'r> {
    matched: Vec<&'r LockRule>,
    decisions: BTreeMap<FieldCategory, LockDecision>,
}

impl<'r> SubjectGroup<'r> {
    fn new(matcher: &ScopeMatcher, rules: &'r RuleSet, subject: Subject<'_>) -> Self {
        Self {
            matched: rules
                .active()
                .filter(|rule| matcher.matches_subject(rule, subject))
                .collect(),
            decisions: BTreeMap::new(),
        }
    }

    fn decision(&mut self, field: FieldCategory) -> &LockDecision {
        let matched = &self.matched;
        self.decisions.entry(field).or_insert_with(|| {
            decide(
                matched.iter().copied().filter(|rule| rule.locks(field)),
                field,
            )
        })
    }
}

/// Evaluates lists of contexts with shared scope-matching work.
#[derive(Debug, Clone, Default)]
pub struct BatchEvaluator {
    evaluator: LockEvaluator,
}

impl BatchEvaluator {
    pub fn new(evaluator: LockEvaluator) -> Self {
        Self { evaluator }
    }

    /// One decision per context, in input order.
    pub fn evaluate_many(
        &self,
        rules: &RuleSet,
        contexts: &[EvaluationContext],
    ) -> Vec<LockDecision> {
        let matcher = self.evaluator.matcher();
        let mut groups: HashMap<Subject<'_>, SubjectGroup<'_>> = HashMap::new();

        let decisions: Vec<LockDecision> = contexts
            .iter()
            .map(|context| {
                let subject = context.subject();
                groups
                    .entry(subject)
                    .or_insert_with(|| SubjectGroup::new(matcher, rules, subject))
                    .decision(context.field)
                    .clone()
            })
            .collect();

        tracing::debug!(
            contexts = contexts.len(),
            groups = groups.len(),
            locked = decisions.iter().filter(|d| d.is_locked).count(),
            "Evaluated field lock batch"
        );
        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Scope;

    fn snapshot() -> RuleSet {
        RuleSet::new(vec![
            LockRule::new(3, [FieldCategory::AnnualTarget]),
            LockRule::new(7, [FieldCategory::AnnualTarget, FieldCategory::MonthlyActual])
                .with_users(Scope::specific([8])),
            LockRule::new(9, [FieldCategory::DeleteObjective])
                .with_objectives(Scope::specific([42])),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_batch() {
        let decisions = BatchEvaluator::default().evaluate_many(&snapshot(), &[]);
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_preserves_order_and_matches_single_evaluation() {
        let rules = snapshot();
        let contexts = vec![
            EvaluationContext::new(8, "K1", 42, FieldCategory::AnnualTarget),
            EvaluationContext::new(9, "K1", 42, FieldCategory::AnnualTarget),
            EvaluationContext::new(8, "K1", 42, FieldCategory::MonthlyActual).with_month("2025-03"),
            EvaluationContext::new(8, "K1", 43, FieldCategory::DeleteObjective),
            EvaluationContext::new(9, "K1", 42, FieldCategory::DeleteObjective),
            EvaluationContext::new(8, "K1", 42, FieldCategory::AnnualTarget),
            EvaluationContext::new(9, "K2", 42, FieldCategory::OtherFields),
        ];

        let batch = BatchEvaluator::default().evaluate_many(&rules, &contexts);
        let single = LockEvaluator::default();
        assert_eq!(batch.len(), contexts.len());
        for (decision, context) in batch.iter().zip(&contexts) {
            assert_eq!(decision, &single.evaluate(&rules, context));
        }

        assert_eq!(batch[0].matched_rule_id, Some(7));
        assert_eq!(batch[1].matched_rule_id, Some(3));
        assert!(batch[2].is_locked);
        assert!(!batch[3].is_locked);
        assert_eq!(batch[4].matched_rule_id, Some(9));
        assert!(!batch[6].is_locked);
    }

    #[test]
    fn test_mixed_users_in_one_batch() {
        // Same objective and KPI, different users: grouping must not leak user 8's lock to user 9
        let rules = RuleSet::new(vec![
            LockRule::new(11, [FieldCategory::MonthlyActual]).with_users(Scope::specific([8]))
        ])
        .unwrap();
        let contexts = vec![
            EvaluationContext::new(8, "K1", 42, FieldCategory::MonthlyActual),
            EvaluationContext::new(9, "K1", 42, FieldCategory::MonthlyActual),
        ];
        let batch = BatchEvaluator::default().evaluate_many(&rules, &contexts);
        assert!(batch[0].is_locked);
        assert!(!batch[1].is_locked);
    }
}
