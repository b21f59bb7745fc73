//! Property tests for lock evaluation.

use std::collections::BTreeSet;

use fieldlock_core::{
    evaluate, evaluate_many, explain, matches, EvaluationContext, FieldCategory, KpiId,
    LockRule, RuleId, RuleSet, Scope,
};
use proptest::prelude::*;

const KPIS: &[&str] = &["K1", "K2", "K3", "K1||K2"];

fn arb_field() -> impl Strategy<Value = FieldCategory> {
    prop::sample::select(FieldCategory::ALL.to_vec())
}

fn arb_id_scope() -> impl Strategy<Value = Scope<u64>> {
    prop_oneof![
        Just(Scope::All),
        Just(Scope::None),
        prop::collection::btree_set(0u64..6, 0..4).prop_map(|ids| Scope::Specific { ids }),
    ]
}

fn arb_kpi_scope() -> impl Strategy<Value = Scope<KpiId>> {
    prop_oneof![
        Just(Scope::All),
        Just(Scope::None),
        prop::collection::btree_set(prop::sample::select(KPIS[..3].to_vec()), 0..3)
            .prop_map(|ids| Scope::specific(ids.into_iter().map(str::to_string))),
    ]
}

/// A rule without its id.
fn arb_rule_body() -> impl Strategy<Value = LockRule> {
    (
        arb_id_scope(),
        arb_kpi_scope(),
        arb_id_scope(),
        prop::collection::btree_set(arb_field(), 0..4),
        prop::bool::weighted(0.85),
    )
        .prop_map(|(users, kpis, objectives, fields, active)| {
            let rule = LockRule::new(0, fields)
                .with_users(users)
                .with_kpis(kpis)
                .with_objectives(objectives);
            if active {
                rule
            } else {
                rule.inactive()
            }
        })
}

fn arb_rules() -> impl Strategy<Value = Vec<LockRule>> {
    (
        prop::collection::btree_set(1u64..500, 0..10),
        prop::collection::vec(arb_rule_body(), 10),
    )
        .prop_map(|(ids, bodies)| {
            ids.into_iter()
                .zip(bodies)
                .map(|(id, mut rule)| {
                    rule.id = id;
                    rule
                })
                .collect()
        })
}

fn arb_context() -> impl Strategy<Value = EvaluationContext> {
    (0u64..6, prop::sample::select(KPIS), 0u64..6, arb_field())
        .prop_map(|(user, kpi, objective, field)| EvaluationContext::new(user, kpi, objective, field))
}

fn snapshot(rules: Vec<LockRule>) -> RuleSet {
    RuleSet::new(rules).expect("generated ids are unique")
}

fn next_id(rules: &[LockRule]) -> RuleId {
    rules.iter().map(|r| r.id).max().unwrap_or(0) + 1
}

proptest! {
    #[test]
    fn specific_user_scope_excludes_unlisted_users(
        rule in arb_rule_body(),
        ids in prop::collection::btree_set(0u64..6, 0..4),
        context in arb_context(),
    ) {
        let mut rule = rule;
        let mut ids = ids;
        ids.remove(&context.user_id);
        rule.users = Scope::Specific { ids };
        prop_assert!(!matches(&rule, &context));
    }

    #[test]
    fn empty_specific_behaves_like_none(
        rules in arb_rules(),
        body in arb_rule_body(),
        context in arb_context(),
    ) {
        let id = next_id(&rules);
        let mut empty = body.clone();
        empty.id = id;
        empty.objectives = Scope::Specific { ids: BTreeSet::new() };
        let mut none = body;
        none.id = id;
        none.objectives = Scope::None;

        prop_assert!(!matches(&empty, &context));
        prop_assert_eq!(matches(&empty, &context), matches(&none, &context));

        let mut with_empty = rules.clone();
        with_empty.push(empty);
        let mut with_none = rules;
        with_none.push(none);
        prop_assert_eq!(
            evaluate(&snapshot(with_empty), &context),
            evaluate(&snapshot(with_none), &context)
        );
    }

    #[test]
    fn adding_a_rule_never_unlocks(
        rules in arb_rules(),
        extra in arb_rule_body(),
        context in arb_context(),
    ) {
        let before = evaluate(&snapshot(rules.clone()), &context);

        let mut extra = extra;
        extra.id = next_id(&rules);
        let mut more = rules;
        more.push(extra);
        let after = evaluate(&snapshot(more), &context);

        prop_assert!(!before.is_locked || after.is_locked);
    }

    #[test]
    fn adding_a_matching_locking_rule_locks(
        rules in arb_rules(),
        context in arb_context(),
    ) {
        let extra = LockRule::new(next_id(&rules), [context.field])
            .with_users(Scope::specific([context.user_id]));
        let mut more = rules;
        more.push(extra);
        prop_assert!(evaluate(&snapshot(more), &context).is_locked);
    }

    #[test]
    fn batch_equals_single(
        rules in arb_rules(),
        contexts in prop::collection::vec(arb_context(), 0..30),
    ) {
        let rules = snapshot(rules);
        let batch = evaluate_many(&rules, &contexts);
        prop_assert_eq!(batch.len(), contexts.len());
        for (decision, context) in batch.iter().zip(&contexts) {
            prop_assert_eq!(decision, &evaluate(&rules, context));
        }
    }

    #[test]
    fn more_specific_rule_is_reported(
        context in arb_context(),
        a_id in 1u64..100,
        b_id in 100u64..200,
        a_first in any::<bool>(),
    ) {
        // A: specific user and objective. B: specific user only.
        let a = LockRule::new(a_id, [context.field])
            .with_users(Scope::specific([context.user_id]))
            .with_objectives(Scope::specific([context.objective_id]));
        let b = LockRule::new(b_id, [context.field])
            .with_users(Scope::specific([context.user_id]));
        // Swap ids so the more specific rule is sometimes the newer one
        let (a, b) = if a_first {
            (a, b)
        } else {
            let (mut a, mut b) = (a, b);
            std::mem::swap(&mut a.id, &mut b.id);
            (a, b)
        };
        let expected = a.id;

        let decision = evaluate(&snapshot(vec![a, b]), &context);
        prop_assert!(decision.is_locked);
        prop_assert_eq!(decision.matched_rule_id, Some(expected));
    }

    #[test]
    fn explanation_agrees_with_decision(
        rules in arb_rules(),
        context in arb_context(),
    ) {
        let rules = snapshot(rules);
        let explanation = explain(&rules, &context);
        prop_assert_eq!(explanation.traces.len(), rules.len());
        prop_assert_eq!(&explanation.decision, &evaluate(&rules, &context));
        prop_assert_eq!(
            explanation.decision.is_locked,
            explanation.locking_rules().next().is_some()
        );
    }
}
