//! # fieldlock-core
//!
//! Deterministic field lock evaluation for KPI objective editing.
//!
//! This crate answers one question: may this user edit this field of this
//! objective right now?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same snapshot and context always produce the same decision
//! 2. **Monotonic**: Any matching rule that locks a field locks it; nothing unlocks
//! 3. **Traceable**: Every locked decision cites the governing rule id
//! 4. **Pure**: No I/O on the evaluation path, no shared mutable state
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldlock_core::{evaluate, EvaluationContext, FieldCategory, RuleSet};
//!
//! let rules = RuleSet::from_yaml(&std::fs::read_to_string("locks.yaml")?)?;
//! let context = EvaluationContext::new(8, "K1", 42, FieldCategory::MonthlyActual);
//! let decision = evaluate(&rules, &context);
//!
//! if decision.is_locked {
//!     println!("{}", decision.reason);
//! }
//! ```

pub mod batch;
pub mod config;
pub mod evaluator;
pub mod matcher;
pub mod resolver;
pub mod rules;
pub mod source;
pub mod types;

// Re-export main types at crate root
pub use batch::BatchEvaluator;
pub use config::{AbsentScopePolicy, ConfigError, EngineConfig, LegacyRulePolicy, LoadingConfig, MatchingConfig};
pub use evaluator::{Explanation, LockEvaluator, RuleTrace, TraceOutcome};
pub use matcher::{matches, ScopeMatcher};
pub use resolver::locks_field;
pub use rules::{LoadIssue, LoadWarning, LockRule, RawLockRule, RuleLoadError, RuleSet, Scope};
pub use source::{FileRuleSource, RuleSource};
pub use types::{
    Dimension, EvaluationContext, FieldCategory, KpiId, LockDecision, ObjectiveId, RuleId,
    ScopeKind, Subject, UnknownFieldCategory, UserId,
};

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during evaluation
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    UnknownFieldCategory(#[from] UnknownFieldCategory),

    #[error("Rule load error: {0}")]
    RuleLoad(#[from] RuleLoadError),

    #[error("Invalid evaluation context: {0}")]
    InvalidContext(String),
}

/// The lock engine: an evaluator and a batch evaluator sharing one configuration.
///
/// Holds no rules. Every call takes the snapshot to evaluate against, so one
/// engine can serve any number of concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct LockEngine {
    config: EngineConfig,
    evaluator: LockEvaluator,
    batch: BatchEvaluator,
}

impl LockEngine {
    pub fn new(config: EngineConfig) -> Self {
        let evaluator = LockEvaluator::new(ScopeMatcher::new(&config.matching));
        Self {
            batch: BatchEvaluator::new(evaluator.clone()),
            evaluator,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load a snapshot file using this engine's loading rules.
    pub fn load_rules(&self, path: impl AsRef<Path>) -> Result<RuleSet, RuleLoadError> {
        RuleSet::from_file(path, &self.config.loading)
    }

    /// Evaluate one context.
    pub fn evaluate(&self, rules: &RuleSet, context: &EvaluationContext) -> LockDecision {
        self.evaluator.evaluate(rules, context)
    }

    /// Evaluate many contexts; one decision per context, same order.
    pub fn evaluate_many(
        &self,
        rules: &RuleSet,
        contexts: &[EvaluationContext],
    ) -> Vec<LockDecision> {
        self.batch.evaluate_many(rules, contexts)
    }

    /// Evaluate one context and report what every rule did.
    pub fn explain(&self, rules: &RuleSet, context: &EvaluationContext) -> Explanation {
        self.evaluator.explain(rules, context)
    }

    /// Evaluate against a fresh snapshot from `source`.
    pub fn evaluate_from(
        &self,
        source: &impl RuleSource,
        context: &EvaluationContext,
    ) -> Result<LockDecision, EvaluationError> {
        let rules = source.snapshot()?;
        Ok(self.evaluate(&rules, context))
    }

    /// Evaluate a request whose field arrives as a name.
    ///
    /// An unknown field name is an error, never "unlocked".
    pub fn check(
        &self,
        rules: &RuleSet,
        user_id: UserId,
        kpi_id: &str,
        objective_id: ObjectiveId,
        field: &str,
    ) -> Result<LockDecision, EvaluationError> {
        let field: FieldCategory = field.parse()?;
        let kpi_id = kpi_id.trim();
        if kpi_id.is_empty() {
            return Err(EvaluationError::InvalidContext("KPI id is empty".to_string()));
        }
        let context = EvaluationContext::new(user_id, kpi_id, objective_id, field);
        Ok(self.evaluate(rules, &context))
    }
}

/// Evaluate one context with the default configuration.
pub fn evaluate(rules: &RuleSet, context: &EvaluationContext) -> LockDecision {
    LockEngine::default().evaluate(rules, context)
}

/// Evaluate many contexts with the default configuration.
pub fn evaluate_many(rules: &RuleSet, contexts: &[EvaluationContext]) -> Vec<LockDecision> {
    LockEngine::default().evaluate_many(rules, contexts)
}

/// Explain one evaluation with the default configuration.
pub fn explain(rules: &RuleSet, context: &EvaluationContext) -> Explanation {
    LockEngine::default().explain(rules, context)
}
