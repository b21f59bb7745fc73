//! # fieldlock-bindings-core
//!
//! Shared request/response types for callers of the field lock engine.
//!
//! This crate provides:
//! - **IR types**: the lock-check API shape (`is_locked`, `lock_reason`, `lock_id`)
//! - **Conversions**: IR request → core context, core decision → IR response
//! - **Validation**: Fixtures for caller conformance
//!
//! ## Design Principle
//!
//! **Bindings do not define semantics.**
//!
//! All evaluation logic lives in `fieldlock-core`. This crate only converts:
//! 1. Accept wire input (strings, loosely typed ids)
//! 2. Convert to core types, failing on anything unreadable
//! 3. Call the engine
//! 4. Convert decisions to wire output
//!
//! ```text
//! Wire Request → EvaluationContext → LockEngine → LockDecision → Wire Response
//! ```

pub mod conversion;
pub mod types;
pub mod validation;

// Re-export IR types
pub use types::{
    IRBatchLockCheckRequest, IRBatchLockCheckResponse, IRBatchLockCheckResult, IRId,
    IRLockCheckRequest, IRLockCheckResponse,
};

// Re-export conversions
pub use conversion::{ConversionError, ToIR};

use fieldlock_core::{LockEngine, RuleSet};

/// Answer one lock check for `user_id`.
pub fn check(
    engine: &LockEngine,
    rules: &RuleSet,
    request: &IRLockCheckRequest,
    user_id: Option<u64>,
) -> Result<IRLockCheckResponse, ConversionError> {
    let context = request.to_context(0, user_id)?;
    Ok(engine.evaluate(rules, &context).into())
}

/// Answer a batch of lock checks.
///
/// Every check is converted before anything is evaluated, so one bad check
/// fails the whole batch instead of producing a partial answer.
pub fn check_batch(
    engine: &LockEngine,
    rules: &RuleSet,
    request: &IRBatchLockCheckRequest,
) -> Result<IRBatchLockCheckResponse, ConversionError> {
    let contexts = request.to_contexts()?;
    let decisions = engine.evaluate_many(rules, &contexts);

    let results = request
        .checks
        .iter()
        .zip(&contexts)
        .zip(decisions)
        .map(|((check, context), decision)| IRBatchLockCheckResult::new(check, context, decision))
        .collect();
    Ok(IRBatchLockCheckResponse { results })
}
