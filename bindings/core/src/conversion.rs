//! Conversions between fieldlock-core types and IR types.
//!
//! Single source of truth for type mapping. Callers convert
//! IR → core, evaluate, then core → IR, never skipping a step.
//!
//! **These conversions are pure data transformations with no semantic logic.**
//! Input that cannot be converted is an error; it is never read as "unlocked".

use fieldlock_core::{EvaluationContext, FieldCategory, LockDecision, UnknownFieldCategory, UserId};
use thiserror::Error;

use crate::types::*;

/// Errors converting IR requests into evaluation contexts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error(transparent)]
    UnknownFieldType(#[from] UnknownFieldCategory),

    #[error("Invalid {field}: {value:?} is not a numeric id")]
    InvalidId { field: &'static str, value: String },

    #[error("Check {index} has no user id and the batch names none")]
    MissingUserId { index: usize },

    #[error("Check {index} has an empty KPI")]
    EmptyKpi { index: usize },
}

/// Trait for converting core types to IR types.
pub trait ToIR<T> {
    fn to_ir(&self) -> T;
}

// --- Ids ---

impl IRId {
    /// The numeric value of this id.
    pub fn to_u64(&self, field: &'static str) -> Result<u64, ConversionError> {
        match self {
            IRId::Number(n) => Ok(*n),
            IRId::Text(s) => s.trim().parse().map_err(|_| ConversionError::InvalidId {
                field,
                value: s.clone(),
            }),
        }
    }
}

// --- Requests ---

impl IRLockCheckRequest {
    /// Build the evaluation context for this check.
    ///
    /// `index` is the position in its batch, used in error messages.
    pub fn to_context(
        &self,
        index: usize,
        batch_user: Option<UserId>,
    ) -> Result<EvaluationContext, ConversionError> {
        let field: FieldCategory = self.field_type.parse()?;
        let objective_id = self
            .department_objective_id
            .to_u64("department_objective_id")?;
        let user_id = match &self.user_id {
            Some(id) => id.to_u64("user_id")?,
            None => batch_user.ok_or(ConversionError::MissingUserId { index })?,
        };
        let kpi = self.kpi.trim();
        if kpi.is_empty() {
            return Err(ConversionError::EmptyKpi { index });
        }

        let context = EvaluationContext::new(user_id, kpi, objective_id, field);
        Ok(match &self.month {
            Some(month) => context.with_month(month.clone()),
            None => context,
        })
    }
}

impl IRBatchLockCheckRequest {
    /// Convert every check, failing on the first bad one.
    pub fn to_contexts(&self) -> Result<Vec<EvaluationContext>, ConversionError> {
        let batch_user = self
            .user_id
            .as_ref()
            .map(|id| id.to_u64("user_id"))
            .transpose()?;
        self.checks
            .iter()
            .enumerate()
            .map(|(index, check)| check.to_context(index, batch_user))
            .collect()
    }
}

// --- LockDecision ---

impl From<LockDecision> for IRLockCheckResponse {
    fn from(decision: LockDecision) -> Self {
        if !decision.is_locked {
            return IRLockCheckResponse::unlocked();
        }
        IRLockCheckResponse {
            is_locked: true,
            lock_reason: Some(decision.reason),
            lock_id: decision.matched_rule_id,
        }
    }
}

impl From<&LockDecision> for IRLockCheckResponse {
    fn from(decision: &LockDecision) -> Self {
        decision.clone().into()
    }
}

impl ToIR<IRLockCheckResponse> for LockDecision {
    fn to_ir(&self) -> IRLockCheckResponse {
        self.into()
    }
}

// --- Batch results ---

impl IRBatchLockCheckResult {
    /// Pair a decision with the check it answers.
    pub fn new(check: &IRLockCheckRequest, context: &EvaluationContext, decision: LockDecision) -> Self {
        Self {
            field_type: check.field_type.clone(),
            department_objective_id: context.objective_id,
            month: check.month.clone(),
            response: decision.into(),
        }
    }
}
