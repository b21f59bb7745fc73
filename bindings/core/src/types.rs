//! Intermediate Representation (IR) types for the lock-check API shape.
//!
//! These mirror what the web layer sends and returns:
//! - Field types as plain strings, parsed (and rejected) during conversion
//! - Ids as numbers or numeric strings
//! - Optional fields omitted rather than null
//!
//! **These types carry no semantics.** They are pure data representations
//! for marshalling between the engine and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An id as it arrives on the wire: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IRId {
    Number(u64),
    Text(String),
}

impl fmt::Display for IRId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IRId::Number(n) => write!(f, "{}", n),
            IRId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for IRId {
    fn from(n: u64) -> Self {
        IRId::Number(n)
    }
}

/// One lock check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRLockCheckRequest {
    /// Field category name (`annual_target`, `target`, `monthly_actual`, ...)
    pub field_type: String,

    pub department_objective_id: IRId,

    /// KPI of the objective; may be composite (`"K1||K2"`)
    pub kpi: String,

    /// Month (YYYY-MM) for monthly fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,

    /// Overrides the batch user when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<IRId>,
}

/// Result of one lock check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRLockCheckResponse {
    pub is_locked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_id: Option<u64>,
}

impl IRLockCheckResponse {
    pub fn unlocked() -> Self {
        Self {
            is_locked: false,
            lock_reason: None,
            lock_id: None,
        }
    }
}

/// Many lock checks for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRBatchLockCheckRequest {
    /// User for checks that do not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<IRId>,

    #[serde(default)]
    pub checks: Vec<IRLockCheckRequest>,
}

/// One batch result, echoing the check it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRBatchLockCheckResult {
    pub field_type: String,

    pub department_objective_id: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,

    #[serde(flatten)]
    pub response: IRLockCheckResponse,
}

/// Results in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IRBatchLockCheckResponse {
    pub results: Vec<IRBatchLockCheckResult>,
}

impl IRBatchLockCheckResponse {
    pub fn locked_count(&self) -> usize {
        self.results.iter().filter(|r| r.response.is_locked).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlocked_response_omits_reason() {
        let json = serde_json::to_string(&IRLockCheckResponse::unlocked()).unwrap();
        assert_eq!(json, r#"{"is_locked":false}"#);
    }

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let request: IRLockCheckRequest = serde_json::from_str(
            r#"{"field_type": "target", "department_objective_id": "42", "kpi": "K1"}"#,
        )
        .unwrap();
        assert_eq!(request.department_objective_id, IRId::Text("42".to_string()));
        assert_eq!(request.month, None);

        let request: IRLockCheckRequest = serde_json::from_str(
            r#"{"field_type": "target", "department_objective_id": 42, "kpi": "K1", "user_id": 8}"#,
        )
        .unwrap();
        assert_eq!(request.department_objective_id, IRId::Number(42));
        assert_eq!(request.user_id, Some(IRId::Number(8)));
    }

    #[test]
    fn test_batch_result_is_flat() {
        let result = IRBatchLockCheckResult {
            field_type: "monthly_actual".to_string(),
            department_objective_id: 42,
            month: Some("2025-03".to_string()),
            response: IRLockCheckResponse {
                is_locked: true,
                lock_reason: Some("locked".to_string()),
                lock_id: Some(11),
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["is_locked"], true);
        assert_eq!(value["lock_id"], 11);
        assert_eq!(value["month"], "2025-03");
    }
}
