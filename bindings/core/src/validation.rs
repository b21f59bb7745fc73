//! Validation fixtures for callers of the lock-check API.
//!
//! A rule snapshot in the store's row format and a batch request against it,
//! with the expected outcomes. All semantic validation is done by
//! `fieldlock_core`; these fixtures only check that data survives the trip
//! through the IR layer.

/// Rule rows as exported from the store: JSON-encoded id lists, `0/1` flags.
pub const TEST_RULES_JSON: &str = r#"[
  {
    "id": 3, "scope_type": "hierarchical",
    "user_scope": "all", "user_ids": null,
    "kpi_scope": "specific", "kpi_ids": "[\"K1\"]",
    "objective_scope": "specific", "objective_ids": "[42]",
    "lock_annual_target": 1, "lock_monthly_target": 0, "lock_monthly_actual": 0,
    "lock_all_other_fields": 0, "lock_add_objective": 0, "lock_delete_objective": 0,
    "is_active": 1, "created_at": "2025-01-10 08:00:00"
  },
  {
    "id": 5, "scope_type": "hierarchical",
    "user_scope": "all", "kpi_scope": "all", "objective_scope": "all",
    "lock_all_other_fields": 1, "is_active": 1
  },
  {
    "id": 7, "scope_type": "hierarchical",
    "user_scope": "specific", "user_ids": "[\"8\"]",
    "kpi_scope": "specific", "kpi_ids": "[\"K1\"]",
    "objective_scope": "specific", "objective_ids": "[42]",
    "lock_annual_target": 1, "is_active": 1
  },
  {
    "id": 11, "scope_type": "hierarchical",
    "user_scope": "specific", "user_ids": "[8]",
    "kpi_scope": "all", "objective_scope": "all",
    "lock_monthly_actual": 1, "is_active": 1
  },
  {
    "id": 12, "scope_type": "hierarchical",
    "user_scope": "all", "kpi_scope": "all", "objective_scope": "all",
    "lock_delete_objective": 1, "is_active": 0
  }
]"#;

/// Batch request for user 8 against `TEST_RULES_JSON`.
pub const TEST_BATCH_REQUEST_JSON: &str = r#"{
  "user_id": "8",
  "checks": [
    {"field_type": "monthly_actual", "department_objective_id": 42, "kpi": "K1", "month": "2025-03"},
    {"field_type": "target", "department_objective_id": "42", "kpi": "K1"},
    {"field_type": "target", "department_objective_id": 42, "kpi": "K1", "user_id": 9},
    {"field_type": "all_fields", "department_objective_id": 43, "kpi": "K2"},
    {"field_type": "delete_objective", "department_objective_id": 42, "kpi": "K1"},
    {"field_type": "monthly_actual", "department_objective_id": 42, "kpi": "K1", "user_id": 9}
  ]
}"#;

/// Expected `lock_id` per check in `TEST_BATCH_REQUEST_JSON` (`None` = unlocked).
pub const EXPECTED_BATCH_LOCK_IDS: &[Option<u64>] = &[Some(11), Some(7), Some(3), Some(5), None, None];

/// Expected reason for the first check.
pub const EXPECTED_MONTHLY_ACTUAL_REASON: &str =
    "locked by rule #11: specific-users, all-KPIs, all-objectives, locks MonthlyActual.";
