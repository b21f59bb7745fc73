//! Field Resolver: does a matched rule lock the requested field?

use crate::rules::LockRule;
use crate::types::FieldCategory;

/// Set membership on the rule's locked fields.
///
/// `OtherFields` is its own category. A rule locking only `OtherFields`
/// does not lock `AnnualTarget`, `MonthlyTarget` or `MonthlyActual`.
pub fn locks_field(rule: &LockRule, field: FieldCategory) -> bool {
    rule.locks(field)
}
