//! Coercion of loosely typed record values.
//!
//! Rule rows come from a store that keeps id lists as JSON text, flags as
//! `0/1` and timestamps without a zone. These helpers turn those values into
//! typed ones and report what they could not read, leaving the decision of
//! what to do about it to the normalizer.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::types::ScopeKind;

/// Timestamp layouts accepted besides RFC 3339. Interpreted as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// Outcome of reading an id collection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IdList {
    /// Null, absent or blank
    Missing,

    /// Present but not a list, carrying the offending text
    Unparseable(String),

    /// The raw entries, not yet coerced
    Entries(Vec<Value>),
}

/// Read an id collection that is either a list or a JSON-encoded list.
///
/// ```ignore
/// id_entries(&json!("[8, 9]"));   // Entries([8, 9])
/// id_entries(&json!([8, 9]));     // Entries([8, 9])
/// id_entries(&json!(null));       // Missing
/// ```
pub(crate) fn id_entries(value: &Value) -> IdList {
    match value {
        Value::Null => IdList::Missing,
        Value::Array(items) => IdList::Entries(items.clone()),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() || text.eq_ignore_ascii_case("null") {
                return IdList::Missing;
            }
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Array(items)) => IdList::Entries(items),
                _ => IdList::Unparseable(text.to_string()),
            }
        }
        other => IdList::Unparseable(other.to_string()),
    }
}

/// Coerce a numeric id from a JSON number, an integral float or a numeric string.
pub(crate) fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral_u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_u64))
        }
        _ => None,
    }
}

fn integral_u64(f: f64) -> Option<u64> {
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

/// Coerce a KPI id. KPI codes are opaque strings, but YAML may hand us numbers.
pub(crate) fn coerce_kpi(value: &Value) -> Option<String> {
    let kpi = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!kpi.is_empty()).then_some(kpi)
}

/// Read a boolean-ish flag. `None` means the value is present but unreadable.
pub(crate) fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Null => Some(false),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Some(false),
            Some(f) if f == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a scope name such as `"all"` or `"Specific"`.
pub(crate) fn parse_scope_kind(text: &str) -> Option<ScopeKind> {
    match text.trim().to_ascii_lowercase().as_str() {
        "all" => Some(ScopeKind::All),
        "specific" => Some(ScopeKind::Specific),
        "none" => Some(ScopeKind::None),
        _ => None,
    }
}

/// Parse a creation timestamp.
pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// Render a raw value for a warning message.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_id_entries_accepts_json_text() {
        assert_eq!(
            id_entries(&json!("[8, \"9\"]")),
            IdList::Entries(vec![json!(8), json!("9")])
        );
        assert_eq!(id_entries(&json!([1, 2])), IdList::Entries(vec![json!(1), json!(2)]));
    }

    #[test]
    fn test_id_entries_missing_and_unparseable() {
        assert_eq!(id_entries(&Value::Null), IdList::Missing);
        assert_eq!(id_entries(&json!("  ")), IdList::Missing);
        assert_eq!(id_entries(&json!("null")), IdList::Missing);
        assert_eq!(
            id_entries(&json!("[8, 9")),
            IdList::Unparseable("[8, 9".to_string())
        );
        assert_eq!(id_entries(&json!(7)), IdList::Unparseable("7".to_string()));
    }

    #[test]
    fn test_coerce_u64() {
        assert_eq!(coerce_u64(&json!(42)), Some(42));
        assert_eq!(coerce_u64(&json!(42.0)), Some(42));
        assert_eq!(coerce_u64(&json!(" 42 ")), Some(42));
        assert_eq!(coerce_u64(&json!(42.5)), None);
        assert_eq!(coerce_u64(&json!(-1)), None);
        assert_eq!(coerce_u64(&json!("abc")), None);
        assert_eq!(coerce_u64(&json!(true)), None);
    }

    #[test]
    fn test_coerce_kpi() {
        assert_eq!(coerce_kpi(&json!(" K1 ")), Some("K1".to_string()));
        assert_eq!(coerce_kpi(&json!(101)), Some("101".to_string()));
        assert_eq!(coerce_kpi(&json!("")), None);
        assert_eq!(coerce_kpi(&Value::Null), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(&json!(true)), Some(true));
        assert_eq!(parse_flag(&json!(1)), Some(true));
        assert_eq!(parse_flag(&json!(0)), Some(false));
        assert_eq!(parse_flag(&json!("TRUE")), Some(true));
        assert_eq!(parse_flag(&Value::Null), Some(false));
        assert_eq!(parse_flag(&json!(2)), None);
        assert_eq!(parse_flag(&json!("maybe")), None);
    }

    #[test]
    fn test_parse_flag_integral_floats() {
        assert_eq!(parse_flag(&json!(1.0)), Some(true));
        assert_eq!(parse_flag(&json!(0.0)), Some(false));
        assert_eq!(parse_flag(&json!(0.5)), None);
    }

    #[test]
    fn test_parse_scope_kind() {
        assert_eq!(parse_scope_kind("ALL"), Some(ScopeKind::All));
        assert_eq!(parse_scope_kind(" specific "), Some(ScopeKind::Specific));
        assert_eq!(parse_scope_kind("none"), Some(ScopeKind::None));
        assert_eq!(parse_scope_kind("some"), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2025-01-15T08:30:00Z").unwrap();
        assert_eq!((rfc.year(), rfc.month(), rfc.day(), rfc.hour()), (2025, 1, 15, 8));

        let offset = parse_timestamp("2025-01-15T10:30:00+02:00").unwrap();
        assert_eq!(offset, rfc);

        let sql = parse_timestamp("2025-01-15 08:30:00.123").unwrap();
        assert_eq!(sql.minute(), 30);

        let plain = parse_timestamp("2025-01-15 08:30:00").unwrap();
        assert_eq!(plain, rfc);

        assert!(parse_timestamp("yesterday").is_none());
    }
}
