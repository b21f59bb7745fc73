//! Lock rule records, normalization, and rule snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::ids::{self, IdList};
use super::scope::Scope;
use crate::config::{extension, AbsentScopePolicy, LegacyRulePolicy, LoadingConfig};
use crate::types::{Dimension, FieldCategory, KpiId, ObjectiveId, RuleId, ScopeKind, UserId};

/// The only scope model the engine evaluates.
const HIERARCHICAL: &str = "hierarchical";

/// Errors that can occur when loading rules.
#[derive(Error, Debug)]
pub enum RuleLoadError {
    #[error("Failed to read rule snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate rule ID: {0}")]
    DuplicateRuleId(RuleId),

    #[error("Rule #{id} uses the unsupported {scope_type:?} scope model")]
    LegacyRule { id: RuleId, scope_type: String },

    #[error("Unsupported rule file format: {0}")]
    UnsupportedFormat(String),

    #[error("Rule snapshot must be a list of rules or a mapping with a `rules` list")]
    InvalidDocument,
}

/// A normalized lock rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRule {
    /// Unique, creation-ordered identifier
    pub id: RuleId,

    /// Users the rule applies to
    pub users: Scope<UserId>,

    /// KPIs the rule applies to
    pub kpis: Scope<KpiId>,

    /// Objectives the rule applies to
    pub objectives: Scope<ObjectiveId>,

    /// Fields the rule locks
    #[serde(default)]
    pub locked_fields: BTreeSet<FieldCategory>,

    /// Inactive rules never participate in evaluation
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// When the rule was created, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl LockRule {
    /// An active rule covering everyone and locking `fields`.
    pub fn new(id: RuleId, fields: impl IntoIterator<Item = FieldCategory>) -> Self {
        Self {
            id,
            users: Scope::All,
            kpis: Scope::All,
            objectives: Scope::All,
            locked_fields: fields.into_iter().collect(),
            is_active: true,
            created_at: None,
        }
    }

    pub fn with_users(mut self, users: Scope<UserId>) -> Self {
        self.users = users;
        self
    }

    pub fn with_kpis(mut self, kpis: Scope<KpiId>) -> Self {
        self.kpis = kpis;
        self
    }

    pub fn with_objectives(mut self, objectives: Scope<ObjectiveId>) -> Self {
        self.objectives = objectives;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Mark the rule inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether the rule locks `field`. No implication between categories.
    pub fn locks(&self, field: FieldCategory) -> bool {
        self.locked_fields.contains(&field)
    }

    /// Scope kinds in (user, KPI, objective) order.
    pub fn scope_kinds(&self) -> [ScopeKind; 3] {
        [self.users.kind(), self.kpis.kind(), self.objectives.kind()]
    }

    /// Sum of per-dimension specificity, 0 to 6.
    pub fn specificity(&self) -> u8 {
        self.scope_kinds().iter().map(ScopeKind::specificity).sum()
    }

    /// Reason fragment, e.g. `specific-users, all-KPIs, all-objectives`.
    pub fn scope_summary(&self) -> String {
        format!(
            "{}, {}, {}",
            self.users.summary(Dimension::User),
            self.kpis.summary(Dimension::Kpi),
            self.objectives.summary(Dimension::Objective)
        )
    }

    /// Administrator listing line, e.g.
    /// `All Users → 2 KPI(s) → All Objectives | Fields: Annual Target, Other Fields`.
    pub fn describe(&self) -> String {
        let fields = if self.locked_fields.is_empty() {
            "none".to_string()
        } else {
            self.locked_fields
                .iter()
                .map(FieldCategory::label)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut line = format!(
            "{} → {} → {} | Fields: {}",
            self.users.describe(Dimension::User),
            self.kpis.describe(Dimension::Kpi),
            self.objectives.describe(Dimension::Objective),
            fields
        );
        if !self.is_active {
            line.push_str(" (inactive)");
        }
        line
    }
}

/// A rule row as the store hands it over, before normalization.
///
/// Every column is kept as a raw value so that one badly typed column
/// narrows its own rule instead of failing the whole snapshot. Scopes may
/// also come in the tagged form `RuleSet` serializes (`users`, `kpis`,
/// `objectives`); when present, that form wins over the flat columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLockRule {
    #[serde(default)]
    pub id: Value,

    #[serde(default, alias = "scopeType")]
    pub scope_type: Value,

    #[serde(default)]
    pub users: Value,

    #[serde(default)]
    pub kpis: Value,

    #[serde(default)]
    pub objectives: Value,

    #[serde(default, alias = "userScope")]
    pub user_scope: Value,

    #[serde(default, alias = "userIds")]
    pub user_ids: Value,

    #[serde(default, alias = "kpiScope")]
    pub kpi_scope: Value,

    #[serde(default, alias = "kpiIds")]
    pub kpi_ids: Value,

    #[serde(default, alias = "objectiveScope")]
    pub objective_scope: Value,

    #[serde(default, alias = "objectiveIds")]
    pub objective_ids: Value,

    #[serde(default, alias = "lockAnnualTarget")]
    pub lock_annual_target: Value,

    #[serde(default, alias = "lockMonthlyTarget")]
    pub lock_monthly_target: Value,

    #[serde(default, alias = "lockMonthlyActual")]
    pub lock_monthly_actual: Value,

    #[serde(default, alias = "lockAllOtherFields")]
    pub lock_all_other_fields: Value,

    #[serde(default, alias = "lockAddObjective")]
    pub lock_add_objective: Value,

    #[serde(default, alias = "lockDeleteObjective")]
    pub lock_delete_objective: Value,

    /// Field names locked in addition to the flags: a list, a JSON-encoded
    /// list or a single name
    #[serde(default, alias = "lockedFields")]
    pub locked_fields: Value,

    #[serde(default, alias = "isActive")]
    pub is_active: Value,

    #[serde(default, alias = "createdAt")]
    pub created_at: Value,
}

impl RawLockRule {
    fn flags(&self) -> [(&'static str, &Value, FieldCategory); 6] {
        [
            ("lock_annual_target", &self.lock_annual_target, FieldCategory::AnnualTarget),
            ("lock_monthly_target", &self.lock_monthly_target, FieldCategory::MonthlyTarget),
            ("lock_monthly_actual", &self.lock_monthly_actual, FieldCategory::MonthlyActual),
            ("lock_all_other_fields", &self.lock_all_other_fields, FieldCategory::OtherFields),
            ("lock_add_objective", &self.lock_add_objective, FieldCategory::AddObjective),
            ("lock_delete_objective", &self.lock_delete_objective, FieldCategory::DeleteObjective),
        ]
    }
}

/// Something the loader had to work around in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum LoadIssue {
    /// The record is not a rule mapping and was skipped
    MalformedRecord { reason: String },

    /// The record has no usable id and was skipped
    MissingRuleId { value: String },

    /// The record uses the flat lock model and was skipped
    LegacyRule { scope_type: String },

    /// Unrecognized scope name, read as `none`
    UnknownScope { dimension: Dimension, value: String },

    /// `specific` without an id collection, read as `none`
    MissingIds { dimension: Dimension },

    /// `specific` with an id collection that is not a list, read as `none`
    UnparseableIds { dimension: Dimension, value: String },

    /// One id entry that could not be read, dropped
    InvalidId { dimension: Dimension, value: String },

    /// Unknown name in `locked_fields`, ignored
    UnknownLockedField { name: String },

    /// `locked_fields` is neither a list nor a name, ignored
    InvalidLockedFields { value: String },

    /// The rule locks nothing
    NoLockedFields,

    /// Unreadable creation time, dropped
    InvalidTimestamp { value: String },

    /// Unreadable flag value, read as `assumed`
    InvalidFlag {
        field: String,
        value: String,
        assumed: bool,
    },
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadIssue::MalformedRecord { reason } => {
                write!(f, "not a rule record ({}); record skipped", reason)
            }
            LoadIssue::MissingRuleId { value } => {
                write!(f, "no usable rule id ({}); record skipped", value)
            }
            LoadIssue::LegacyRule { scope_type } => {
                write!(f, "legacy {:?} scope model; record skipped", scope_type)
            }
            LoadIssue::UnknownScope { dimension, value } => {
                write!(f, "unknown {} scope {:?}; treated as none", dimension, value)
            }
            LoadIssue::MissingIds { dimension } => {
                write!(f, "specific {} scope has no ids; treated as none", dimension)
            }
            LoadIssue::UnparseableIds { dimension, value } => {
                write!(f, "{} ids {:?} are not a list; treated as none", dimension, value)
            }
            LoadIssue::InvalidId { dimension, value } => {
                write!(f, "invalid {} id {:?} dropped", dimension, value)
            }
            LoadIssue::UnknownLockedField { name } => {
                write!(f, "unknown locked field {:?} ignored", name)
            }
            LoadIssue::InvalidLockedFields { value } => {
                write!(f, "locked_fields {:?} is not a list of names; ignored", value)
            }
            LoadIssue::NoLockedFields => write!(f, "rule locks no fields"),
            LoadIssue::InvalidTimestamp { value } => {
                write!(f, "invalid created_at {:?} ignored", value)
            }
            LoadIssue::InvalidFlag {
                field,
                value,
                assumed,
            } => {
                write!(f, "invalid {} value {:?}; treated as {}", field, value, assumed)
            }
        }
    }
}

/// A load issue tied to the record it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    /// Position of the record in the snapshot document
    pub index: usize,

    /// The record's rule id, when it had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,

    #[serde(flatten)]
    pub issue: LoadIssue,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule_id {
            Some(id) => write!(f, "record {} (rule #{}): {}", self.index, id, self.issue),
            None => write!(f, "record {}: {}", self.index, self.issue),
        }
    }
}

/// Records of a snapshot document: a bare list or a `rules:` mapping.
///
/// Other keys of the mapping (such as the `warnings` a serialized
/// `RuleSet` carries) are ignored.
fn snapshot_records(document: Value) -> Result<Vec<Value>, RuleLoadError> {
    match document {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("rules") {
            Some(Value::Array(records)) => Ok(records),
            _ => Err(RuleLoadError::InvalidDocument),
        },
        _ => Err(RuleLoadError::InvalidDocument),
    }
}

/// Stand-in for a missing column.
static NULL: Value = Value::Null;

/// Pick the scope name and id columns for one dimension.
///
/// The tagged form (`{kind: specific, ids: [...]}`) wins over the flat
/// `*_scope` / `*_ids` columns. A tagged value that is not a mapping is
/// read as the scope name itself.
fn scope_columns<'v>(
    tagged: &'v Value,
    scope: &'v Value,
    id_list: &'v Value,
) -> (&'v Value, &'v Value) {
    match tagged {
        Value::Null => (scope, id_list),
        Value::Object(map) => (
            map.get("kind").unwrap_or(&NULL),
            map.get("ids").unwrap_or(&NULL),
        ),
        other => (other, id_list),
    }
}

/// Per-record normalization state.
struct Normalizer<'a> {
    index: usize,
    rule_id: Option<RuleId>,
    config: &'a LoadingConfig,
    warnings: &'a mut Vec<LoadWarning>,
}

impl Normalizer<'_> {
    fn warn(&mut self, issue: LoadIssue) {
        self.warnings.push(LoadWarning {
            index: self.index,
            rule_id: self.rule_id,
            issue,
        });
    }

    /// Normalize one record. `Ok(None)` means the record was skipped.
    fn normalize(&mut self, raw: &RawLockRule) -> Result<Option<LockRule>, RuleLoadError> {
        let Some(id) = ids::coerce_u64(&raw.id) else {
            self.warn(LoadIssue::MissingRuleId {
                value: ids::display_value(&raw.id),
            });
            return Ok(None);
        };
        self.rule_id = Some(id);

        let scope_type = match &raw.scope_type {
            Value::Null => None,
            Value::String(text) => {
                let text = text.trim();
                (!text.is_empty() && !text.eq_ignore_ascii_case(HIERARCHICAL))
                    .then(|| text.to_string())
            }
            other => Some(ids::display_value(other)),
        };
        if let Some(scope_type) = scope_type {
            return match self.config.legacy_rules {
                LegacyRulePolicy::Reject => Err(RuleLoadError::LegacyRule { id, scope_type }),
                LegacyRulePolicy::Skip => {
                    self.warn(LoadIssue::LegacyRule { scope_type });
                    Ok(None)
                }
            };
        }

        let (scope, id_list) = scope_columns(&raw.users, &raw.user_scope, &raw.user_ids);
        let users = self.scope(Dimension::User, scope, id_list, ids::coerce_u64);
        let (scope, id_list) = scope_columns(&raw.kpis, &raw.kpi_scope, &raw.kpi_ids);
        let kpis = self.scope(Dimension::Kpi, scope, id_list, ids::coerce_kpi);
        let (scope, id_list) =
            scope_columns(&raw.objectives, &raw.objective_scope, &raw.objective_ids);
        let objectives = self.scope(Dimension::Objective, scope, id_list, ids::coerce_u64);

        let locked_fields = self.locked_fields(raw);
        if locked_fields.is_empty() {
            self.warn(LoadIssue::NoLockedFields);
        }

        // An unreadable activity flag keeps the rule in force
        let is_active = match &raw.is_active {
            Value::Null => true,
            value => self.flag("is_active", value, true),
        };

        let created_at = match &raw.created_at {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            value => {
                let parsed = value.as_str().and_then(ids::parse_timestamp);
                if parsed.is_none() {
                    self.warn(LoadIssue::InvalidTimestamp {
                        value: ids::display_value(value),
                    });
                }
                parsed
            }
        };

        Ok(Some(LockRule {
            id,
            users,
            kpis,
            objectives,
            locked_fields,
            is_active,
            created_at,
        }))
    }

    fn scope<T: Ord>(
        &mut self,
        dimension: Dimension,
        scope: &Value,
        raw_ids: &Value,
        coerce: fn(&Value) -> Option<T>,
    ) -> Scope<T> {
        let absent = match self.config.absent_scope {
            AbsentScopePolicy::MatchAll => ScopeKind::All,
            AbsentScopePolicy::MatchNothing => ScopeKind::None,
        };
        let kind = match scope {
            Value::Null => absent,
            Value::String(text) if text.trim().is_empty() => absent,
            value => match value.as_str().and_then(ids::parse_scope_kind) {
                Some(kind) => kind,
                None => {
                    self.warn(LoadIssue::UnknownScope {
                        dimension,
                        value: ids::display_value(value).trim().to_string(),
                    });
                    ScopeKind::None
                }
            },
        };

        match kind {
            ScopeKind::All => Scope::All,
            ScopeKind::None => Scope::None,
            ScopeKind::Specific => match ids::id_entries(raw_ids) {
                IdList::Missing => {
                    self.warn(LoadIssue::MissingIds { dimension });
                    Scope::None
                }
                IdList::Unparseable(value) => {
                    self.warn(LoadIssue::UnparseableIds { dimension, value });
                    Scope::None
                }
                IdList::Entries(entries) => {
                    let mut set = BTreeSet::new();
                    for entry in &entries {
                        match coerce(entry) {
                            Some(id) => {
                                set.insert(id);
                            }
                            None => self.warn(LoadIssue::InvalidId {
                                dimension,
                                value: ids::display_value(entry),
                            }),
                        }
                    }
                    Scope::Specific { ids: set }
                }
            },
        }
    }

    fn locked_fields(&mut self, raw: &RawLockRule) -> BTreeSet<FieldCategory> {
        let mut fields = BTreeSet::new();
        for (name, value, field) in raw.flags() {
            if self.flag(name, value, false) {
                fields.insert(field);
            }
        }

        let names = match ids::id_entries(&raw.locked_fields) {
            IdList::Missing => Vec::new(),
            IdList::Entries(names) => names,
            // A bare name such as `annual_target`
            IdList::Unparseable(_) if raw.locked_fields.is_string() => {
                vec![raw.locked_fields.clone()]
            }
            IdList::Unparseable(value) => {
                self.warn(LoadIssue::InvalidLockedFields { value });
                Vec::new()
            }
        };
        for name in &names {
            match name.as_str().map(str::parse::<FieldCategory>) {
                Some(Ok(field)) => {
                    fields.insert(field);
                }
                _ => self.warn(LoadIssue::UnknownLockedField {
                    name: ids::display_value(name),
                }),
            }
        }
        fields
    }

    /// Read a flag, falling back to `assumed` with a warning.
    fn flag(&mut self, name: &str, value: &Value, assumed: bool) -> bool {
        match ids::parse_flag(value) {
            Some(flag) => flag,
            None => {
                self.warn(LoadIssue::InvalidFlag {
                    field: name.to_string(),
                    value: ids::display_value(value),
                    assumed,
                });
                assumed
            }
        }
    }
}

/// An immutable snapshot of lock rules, sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    rules: Vec<LockRule>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<LoadWarning>,
}

impl RuleSet {
    /// Build a snapshot from typed rules. Rule ids must be unique.
    pub fn new(rules: impl IntoIterator<Item = LockRule>) -> Result<Self, RuleLoadError> {
        let mut rules: Vec<LockRule> = rules.into_iter().collect();
        rules.sort_by_key(|r| r.id);
        if let Some(pair) = rules.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(RuleLoadError::DuplicateRuleId(pair[0].id));
        }
        Ok(Self {
            rules,
            warnings: Vec::new(),
        })
    }

    /// Normalize raw store records into a snapshot.
    pub fn from_records(
        records: &[RawLockRule],
        config: &LoadingConfig,
    ) -> Result<Self, RuleLoadError> {
        Self::normalize_all(records.iter().map(Some), Vec::new(), config)
    }

    /// Normalize untyped records. Records that are not rule mappings are
    /// skipped with a warning.
    fn from_values(values: Vec<Value>, config: &LoadingConfig) -> Result<Self, RuleLoadError> {
        let mut warnings = Vec::new();
        let records: Vec<Option<RawLockRule>> = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let rule_id = value.get("id").and_then(ids::coerce_u64);
                match serde_json::from_value::<RawLockRule>(value) {
                    Ok(raw) => Some(raw),
                    Err(err) => {
                        warnings.push(LoadWarning {
                            index,
                            rule_id,
                            issue: LoadIssue::MalformedRecord {
                                reason: err.to_string(),
                            },
                        });
                        None
                    }
                }
            })
            .collect();
        Self::normalize_all(records.iter().map(Option::as_ref), warnings, config)
    }

    fn normalize_all<'r>(
        records: impl Iterator<Item = Option<&'r RawLockRule>>,
        mut warnings: Vec<LoadWarning>,
        config: &LoadingConfig,
    ) -> Result<Self, RuleLoadError> {
        let mut rules = Vec::new();
        let mut total = 0;

        for (index, raw) in records.enumerate() {
            total += 1;
            let Some(raw) = raw else {
                continue;
            };
            let mut normalizer = Normalizer {
                index,
                rule_id: None,
                config,
                warnings: &mut warnings,
            };
            if let Some(rule) = normalizer.normalize(raw)? {
                rules.push(rule);
            }
        }
        // Stable, so issues of one record keep their order
        warnings.sort_by_key(|w| w.index);

        for warning in &warnings {
            tracing::warn!(
                index = warning.index,
                rule_id = ?warning.rule_id,
                "{}",
                warning.issue
            );
        }

        let mut set = Self::new(rules)?;
        tracing::debug!(
            rules = set.rules.len(),
            skipped = total - set.rules.len(),
            warnings = warnings.len(),
            "Loaded lock rule snapshot"
        );
        set.warnings = warnings;
        Ok(set)
    }

    /// Parse a snapshot from a JSON string with default loading rules.
    pub fn from_json(json: &str) -> Result<Self, RuleLoadError> {
        Self::from_json_with(json, &LoadingConfig::default())
    }

    /// Parse a snapshot from a JSON string.
    pub fn from_json_with(json: &str, config: &LoadingConfig) -> Result<Self, RuleLoadError> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_values(snapshot_records(document)?, config)
    }

    /// Parse a snapshot from a YAML string with default loading rules.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuleLoadError> {
        Self::from_yaml_with(yaml, &LoadingConfig::default())
    }

    /// Parse a snapshot from a YAML string.
    pub fn from_yaml_with(yaml: &str, config: &LoadingConfig) -> Result<Self, RuleLoadError> {
        let document: Value = serde_yaml::from_str(yaml)?;
        Self::from_values(snapshot_records(document)?, config)
    }

    /// Load a snapshot from a `.yaml`, `.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>, config: &LoadingConfig) -> Result<Self, RuleLoadError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match extension(path).as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_with(&contents, config),
            Some("json") => Self::from_json_with(&contents, config),
            _ => Err(RuleLoadError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// All rules, sorted by id.
    pub fn rules(&self) -> &[LockRule] {
        &self.rules
    }

    /// Rules that participate in evaluation.
    pub fn active(&self) -> impl Iterator<Item = &LockRule> {
        self.rules.iter().filter(|r| r.is_active)
    }

    pub fn get(&self, id: RuleId) -> Option<&LockRule> {
        self.rules
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| &self.rules[i])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Issues found while normalizing the records this snapshot came from.
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }
}
