//! Filter expressions and query options for `find`.
//!
//! A filter is the three-element array `[field, operator, value]`. Filters are
//! combined with a [`LogicalOperator`]; results are ordered by [`SortKey`]s and
//! truncated by an optional limit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Relative-time operators the remote service understands but the in-memory
/// evaluator does not emulate.
pub const RELATIVE_TIME_OPERATORS: [&str; 8] = [
    "in_last",
    "not_in_last",
    "in_next",
    "not_in_next",
    "in_calendar_day",
    "in_calendar_week",
    "in_calendar_month",
    "in_calendar_year",
];

const TIME_UNITS: [&str; 4] = ["DAY", "WEEK", "MONTH", "YEAR"];

/// A single `[field, operator, value]` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, FilterOperator, Value)", into = "(String, FilterOperator, Value)")]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn is(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Is, value)
    }

    pub fn is_not(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::IsNot, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Contains, value)
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOperator::In, Value::Array(values))
    }
}

impl From<(String, FilterOperator, Value)> for Filter {
    fn from((field, operator, value): (String, FilterOperator, Value)) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }
}

impl From<Filter> for (String, FilterOperator, Value) {
    fn from(filter: Filter) -> Self {
        (filter.field, filter.operator, filter.value)
    }
}

/// Comparison applied by a filter.
///
/// Unrecognized names deserialize into `Other` and never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    Is,
    IsNot,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    LessThan,
    GreaterThan,
    Between,
    NotBetween,
    TypeIs,
    TypeIsNot,
    NameIs,
    NameContains,
    NameNotContains,
    Other(String),
}

impl FilterOperator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::LessThan => "less_than",
            Self::GreaterThan => "greater_than",
            Self::Between => "between",
            Self::NotBetween => "not_between",
            Self::TypeIs => "type_is",
            Self::TypeIsNot => "type_is_not",
            Self::NameIs => "name_is",
            Self::NameContains => "name_contains",
            Self::NameNotContains => "name_not_contains",
            Self::Other(name) => name,
        }
    }

    /// Whether the remote service accepts this operator at all.
    pub fn is_known(&self) -> bool {
        match self {
            Self::Other(name) => RELATIVE_TIME_OPERATORS.contains(&name.as_str()),
            _ => true,
        }
    }
}

impl From<String> for FilterOperator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "is" => Self::Is,
            "is_not" => Self::IsNot,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "less_than" => Self::LessThan,
            "greater_than" => Self::GreaterThan,
            "between" => Self::Between,
            "not_between" => Self::NotBetween,
            "type_is" => Self::TypeIs,
            "type_is_not" => Self::TypeIsNot,
            "name_is" => Self::NameIs,
            "name_contains" => Self::NameContains,
            "name_not_contains" => Self::NameNotContains,
            _ => Self::Other(name),
        }
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a filter list is combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    /// Every filter must match. An empty list matches.
    #[default]
    And,
    /// At least one filter must match. An empty list matches.
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// One ordering key; `-field` in string form means descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(spec),
        }
    }
}

impl From<String> for SortKey {
    fn from(spec: String) -> Self {
        Self::parse(&spec)
    }
}

impl From<&str> for SortKey {
    fn from(spec: &str) -> Self {
        Self::parse(spec)
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        if key.descending {
            format!("-{}", key.field)
        } else {
            key.field
        }
    }
}

/// Everything `find` takes besides the entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindQuery {
    pub filters: Vec<Filter>,
    /// Projection. `None` returns full records.
    pub fields: Option<Vec<String>>,
    pub order: Vec<SortKey>,
    pub filter_operator: LogicalOperator,
    /// Values `<= 0` mean no limit.
    pub limit: Option<i64>,
    pub retired_only: bool,
}

impl FindQuery {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// Matches every live record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn order<K: Into<SortKey>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.order = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter_operator(mut self, op: LogicalOperator) -> Self {
        self.filter_operator = op;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn retired_only(mut self, retired_only: bool) -> Self {
        self.retired_only = retired_only;
        self
    }

    /// The effective truncation length, if any.
    pub fn effective_limit(&self) -> Option<usize> {
        match self.limit {
            Some(n) if n > 0 => Some(n as usize),
            _ => None,
        }
    }
}

/// Checks raw filter JSON and returns one message per problem, numbered from 1.
///
/// An empty result means every filter is well formed.
pub fn validate_filters(filters: &[Value]) -> Vec<String> {
    let mut errors = Vec::new();

    for (i, item) in filters.iter().enumerate() {
        let n = i + 1;
        let parts = match item.as_array() {
            Some(parts) if parts.len() == 3 => parts,
            _ => {
                errors.push(format!(
                    "Filter {n} must be a list with exactly 3 elements [field, operator, value]"
                ));
                continue;
            }
        };
        let (field, operator, value) = (&parts[0], &parts[1], &parts[2]);

        if !field.is_string() {
            errors.push(format!("Filter {n}: field must be a string, got {field}"));
        }

        let op = operator
            .as_str()
            .map(|s| FilterOperator::from(s.to_string()));
        match &op {
            Some(op) if op.is_known() => {}
            _ => {
                errors.push(format!("Filter {n}: invalid operator {operator}"));
                continue;
            }
        }

        let op_name = op.as_ref().map(|o| o.as_str()).unwrap_or_default();
        if matches!(op_name, "in_last" | "not_in_last" | "in_next" | "not_in_next") {
            match value {
                Value::String(_) => {}
                Value::Array(pair) if pair.len() == 2 => {
                    if !pair[0].is_i64() || !pair[1].is_string() {
                        errors.push(format!(
                            "Filter {n}: time filter value must be [number, 'UNIT'] or 'number unit'"
                        ));
                    }
                    if let Some(unit) = pair[1].as_str() {
                        if !TIME_UNITS.contains(&unit) {
                            errors.push(format!(
                                "Filter {n}: invalid time unit '{unit}', expected one of {}",
                                TIME_UNITS.join(", ")
                            ));
                        }
                    }
                }
                _ => errors.push(format!(
                    "Filter {n}: time filter value must be [number, 'UNIT'] or 'number unit'"
                )),
            }
        }

        if matches!(op_name, "between" | "not_between")
            && !matches!(value, Value::Array(pair) if pair.len() == 2)
        {
            errors.push(format!(
                "Filter {n}: between filter value must be a list with exactly 2 elements [min, max]"
            ));
        }
    }

    errors
}
