//! Filter evaluation and ordering over in-memory records.
//!
//! These are plain functions over [`Entity`] values; they hold no state and
//! never fail. An operator the evaluator does not implement is a non-match.

use gridlink_model::{Entity, EntityRef, Filter, FilterOperator, LogicalOperator, SortKey};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use tracing::debug;

/// True when `entity` satisfies `filters` combined with `op`.
///
/// An empty filter list always matches.
pub fn matches_all(entity: &Entity, filters: &[Filter], op: LogicalOperator) -> bool {
    if filters.is_empty() {
        return true;
    }
    match op {
        LogicalOperator::And => filters.iter().all(|f| matches(entity, f)),
        LogicalOperator::Or => filters.iter().any(|f| matches(entity, f)),
    }
}

/// True when `entity` satisfies a single filter. Missing fields read as `null`.
pub fn matches(entity: &Entity, filter: &Filter) -> bool {
    let field_value = entity.get(&filter.field);
    let actual: &Value = &field_value;
    let expected = &filter.value;

    match &filter.operator {
        FilterOperator::Is => values_equal(actual, expected),
        FilterOperator::IsNot => !values_equal(actual, expected),
        FilterOperator::In => list_contains(expected, actual),
        FilterOperator::NotIn => !list_contains(expected, actual),
        FilterOperator::Contains => contains(actual, expected),
        FilterOperator::NotContains => !contains(actual, expected),
        FilterOperator::StartsWith => string_test(actual, expected, |a, e| a.starts_with(e)),
        FilterOperator::EndsWith => string_test(actual, expected, |a, e| a.ends_with(e)),
        FilterOperator::LessThan => compare(actual, expected) == Some(Ordering::Less),
        FilterOperator::GreaterThan => compare(actual, expected) == Some(Ordering::Greater),
        FilterOperator::Between => between(actual, expected).unwrap_or(false),
        FilterOperator::NotBetween => between(actual, expected).map(|b| !b).unwrap_or(false),
        FilterOperator::TypeIs => type_is(actual, expected),
        FilterOperator::TypeIsNot => !type_is(actual, expected),
        FilterOperator::NameIs => link_names(actual)
            .iter()
            .any(|name| Some(*name) == expected.as_str()),
        FilterOperator::NameContains => link_names(actual)
            .iter()
            .any(|name| text_contains(name, expected)),
        FilterOperator::NameNotContains => !link_names(actual)
            .iter()
            .any(|name| text_contains(name, expected)),
        FilterOperator::Other(name) => {
            debug!(
                operator = %name,
                field = %filter.field,
                "operator not emulated, treating as non-match"
            );
            false
        }
    }
}

/// Equality as the service sees it: links compare by `(type, id)`, numbers by value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(ra), Some(rb)) = (EntityRef::from_value(a), EntityRef::from_value(b)) {
        return ra == rb;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn list_contains(list: &Value, needle: &Value) -> bool {
    match list {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        single => values_equal(single, needle),
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(_) => text_contains_value(actual, expected),
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

fn text_contains_value(actual: &Value, expected: &Value) -> bool {
    actual
        .as_str()
        .map(|a| text_contains(a, expected))
        .unwrap_or(false)
}

// Text matching is case-insensitive, like the service.
fn text_contains(haystack: &str, needle: &Value) -> bool {
    needle
        .as_str()
        .map(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
        .unwrap_or(false)
}

fn string_test(actual: &Value, expected: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    match (actual.as_str(), expected.as_str()) {
        (Some(a), Some(e)) => test(&a.to_lowercase(), &e.to_lowercase()),
        _ => false,
    }
}

fn between(actual: &Value, range: &Value) -> Option<bool> {
    let bounds = range.as_array().filter(|b| b.len() == 2)?;
    let low = compare(actual, &bounds[0])?;
    let high = compare(actual, &bounds[1])?;
    Some(low != Ordering::Less && high != Ordering::Greater)
}

fn type_is(actual: &Value, expected: &Value) -> bool {
    match EntityRef::from_value(actual) {
        Some(link) => expected.as_str() == Some(link.entity_type.as_str()),
        None => actual.is_null() && expected.is_null(),
    }
}

fn link_names(value: &Value) -> Vec<&str> {
    match value {
        Value::Object(_) => value.get("name").and_then(Value::as_str).into_iter().collect(),
        Value::Array(items) => items.iter().filter_map(|item| item.get("name")?.as_str()).collect(),
        _ => Vec::new(),
    }
}

/// Ordering for range operators. `None` when the two values are not comparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// Integers compare exactly; only a float on either side goes through f64.
fn number_cmp(x: &Number, y: &Number) -> Option<Ordering> {
    match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
        (Some(a), Some(b), _, _) => Some(a.cmp(&b)),
        (_, _, Some(a), Some(b)) => Some(a.cmp(&b)),
        // Exactly one side is above i64::MAX.
        (Some(_), None, _, Some(_)) => Some(Ordering::Less),
        (None, Some(_), Some(_), _) => Some(Ordering::Greater),
        _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: `null` first, then by kind, then by value.
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    let by_kind = kind_rank(a).cmp(&kind_rank(b));
    if by_kind != Ordering::Equal {
        return by_kind;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y).unwrap_or_else(|| {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }),
        (Value::Array(xs), Value::Array(ys)) => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| sort_order(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| xs.len().cmp(&ys.len())),
        (Value::Object(_), Value::Object(_)) => {
            match (EntityRef::from_value(a), EntityRef::from_value(b)) {
                (Some(ra), Some(rb)) => (ra.entity_type, ra.id).cmp(&(rb.entity_type, rb.id)),
                _ => a.to_string().cmp(&b.to_string()),
            }
        }
        _ => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Orders records by successive stable passes, last key first.
///
/// The first key therefore has primary precedence and later keys break ties.
/// Descending passes keep equal records in their prior relative order.
pub fn sort_entities(entities: &mut [Entity], order: &[SortKey]) {
    for key in order.iter().rev() {
        entities.sort_by(|a, b| {
            let ord = sort_order(&a.get(&key.field), &b.get(&key.field));
            if key.descending { ord.reverse() } else { ord }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_and_float_compare_equal() {
        assert!(values_equal(&json!(1), &json!(1.0)));
    }

    #[test]
    fn null_sorts_before_everything() {
        assert_eq!(sort_order(&Value::Null, &json!(0)), Ordering::Less);
        assert_eq!(sort_order(&json!("a"), &Value::Null), Ordering::Greater);
    }

    #[test]
    fn link_names_from_multi_entity() {
        let v = json!([{"type": "Tag", "id": 1, "name": "hero"}, {"type": "Tag", "id": 2}]);
        assert_eq!(link_names(&v), vec!["hero"]);
    }
}
