use gridlink_mock::query::{compare, matches, matches_all, sort_entities, values_equal};
use gridlink_model::{Entity, Filter, FilterOperator, LogicalOperator, SortKey};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::cmp::Ordering;

fn shot(id: i64, fields: Value) -> Entity {
    Entity::new("Shot", id, fields.as_object().cloned().unwrap_or_default())
}

fn sample() -> Entity {
    shot(
        7,
        json!({
            "code": "SH010_comp",
            "sg_cut_in": 1001,
            "sg_status_list": "ip",
            "project": {"type": "Project", "id": 1, "name": "Demo"},
            "tags": [{"type": "Tag", "id": 3, "name": "hero"}, {"type": "Tag", "id": 4, "name": "fx"}],
            "task_template": null
        }),
    )
}

fn check(field: &str, op: &str, value: Value) -> bool {
    matches(&sample(), &Filter::new(field, FilterOperator::from(op.to_string()), value))
}

// ── Equality ─────────────────────────────────────────────────────

#[test]
fn is_and_is_not() {
    assert!(check("sg_status_list", "is", json!("ip")));
    assert!(!check("sg_status_list", "is", json!("fin")));
    assert!(check("sg_status_list", "is_not", json!("fin")));
    assert!(check("id", "is", json!(7)));
    assert!(check("type", "is", json!("Shot")));
}

#[test]
fn missing_field_reads_as_null() {
    assert!(check("description", "is", Value::Null));
    assert!(check("task_template", "is", Value::Null));
    assert!(!check("description", "is", json!("")));
}

#[test]
fn links_compare_by_type_and_id() {
    assert!(check("project", "is", json!({"type": "Project", "id": 1})));
    assert!(!check("project", "is", json!({"type": "Asset", "id": 1})));
    assert!(values_equal(
        &json!({"type": "Tag", "id": 3, "name": "hero"}),
        &json!({"id": 3, "type": "Tag"})
    ));
}

#[test]
fn in_and_not_in() {
    assert!(check("sg_status_list", "in", json!(["wtg", "ip"])));
    assert!(check("sg_status_list", "not_in", json!(["wtg", "fin"])));
    assert!(check("id", "in", json!([1, 7])));
}

// ── Text and lists ───────────────────────────────────────────────

#[test]
fn contains_is_case_insensitive_on_text() {
    assert!(check("code", "contains", json!("comp")));
    assert!(check("code", "contains", json!("sh010")));
    assert!(check("code", "not_contains", json!("light")));
}

#[test]
fn contains_on_multi_entity() {
    assert!(check("tags", "contains", json!({"type": "Tag", "id": 4})));
    assert!(!check("tags", "contains", json!({"type": "Tag", "id": 5})));
}

#[test]
fn prefix_and_suffix() {
    assert!(check("code", "starts_with", json!("SH0")));
    assert!(check("code", "ends_with", json!("_COMP")));
    assert!(!check("sg_cut_in", "starts_with", json!("1")));
}

// ── Ranges ───────────────────────────────────────────────────────

#[test]
fn less_and_greater() {
    assert!(check("sg_cut_in", "greater_than", json!(1000)));
    assert!(check("sg_cut_in", "less_than", json!(1001.5)));
    assert!(!check("sg_cut_in", "less_than", json!(1001)));
    // Incomparable kinds never match either way.
    assert!(!check("sg_cut_in", "less_than", json!("2000")));
    assert!(!check("sg_cut_in", "greater_than", json!("2000")));
}

#[test]
fn between_is_inclusive() {
    assert!(check("sg_cut_in", "between", json!([1001, 1100])));
    assert!(!check("sg_cut_in", "between", json!([1002, 1100])));
    assert!(check("sg_cut_in", "not_between", json!([1, 10])));
    assert!(!check("sg_cut_in", "between", json!([1001])));
    assert!(!check("sg_cut_in", "not_between", json!([1001])));
}

#[test]
fn large_integers_compare_exactly() {
    let record = shot(1, json!({"n": 9_007_199_254_740_993_i64}));
    let is = |value: Value| matches(&record, &Filter::is("n", value));
    assert!(is(json!(9_007_199_254_740_993_i64)));
    assert!(!is(json!(9_007_199_254_740_992_i64)));
    assert!(!matches(
        &record,
        &Filter::new("n", FilterOperator::GreaterThan, json!(9_007_199_254_740_993_i64))
    ));

    assert_eq!(
        compare(&json!(9_007_199_254_740_993_i64), &json!(9_007_199_254_740_992_i64)),
        Some(Ordering::Greater)
    );
    assert_eq!(compare(&json!(u64::MAX), &json!(-1)), Some(Ordering::Greater));
    assert_eq!(compare(&json!(-1), &json!(u64::MAX)), Some(Ordering::Less));
    assert!(!values_equal(&json!(u64::MAX), &json!(u64::MAX - 1)));
    assert!(values_equal(&json!(3), &json!(3.0)));
}

#[test]
fn large_integers_sort_exactly() {
    let mut records = vec![
        shot(1, json!({"n": 9_007_199_254_740_993_i64})),
        shot(2, json!({"n": 9_007_199_254_740_992_i64})),
    ];
    sort_entities(&mut records, &[SortKey::asc("n")]);
    assert_eq!(records.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 1]);
}

// ── Link helpers ─────────────────────────────────────────────────

#[test]
fn type_and_name_operators() {
    assert!(check("project", "type_is", json!("Project")));
    assert!(check("project", "type_is_not", json!("Asset")));
    assert!(check("project", "name_is", json!("Demo")));
    assert!(check("tags", "name_contains", json!("HER")));
    assert!(check("tags", "name_not_contains", json!("lighting")));
}

// ── Unsupported operators ────────────────────────────────────────

#[test]
fn unsupported_operators_never_match() {
    assert!(!check("created_at", "in_last", json!([1, "DAY"])));
    assert!(!check("code", "fuzzy", json!("SH010")));
}

// ── Combining ────────────────────────────────────────────────────

#[test]
fn empty_filter_list_matches() {
    assert!(matches_all(&sample(), &[], LogicalOperator::And));
    assert!(matches_all(&sample(), &[], LogicalOperator::Or));
}

#[test]
fn and_or_semantics() {
    let filters = vec![Filter::is("sg_status_list", "ip"), Filter::is("code", "nope")];
    assert!(!matches_all(&sample(), &filters, LogicalOperator::And));
    assert!(matches_all(&sample(), &filters, LogicalOperator::Or));
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn compare_only_orders_like_kinds() {
    assert_eq!(compare(&json!(1), &json!(2.5)), Some(Ordering::Less));
    assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
    assert_eq!(compare(&json!(1), &json!("1")), None);
    assert_eq!(compare(&Value::Null, &json!(1)), None);
}

#[test]
fn multi_key_sort_is_stable() {
    let mut records = vec![
        shot(1, json!({"code": "c", "dur": 1})),
        shot(2, json!({"code": "a", "dur": 2})),
        shot(3, json!({"code": "a", "dur": 1})),
        shot(4, json!({"code": "a", "dur": 2})),
    ];
    sort_entities(&mut records, &[SortKey::asc("code"), SortKey::desc("dur")]);
    let ids: Vec<i64> = records.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![2, 4, 3, 1]);
}

#[test]
fn nulls_sort_first_ascending_and_last_descending() {
    let mut records = vec![
        shot(1, json!({"dur": 5})),
        shot(2, json!({})),
        shot(3, json!({"dur": 1})),
    ];
    sort_entities(&mut records, &[SortKey::asc("dur")]);
    assert_eq!(records.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3, 1]);

    sort_entities(&mut records, &[SortKey::desc("dur")]);
    assert_eq!(records.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3, 2]);
}
