//! Property-based tests for the emulated store.
//!
//! - Ids are allocated 1..k per type, in creation order, and never reused
//! - `[f, "is", r[f]]` always finds `r`; `[f, "is_not", r[f]]` never does

use gridlink_mock::MockHandle;
use gridlink_model::{EntityHandle, EntitySchema, FieldSpec, Filter, FindQuery};
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::sync::Arc;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn handle() -> MockHandle {
    let schema = EntitySchema::new()
        .with_field("Shot", "code", FieldSpec::text())
        .with_field("Shot", "sg_cut_in", FieldSpec::number())
        .with_field("Asset", "code", FieldSpec::text());
    MockHandle::new(Arc::new(schema))
}

fn code_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_]{1,12}").unwrap()
}

fn record_strategy() -> impl Strategy<Value = (String, i64)> {
    (code_strategy(), -10_000i64..10_000)
}

fn fields(code: &str, cut_in: i64) -> Map<String, Value> {
    json!({"code": code, "sg_cut_in": cut_in})
        .as_object()
        .cloned()
        .unwrap()
}

// =============================================================================
// ID ALLOCATION
// =============================================================================

proptest! {
    #[test]
    fn ids_are_one_to_k_in_creation_order(records in prop::collection::vec(record_strategy(), 1..40)) {
        let h = handle();
        let ids: Vec<i64> = records
            .iter()
            .map(|(code, cut_in)| h.create("Shot", &fields(code, *cut_in)).unwrap().id)
            .collect();
        let expected: Vec<i64> = (1..=records.len() as i64).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn deleted_ids_are_never_reused(
        count in 1usize..20,
        deletions in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let h = handle();
        for i in 0..count {
            h.create("Shot", &fields("x", i as i64)).unwrap();
        }
        for index in deletions {
            let id = index.index(count) as i64 + 1;
            h.delete("Shot", id).unwrap();
        }
        let next = h.create("Shot", &Map::new()).unwrap().id;
        prop_assert_eq!(next, count as i64 + 1);
    }

    #[test]
    fn types_allocate_independently(shots in 0usize..10, assets in 0usize..10) {
        let h = handle();
        for _ in 0..shots {
            h.create("Shot", &Map::new()).unwrap();
        }
        for _ in 0..assets {
            h.create("Asset", &Map::new()).unwrap();
        }
        prop_assert_eq!(h.create("Shot", &Map::new()).unwrap().id, shots as i64 + 1);
        prop_assert_eq!(h.create("Asset", &Map::new()).unwrap().id, assets as i64 + 1);
    }
}

// =============================================================================
// FILTER ROUND-TRIP
// =============================================================================

proptest! {
    #[test]
    fn is_finds_and_is_not_excludes(
        records in prop::collection::vec(record_strategy(), 1..20),
        pick in any::<prop::sample::Index>(),
        field in prop::sample::select(vec!["code", "sg_cut_in", "id"]),
    ) {
        let h = handle();
        let created: Vec<_> = records
            .iter()
            .map(|(code, cut_in)| h.create("Shot", &fields(code, *cut_in)).unwrap())
            .collect();
        let target = &created[pick.index(created.len())];
        let value = target.get(field).into_owned();

        let query = FindQuery::new(vec![Filter::is(field, value.clone())]);
        let found = h.find("Shot", &query).unwrap();
        prop_assert!(found.iter().any(|e| e.id == target.id));

        let query = FindQuery::new(vec![Filter::is_not(field, value)]);
        let excluded = h.find("Shot", &query).unwrap();
        prop_assert!(excluded.iter().all(|e| e.id != target.id));
    }
}
