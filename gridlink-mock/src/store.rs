//! Per-type in-memory record tables.
//!
//! Each entity type is its own shard behind its own mutex, so id allocation
//! and record mutation for one type never contend with another type. The
//! shard map itself is behind a read-write lock and is only write-locked the
//! first time a type is seen.

use gridlink_model::Entity;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

/// Records of one entity type.
#[derive(Debug, Default)]
struct EntityTable {
    /// Last id handed out. Ids start at 1 and are never reused.
    last_id: i64,
    live: BTreeMap<i64, Entity>,
    retired: BTreeMap<i64, Entity>,
}

/// Authoritative state behind an emulated handle.
#[derive(Debug, Default)]
pub struct EntityStore {
    tables: RwLock<HashMap<String, Arc<Mutex<EntityTable>>>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with empty tables for the given types.
    pub fn with_types<'a>(types: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write().unwrap();
            for entity_type in types {
                tables.entry(entity_type.to_string()).or_default();
            }
        }
        store
    }

    fn table(&self, entity_type: &str) -> Option<Arc<Mutex<EntityTable>>> {
        self.tables.read().unwrap().get(entity_type).cloned()
    }

    fn table_or_create(&self, entity_type: &str) -> Arc<Mutex<EntityTable>> {
        if let Some(table) = self.table(entity_type) {
            return table;
        }
        let mut tables = self.tables.write().unwrap();
        Arc::clone(tables.entry(entity_type.to_string()).or_default())
    }

    /// Allocates the next id for `entity_type` and stores the record.
    pub fn insert(&self, entity_type: &str, fields: Map<String, Value>) -> Entity {
        let table = self.table_or_create(entity_type);
        let mut table = table.lock().unwrap();
        table.last_id += 1;
        let entity = Entity::new(entity_type, table.last_id, fields);
        table.live.insert(entity.id, entity.clone());
        entity
    }

    /// A live record by id.
    pub fn get(&self, entity_type: &str, id: i64) -> Option<Entity> {
        let table = self.table(entity_type)?;
        let table = table.lock().unwrap();
        table.live.get(&id).cloned()
    }

    /// Merges `fields` into a live record. `None` when the record is absent.
    pub fn update(
        &self,
        entity_type: &str,
        id: i64,
        fields: &Map<String, Value>,
    ) -> Option<Entity> {
        let table = self.table(entity_type)?;
        let mut table = table.lock().unwrap();
        let entity = table.live.get_mut(&id)?;
        entity.merge(fields);
        Some(entity.clone())
    }

    /// Moves a live record to the retired set.
    pub fn retire(&self, entity_type: &str, id: i64) -> bool {
        let Some(table) = self.table(entity_type) else {
            return false;
        };
        let mut table = table.lock().unwrap();
        match table.live.remove(&id) {
            Some(entity) => {
                table.retired.insert(id, entity);
                true
            }
            None => false,
        }
    }

    /// Moves a retired record back to the live set.
    pub fn revive(&self, entity_type: &str, id: i64) -> bool {
        let Some(table) = self.table(entity_type) else {
            return false;
        };
        let mut table = table.lock().unwrap();
        match table.retired.remove(&id) {
            Some(entity) => {
                table.live.insert(id, entity);
                true
            }
            None => false,
        }
    }

    /// Copies of every live (or retired) record of a type, in id order.
    pub fn snapshot(&self, entity_type: &str, retired: bool) -> Vec<Entity> {
        let Some(table) = self.table(entity_type) else {
            return Vec::new();
        };
        let table = table.lock().unwrap();
        let source = if retired { &table.retired } else { &table.live };
        source.values().cloned().collect()
    }

    /// Number of live records of a type.
    pub fn count(&self, entity_type: &str) -> usize {
        self.table(entity_type)
            .map(|t| t.lock().unwrap().live.len())
            .unwrap_or(0)
    }

    /// Entity types that have a table.
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.tables.read().unwrap().keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn ids_are_per_type() {
        let store = EntityStore::new();
        assert_eq!(store.insert("Shot", Map::new()).id, 1);
        assert_eq!(store.insert("Asset", Map::new()).id, 1);
        assert_eq!(store.insert("Shot", Map::new()).id, 2);
    }

    #[test]
    fn retired_ids_are_not_reused() {
        let store = EntityStore::new();
        store.insert("Shot", data(json!({"code": "a"})));
        store.insert("Shot", data(json!({"code": "b"})));
        assert!(store.retire("Shot", 2));
        assert_eq!(store.insert("Shot", Map::new()).id, 3);
    }

    #[test]
    fn revive_restores_record() {
        let store = EntityStore::new();
        store.insert("Shot", data(json!({"code": "a"})));
        assert!(store.retire("Shot", 1));
        assert!(store.get("Shot", 1).is_none());
        assert_eq!(store.snapshot("Shot", true).len(), 1);
        assert!(store.revive("Shot", 1));
        assert_eq!(store.get("Shot", 1).unwrap().get_str("code"), Some("a"));
        assert!(!store.revive("Shot", 1));
    }

    #[test]
    fn unknown_type_reads_empty() {
        let store = EntityStore::with_types(["Shot"]);
        assert!(store.snapshot("Nope", false).is_empty());
        assert_eq!(store.count("Nope"), 0);
        assert!(!store.retire("Nope", 1));
        assert_eq!(store.entity_types(), vec!["Shot".to_string()]);
    }
}
