use gridlink_mock::{MockFactory, SchemaSource};
use gridlink_model::{
    EntityHandle, EntitySchema, FieldSpec, FindQuery, GridError, HandleFactory, SchemaPaths,
};
use serde_json::{Map, json};
use std::sync::Arc;

fn write_schema(dir: &std::path::Path) {
    let schema = EntitySchema::new()
        .with_field("Shot", "code", FieldSpec::text())
        .with_entity_type("Project");
    std::fs::write(dir.join("schema.json"), schema.to_schema_value().to_string()).unwrap();
    std::fs::write(dir.join("schema_entity.json"), schema.to_entity_value().to_string()).unwrap();
}

// ── Fresh stores ─────────────────────────────────────────────────

#[test]
fn each_client_gets_an_empty_store() {
    let factory = MockFactory::from_schema(EntitySchema::new().with_entity_type("Shot"));
    let first = factory.create_client().unwrap();
    first.create("Shot", &Map::new()).unwrap();

    let second = factory.create_client().unwrap();
    assert!(second.find("Shot", &FindQuery::all()).unwrap().is_empty());
    assert_eq!(second.create("Shot", &Map::new()).unwrap().id, 1);
}

#[test]
fn loaded_schema_is_shared() {
    let schema = Arc::new(EntitySchema::new().with_entity_type("Shot"));
    let factory = MockFactory::new(SchemaSource::Loaded(Arc::clone(&schema)));
    let handle = factory.create_mock().unwrap();
    assert!(std::ptr::eq(handle.schema(), schema.as_ref()));
}

// ── Schema files ─────────────────────────────────────────────────

#[test]
fn reads_schema_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());

    let factory = MockFactory::from_paths(SchemaPaths::in_dir(dir.path()));
    let handle = factory.create_client().unwrap();
    let created = handle
        .create("Shot", json!({"code": "sh010"}).as_object().unwrap())
        .unwrap();
    assert_eq!(created.get_str("code"), Some("sh010"));
    assert!(handle.create("Project", &Map::new()).is_ok());
}

#[test]
fn missing_schema_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockFactory::from_paths(SchemaPaths::in_dir(dir.path()));
    let err = factory.create_client().err().unwrap();
    assert!(matches!(err, GridError::SchemaUnavailable(_)));
}

#[test]
fn schema_is_read_per_client() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockFactory::from_paths(SchemaPaths::in_dir(dir.path()));
    assert!(factory.create_client().is_err());

    write_schema(dir.path());
    assert!(factory.create_client().is_ok());
}
