use gridlink_cli::{Command, execute, parse_filters, run, select_factory};
use gridlink_model::{EntitySchema, FieldSpec, FilterOperator};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;

fn write_schema(dir: &Path) {
    let schema = EntitySchema::new()
        .with_field("Shot", "code", FieldSpec::text())
        .with_field("Shot", "sg_cut_duration", FieldSpec::number())
        .with_entity_type("Project");
    std::fs::write(dir.join("schema.json"), schema.to_schema_value().to_string()).unwrap();
    std::fs::write(dir.join("schema_entity.json"), schema.to_entity_value().to_string()).unwrap();
}

fn create(code: &str, duration: i64) -> Command {
    Command::Create {
        entity_type: "Shot".into(),
        data: json!({"code": code, "sg_cut_duration": duration}).to_string(),
    }
}

fn find(filters: Option<&str>, order: &[&str], limit: i64) -> Command {
    Command::Find {
        entity_type: "Shot".into(),
        filters: filters.map(str::to_string),
        fields: vec!["code".into()],
        order: order.iter().map(|s| s.to_string()).collect(),
        any: false,
        limit,
        retired: false,
    }
}

// ── Factory selection ────────────────────────────────────────────

#[test]
fn schema_dir_selects_emulation() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());

    let factory = select_factory(Some(dir.path())).unwrap();
    let created = run(factory.as_ref(), &create("sh010", 24)).unwrap();
    assert_eq!(
        created,
        json!({"type": "Shot", "id": 1, "code": "sh010", "sg_cut_duration": 24})
    );
}

#[test]
fn missing_schema_files_fail_on_client_creation() {
    let dir = tempfile::tempdir().unwrap();
    let factory = select_factory(Some(dir.path())).unwrap();
    let err = run(factory.as_ref(), &Command::Ping).unwrap_err();
    assert!(format!("{err:#}").contains("schema.json"));
}

// ── Commands ─────────────────────────────────────────────────────

#[test]
fn create_then_find_on_one_client() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let factory = select_factory(Some(dir.path())).unwrap();
    let client = factory.create_client().unwrap();

    execute(client.as_ref(), &create("b", 10)).unwrap();
    execute(client.as_ref(), &create("a", 20)).unwrap();
    execute(client.as_ref(), &create("c", 30)).unwrap();

    let found = execute(
        client.as_ref(),
        &find(Some(r#"[["sg_cut_duration", "greater_than", 15]]"#), &["-code"], 0),
    )
    .unwrap();
    assert_eq!(
        found,
        json!([
            {"type": "Shot", "id": 3, "code": "c"},
            {"type": "Shot", "id": 2, "code": "a"}
        ])
    );

    let first = execute(client.as_ref(), &find(None, &["code"], 1)).unwrap();
    assert_eq!(first, json!([{"type": "Shot", "id": 2, "code": "a"}]));
}

#[test]
fn find_without_fields_returns_full_records() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let client = select_factory(Some(dir.path()))
        .unwrap()
        .create_client()
        .unwrap();
    execute(client.as_ref(), &create("sh010", 24)).unwrap();

    let command = Command::Find {
        entity_type: "Shot".into(),
        filters: None,
        fields: Vec::new(),
        order: Vec::new(),
        any: false,
        limit: 0,
        retired: false,
    };
    assert_eq!(
        execute(client.as_ref(), &command).unwrap(),
        json!([{"type": "Shot", "id": 1, "code": "sh010", "sg_cut_duration": 24}])
    );
}

#[test]
fn update_delete_and_revive() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let client = select_factory(Some(dir.path()))
        .unwrap()
        .create_client()
        .unwrap();
    execute(client.as_ref(), &create("a", 1)).unwrap();

    let updated = execute(
        client.as_ref(),
        &Command::Update {
            entity_type: "Shot".into(),
            id: 1,
            data: r#"{"code": "z"}"#.into(),
        },
    )
    .unwrap();
    assert_eq!(updated["code"], json!("z"));

    let deleted = execute(
        client.as_ref(),
        &Command::Delete {
            entity_type: "Shot".into(),
            id: 1,
        },
    )
    .unwrap();
    assert_eq!(deleted, json!({"type": "Shot", "id": 1, "deleted": true}));
    assert_eq!(execute(client.as_ref(), &find(None, &[], 0)).unwrap(), json!([]));

    let revived = execute(
        client.as_ref(),
        &Command::Revive {
            entity_type: "Shot".into(),
            id: 1,
        },
    )
    .unwrap();
    assert_eq!(revived["revived"], json!(true));
    assert_eq!(
        execute(client.as_ref(), &find(None, &[], 0)).unwrap(),
        json!([{"type": "Shot", "id": 1, "code": "z"}])
    );
}

#[test]
fn batch_runs_requests_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let client = select_factory(Some(dir.path()))
        .unwrap()
        .create_client()
        .unwrap();

    let requests = json!([
        {"request_type": "create", "entity_type": "Shot", "data": {"code": "a"}},
        {"request_type": "update", "entity_type": "Shot", "entity_id": 1, "data": {"code": "b"}},
        {"request_type": "delete", "entity_type": "Shot", "entity_id": 1}
    ]);
    let outcomes = execute(
        client.as_ref(),
        &Command::Batch {
            requests: requests.to_string(),
        },
    )
    .unwrap();
    assert_eq!(
        outcomes,
        json!([
            {"type": "Shot", "id": 1, "code": "a"},
            {"type": "Shot", "id": 1, "code": "b"},
            true
        ])
    );
}

#[test]
fn schema_and_ping() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let factory = select_factory(Some(dir.path())).unwrap();

    let field = run(
        factory.as_ref(),
        &Command::Schema {
            entity_type: Some("Shot".into()),
            field: Some("code".into()),
        },
    )
    .unwrap();
    assert_eq!(field["code"]["data_type"]["value"], json!("text"));

    let whole = run(
        factory.as_ref(),
        &Command::Schema {
            entity_type: None,
            field: None,
        },
    )
    .unwrap();
    assert!(whole.get("Shot").is_some());

    let pong = run(factory.as_ref(), &Command::Ping).unwrap();
    assert_eq!(pong, json!({"ok": true, "entity_types": 2}));
}

// ── Input errors ─────────────────────────────────────────────────

#[test]
fn malformed_filters_list_every_problem() {
    let err = parse_filters(r#"[["code", "is"], ["code", "sounds_like", "x"]]"#).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Filter 1"));
    assert!(msg.contains("Filter 2"));
}

#[test]
fn filters_must_be_an_array() {
    assert!(parse_filters(r#"{"code": "a"}"#).is_err());
    assert!(parse_filters("not json").is_err());
}

#[test]
fn well_formed_filters_parse() {
    let filters = parse_filters(r#"[["code", "starts_with", "sh"]]"#).unwrap();
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].operator, FilterOperator::StartsWith);
}

#[test]
fn create_rejects_non_object_data() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let factory = select_factory(Some(dir.path())).unwrap();
    let err = run(
        factory.as_ref(),
        &Command::Create {
            entity_type: "Shot".into(),
            data: "[1, 2]".into(),
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("JSON object"));
}
