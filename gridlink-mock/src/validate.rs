//! Schema-driven validation of create/update payloads.
//!
//! Every field is checked and every violation is recorded before failing, so
//! one error carries the complete list of offending fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use gridlink_model::{
    EntityRef, EntitySchema, FieldDataType, FieldSpec, GridResult, ValidationReport,
};
use serde_json::{Map, Value};

/// Validates each field against its declared type.
///
/// `null` values are always accepted. Fields missing from the schema are not
/// rejected here; their names are returned so the caller can warn about them.
pub fn validate_fields(
    schema: &EntitySchema,
    entity_type: &str,
    data: &Map<String, Value>,
) -> GridResult<Vec<String>> {
    let mut report = ValidationReport::new(entity_type);
    let mut unknown = Vec::new();

    for (field, value) in data {
        let Some(spec) = schema.field(entity_type, field) else {
            unknown.push(field.clone());
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Err(message) = check_value(entity_type, field, spec, value) {
            report.push(field.as_str(), message);
        }
    }

    report.into_result()?;
    Ok(unknown)
}

fn check_value(
    entity_type: &str,
    field: &str,
    spec: &FieldSpec,
    value: &Value,
) -> Result<(), String> {
    match &spec.data_type {
        FieldDataType::Entity => check_entity(entity_type, field, spec, value),
        FieldDataType::MultiEntity => check_multi_entity(entity_type, field, spec, value),
        simple => check_simple(entity_type, field, simple, value),
    }
}

fn check_entity(
    entity_type: &str,
    field: &str,
    spec: &FieldSpec,
    value: &Value,
) -> Result<(), String> {
    if !value.is_object() {
        return Err(format!(
            "{entity_type}.{field} is of type entity, but data {value} is not an object"
        ));
    }
    let link = EntityRef::from_value(value).ok_or_else(|| {
        format!("{entity_type}.{field} is of type entity, but data {value} does not contain type and id")
    })?;
    if !spec.valid_types.contains(&link.entity_type) {
        return Err(format!(
            "{entity_type}.{field} is of type entity, but data {value} has invalid type (expected one of {:?})",
            spec.valid_types
        ));
    }
    Ok(())
}

fn check_multi_entity(
    entity_type: &str,
    field: &str,
    spec: &FieldSpec,
    value: &Value,
) -> Result<(), String> {
    // A bare link counts as a one-element list.
    let items = match value {
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };

    for item in items {
        let Some(link) = EntityRef::from_value(item) else {
            return Err(format!(
                "{entity_type}.{field} is of type multi_entity, but item {item} does not contain type and id"
            ));
        };
        if !spec.valid_types.contains(&link.entity_type) {
            return Err(format!(
                "{entity_type}.{field} is of type multi_entity, but item {item} has invalid type (expected one of {:?})",
                spec.valid_types
            ));
        }
    }
    Ok(())
}

fn check_simple(
    entity_type: &str,
    field: &str,
    data_type: &FieldDataType,
    value: &Value,
) -> Result<(), String> {
    let (ok, expected) = match data_type {
        FieldDataType::Text
        | FieldDataType::StatusList
        | FieldDataType::List
        | FieldDataType::Color => (value.is_string(), "a string"),
        FieldDataType::Number | FieldDataType::Percent | FieldDataType::Duration => {
            (value.is_i64() || value.is_u64(), "an integer")
        }
        FieldDataType::Float => (value.is_number(), "a number"),
        FieldDataType::Checkbox => (value.is_boolean(), "a boolean"),
        FieldDataType::Date => (value.as_str().is_some_and(is_date), "a YYYY-MM-DD date string"),
        FieldDataType::DateTime => (
            value.as_str().is_some_and(is_date_time),
            "an ISO-8601 date-time string",
        ),
        FieldDataType::Url => (value.is_object(), "an object"),
        // Reads return image URLs as strings, uploads use attachment objects.
        FieldDataType::Image => (value.is_object() || value.is_string(), "an object or URL string"),
        FieldDataType::TagList => (value.is_array(), "a list"),
        FieldDataType::Entity | FieldDataType::MultiEntity => (true, ""),
        FieldDataType::Other(name) => {
            return Err(format!(
                "{entity_type}.{field}: handling for data type {name} is not implemented"
            ));
        }
    };

    if ok {
        Ok(())
    } else {
        Err(format!(
            "{entity_type}.{field} is of type {data_type}, but data {value} is not {expected}"
        ))
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
}
