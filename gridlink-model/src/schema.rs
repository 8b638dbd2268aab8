use crate::error::{GridError, GridResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Describes every entity type's fields, loaded once and read-only afterwards.
///
/// Two blobs back a schema, matching what the remote service returns from
/// `schema_read` (per-field) and `schema_entity_read` (per-type metadata).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySchema {
    fields: BTreeMap<String, BTreeMap<String, FieldSpec>>,
    entities: BTreeMap<String, Value>,
}

impl EntitySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an entity type with no fields yet.
    pub fn with_entity_type(mut self, entity_type: &str) -> Self {
        self.fields.entry(entity_type.to_string()).or_default();
        self.entities
            .entry(entity_type.to_string())
            .or_insert_with(|| serde_json::json!({ "name": { "value": entity_type } }));
        self
    }

    /// Declares one field, creating the entity type if needed.
    pub fn with_field(mut self, entity_type: &str, field: &str, spec: FieldSpec) -> Self {
        self = self.with_entity_type(entity_type);
        if let Some(fields) = self.fields.get_mut(entity_type) {
            fields.insert(field.to_string(), spec);
        }
        self
    }

    /// Builds a schema from the two wire-shaped blobs.
    pub fn from_values(schema: Value, schema_entity: Value) -> GridResult<Self> {
        let fields: BTreeMap<String, BTreeMap<String, FieldSpec>> = serde_json::from_value(schema)
            .map_err(|e| GridError::SchemaUnavailable(format!("malformed field schema: {e}")))?;
        let entities = match schema_entity {
            Value::Null => BTreeMap::new(),
            Value::Object(map) => map.into_iter().collect(),
            other => {
                return Err(GridError::SchemaUnavailable(format!(
                    "entity schema must be an object, got {other}"
                )));
            }
        };
        Ok(Self { fields, entities })
    }

    /// Reads both schema blobs from disk.
    pub fn load(paths: &SchemaPaths) -> GridResult<Self> {
        let schema = read_json(&paths.schema)?;
        let schema_entity = read_json(&paths.schema_entity)?;
        Self::from_values(schema, schema_entity)
    }

    /// Declared entity types: field-schema types first, then metadata-only types.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.fields
            .keys()
            .chain(self.entities.keys().filter(|k| !self.fields.contains_key(*k)))
            .map(String::as_str)
    }

    pub fn has_entity_type(&self, entity_type: &str) -> bool {
        self.fields.contains_key(entity_type) || self.entities.contains_key(entity_type)
    }

    /// Field specs for one entity type.
    pub fn fields(&self, entity_type: &str) -> Option<&BTreeMap<String, FieldSpec>> {
        self.fields.get(entity_type)
    }

    pub fn field(&self, entity_type: &str, field: &str) -> Option<&FieldSpec> {
        self.fields.get(entity_type)?.get(field)
    }

    /// The whole per-field schema in wire shape.
    pub fn to_schema_value(&self) -> Value {
        serde_json::to_value(&self.fields).unwrap_or(Value::Null)
    }

    /// The per-type metadata blob.
    pub fn to_entity_value(&self) -> Value {
        Value::Object(self.entities.clone().into_iter().collect::<Map<_, _>>())
    }

    /// Wire-shaped field schema for one type, optionally narrowed to one field.
    pub fn field_schema_value(&self, entity_type: &str, field: Option<&str>) -> GridResult<Value> {
        let fields = self
            .fields
            .get(entity_type)
            .ok_or_else(|| GridError::UnknownEntityType(entity_type.to_string()))?;
        let selected: BTreeMap<&String, &FieldSpec> = match field {
            Some(name) => fields.iter().filter(|(k, _)| k.as_str() == name).collect(),
            None => fields.iter().collect(),
        };
        Ok(serde_json::to_value(selected)?)
    }
}

fn read_json(path: &Path) -> GridResult<Value> {
    let bytes = std::fs::read(path)
        .map_err(|e| GridError::SchemaUnavailable(format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| GridError::SchemaUnavailable(format!("{}: {e}", path.display())))
}

/// Locations of the two schema blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPaths {
    pub schema: PathBuf,
    pub schema_entity: PathBuf,
}

impl SchemaPaths {
    pub fn new(schema: impl Into<PathBuf>, schema_entity: impl Into<PathBuf>) -> Self {
        Self {
            schema: schema.into(),
            schema_entity: schema_entity.into(),
        }
    }

    /// `schema.json` and `schema_entity.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("schema.json"), dir.join("schema_entity.json"))
    }
}

/// One field's declared type and link targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFieldSpec", into = "RawFieldSpec")]
pub struct FieldSpec {
    pub data_type: FieldDataType,
    /// Entity types an `entity`/`multi_entity` field may point at.
    pub valid_types: Vec<String>,
    pub default_value: Value,
}

impl FieldSpec {
    pub fn of(data_type: FieldDataType) -> Self {
        Self {
            data_type,
            valid_types: Vec::new(),
            default_value: Value::Null,
        }
    }

    /// Shorthand for a text field.
    pub fn text() -> Self {
        Self::of(FieldDataType::Text)
    }

    /// Shorthand for an integer field.
    pub fn number() -> Self {
        Self::of(FieldDataType::Number)
    }

    /// Shorthand for a status list field.
    pub fn status_list() -> Self {
        Self::of(FieldDataType::StatusList)
    }

    /// Shorthand for a single link field.
    pub fn entity(valid_types: &[&str]) -> Self {
        Self {
            valid_types: valid_types.iter().map(|s| s.to_string()).collect(),
            ..Self::of(FieldDataType::Entity)
        }
    }

    /// Shorthand for a multi-link field.
    pub fn multi_entity(valid_types: &[&str]) -> Self {
        Self {
            valid_types: valid_types.iter().map(|s| s.to_string()).collect(),
            ..Self::of(FieldDataType::MultiEntity)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }
}

/// The data type of a schema field.
///
/// Names outside the known set are kept verbatim in `Other` so a schema from a
/// newer service still loads; validation rejects writes to such fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldDataType {
    Text,
    Number,
    Float,
    Checkbox,
    Date,
    DateTime,
    Percent,
    Duration,
    Url,
    Image,
    StatusList,
    List,
    Color,
    TagList,
    Entity,
    MultiEntity,
    Other(String),
}

impl FieldDataType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Float => "float",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::DateTime => "date_time",
            Self::Percent => "percent",
            Self::Duration => "duration",
            Self::Url => "url",
            Self::Image => "image",
            Self::StatusList => "status_list",
            Self::List => "list",
            Self::Color => "color",
            Self::TagList => "tag_list",
            Self::Entity => "entity",
            Self::MultiEntity => "multi_entity",
            Self::Other(name) => name,
        }
    }

    /// True for `entity` and `multi_entity`.
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Entity | Self::MultiEntity)
    }
}

impl From<String> for FieldDataType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "text" => Self::Text,
            "number" => Self::Number,
            "float" => Self::Float,
            "checkbox" => Self::Checkbox,
            "date" => Self::Date,
            "date_time" => Self::DateTime,
            "percent" => Self::Percent,
            "duration" => Self::Duration,
            "url" => Self::Url,
            "image" => Self::Image,
            "status_list" => Self::StatusList,
            "list" => Self::List,
            "color" => Self::Color,
            "tag_list" => Self::TagList,
            "entity" => Self::Entity,
            "multi_entity" => Self::MultiEntity,
            _ => Self::Other(name),
        }
    }
}

impl From<FieldDataType> for String {
    fn from(data_type: FieldDataType) -> Self {
        data_type.as_str().to_string()
    }
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Wire shape: every attribute is wrapped as `{"value": ...}`.

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Wrapped<T> {
    value: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<Wrapped<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    valid_types: Option<Wrapped<Vec<String>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFieldSpec {
    data_type: Wrapped<FieldDataType>,
    #[serde(default)]
    properties: RawProperties,
}

impl From<RawFieldSpec> for FieldSpec {
    fn from(raw: RawFieldSpec) -> Self {
        Self {
            data_type: raw.data_type.value,
            valid_types: raw.properties.valid_types.map(|w| w.value).unwrap_or_default(),
            default_value: raw
                .properties
                .default_value
                .map(|w| w.value)
                .unwrap_or(Value::Null),
        }
    }
}

impl From<FieldSpec> for RawFieldSpec {
    fn from(spec: FieldSpec) -> Self {
        Self {
            data_type: Wrapped {
                value: spec.data_type,
            },
            properties: RawProperties {
                default_value: Some(Wrapped {
                    value: spec.default_value,
                }),
                valid_types: Some(Wrapped {
                    value: spec.valid_types,
                }),
            },
        }
    }
}
