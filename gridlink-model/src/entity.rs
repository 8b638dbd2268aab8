use crate::error::{GridError, GridResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;

/// Field names the store assigns itself; callers may not write them.
pub const RESERVED_FIELDS: [&str; 2] = ["id", "type"];

/// Rejects a create/update payload that tries to set `id` or `type`.
pub fn check_reserved(data: &Map<String, Value>) -> GridResult<()> {
    let reserved: Vec<String> = RESERVED_FIELDS
        .iter()
        .filter(|name| data.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if reserved.is_empty() {
        Ok(())
    } else {
        Err(GridError::ReservedField(reserved))
    }
}

static NULL: Value = Value::Null;

/// A typed, identified record as returned by every handle.
///
/// Serializes to the flat wire shape `{"type": .., "id": .., <fields>}`.
/// `type` and `id` never live inside `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Builds a record, dropping any reserved keys that leaked into `fields`.
    pub fn new(entity_type: impl Into<String>, id: i64, mut fields: Map<String, Value>) -> Self {
        for key in RESERVED_FIELDS {
            fields.remove(key);
        }
        Self {
            entity_type: entity_type.into(),
            id,
            fields,
        }
    }

    /// Looks up a field by name, treating `id` and `type` as ordinary fields.
    ///
    /// Missing fields read as `null`, which is how filters and sorting see them.
    pub fn get(&self, field: &str) -> Cow<'_, Value> {
        match field {
            "id" => Cow::Owned(Value::from(self.id)),
            "type" => Cow::Owned(Value::String(self.entity_type.clone())),
            _ => Cow::Borrowed(self.fields.get(field).unwrap_or(&NULL)),
        }
    }

    /// Extract a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }

    /// Returns a `{type, id}` reference to this record.
    pub fn to_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.id)
    }

    /// Keeps only the named fields. Names absent from the record come back as `null`.
    pub fn project(&self, fields: &[String]) -> Entity {
        let mut projected = Map::new();
        for name in fields {
            if RESERVED_FIELDS.contains(&name.as_str()) {
                continue;
            }
            projected.insert(name.clone(), self.get(name).into_owned());
        }
        Entity {
            entity_type: self.entity_type.clone(),
            id: self.id,
            fields: projected,
        }
    }

    /// Shallow merge: provided fields overwrite, absent fields are untouched.
    pub fn merge(&mut self, fields: &Map<String, Value>) {
        for (key, value) in fields {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Converts into the flat JSON object representation.
    pub fn into_value(self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 2);
        map.insert("type".into(), Value::String(self.entity_type));
        map.insert("id".into(), Value::from(self.id));
        map.extend(self.fields);
        Value::Object(map)
    }
}

/// A structured link to another record: `{"type": .., "id": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: i64,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }

    /// Reads a reference out of any JSON object carrying string `type` and integer `id`.
    ///
    /// Extra keys (a full record, `name`, ...) are ignored.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let entity_type = obj.get("type")?.as_str()?;
        let id = obj.get("id")?.as_i64()?;
        Some(Self::new(entity_type, id))
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "type": self.entity_type, "id": self.id })
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        entity.to_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_strips_reserved_keys() {
        let fields = json!({"id": 9, "type": "Asset", "code": "a"});
        let e = Entity::new("Shot", 1, fields.as_object().unwrap().clone());
        assert_eq!(e.entity_type, "Shot");
        assert_eq!(e.id, 1);
        assert!(!e.fields.contains_key("id"));
        assert!(!e.fields.contains_key("type"));
    }
}
