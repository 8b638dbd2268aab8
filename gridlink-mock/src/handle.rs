//! The emulated handle: store + evaluator + schema behind [`EntityHandle`].

use crate::query::{matches_all, sort_entities};
use crate::store::EntityStore;
use crate::validate::validate_fields;
use gridlink_model::{
    Entity, EntityHandle, EntitySchema, FindQuery, GridError, GridResult, check_reserved,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Thumbnail URL returned when a record has an image that is not a URL string.
pub const PLACEHOLDER_THUMBNAIL_URL: &str = "https://example.com/thumbnail.jpg";

/// Base for attachment URLs synthesized from an attachment name.
pub const PLACEHOLDER_ATTACHMENT_BASE: &str = "https://example.com/attachments/";

/// Bytes returned by every emulated download.
pub const MOCK_ATTACHMENT_BYTES: &[u8] = b"Mock attachment data";

/// In-memory handle that mirrors the live service's CRUD, query and
/// validation behaviour.
///
/// The store is owned by the handle and lives exactly as long as it does.
/// All store access is internally locked, so one handle can be shared across
/// threads.
#[derive(Debug)]
pub struct MockHandle {
    schema: Arc<EntitySchema>,
    store: EntityStore,
}

impl MockHandle {
    /// Creates a handle with an empty store bound to `schema`.
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        let store = EntityStore::with_types(schema.entity_types());
        Self { schema, store }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    fn require_type(&self, entity_type: &str) -> GridResult<()> {
        if self.schema.has_entity_type(entity_type) {
            Ok(())
        } else {
            Err(GridError::UnknownEntityType(entity_type.to_string()))
        }
    }

    fn validate(&self, entity_type: &str, data: &Map<String, Value>) -> GridResult<()> {
        let unknown = validate_fields(&self.schema, entity_type, data)?;
        if !unknown.is_empty() {
            warn!(entity_type, fields = ?unknown, "fields not declared in schema");
        }
        Ok(())
    }

    fn field_value(&self, entity_type: &str, id: i64, field: &str) -> GridResult<Value> {
        let entity = self
            .store
            .get(entity_type, id)
            .ok_or_else(|| GridError::not_found(entity_type, id))?;
        Ok(entity.get(field).into_owned())
    }
}

impl EntityHandle for MockHandle {
    fn find(&self, entity_type: &str, query: &FindQuery) -> GridResult<Vec<Entity>> {
        let mut found: Vec<Entity> = self
            .store
            .snapshot(entity_type, query.retired_only)
            .into_iter()
            .filter(|entity| matches_all(entity, &query.filters, query.filter_operator))
            .collect();

        // Sort full records so ordering by a non-projected field still works.
        sort_entities(&mut found, &query.order);

        if let Some(limit) = query.effective_limit() {
            found.truncate(limit);
        }
        if let Some(fields) = &query.fields {
            found = found.iter().map(|entity| entity.project(fields)).collect();
        }

        debug!(entity_type, count = found.len(), "find");
        Ok(found)
    }

    fn create(&self, entity_type: &str, data: &Map<String, Value>) -> GridResult<Entity> {
        check_reserved(data)?;
        self.require_type(entity_type)?;
        self.validate(entity_type, data)?;
        let entity = self.store.insert(entity_type, data.clone());
        debug!(entity_type, id = entity.id, "created");
        Ok(entity)
    }

    fn update(&self, entity_type: &str, id: i64, data: &Map<String, Value>) -> GridResult<Entity> {
        check_reserved(data)?;
        self.require_type(entity_type)?;
        if self.store.get(entity_type, id).is_none() {
            return Err(GridError::not_found(entity_type, id));
        }
        self.validate(entity_type, data)?;

        let entity = self
            .store
            .update(entity_type, id, data)
            .ok_or_else(|| GridError::not_found(entity_type, id))?;
        debug!(entity_type, id, fields = data.len(), "updated");
        Ok(entity)
    }

    fn delete(&self, entity_type: &str, id: i64) -> GridResult<bool> {
        let retired = self.store.retire(entity_type, id);
        debug!(entity_type, id, retired, "delete");
        Ok(retired)
    }

    fn revive(&self, entity_type: &str, id: i64) -> GridResult<bool> {
        let revived = self.store.revive(entity_type, id);
        debug!(entity_type, id, revived, "revive");
        Ok(revived)
    }

    fn schema_read(&self) -> GridResult<Value> {
        Ok(self.schema.to_schema_value())
    }

    fn schema_entity_read(&self) -> GridResult<Value> {
        Ok(self.schema.to_entity_value())
    }

    fn schema_field_read(&self, entity_type: &str, field: Option<&str>) -> GridResult<Value> {
        self.schema.field_schema_value(entity_type, field)
    }

    fn get_thumbnail_url(&self, entity_type: &str, id: i64, field: &str) -> GridResult<String> {
        match self.field_value(entity_type, id, field)? {
            Value::Null => Err(GridError::MissingAttachment {
                entity_type: entity_type.to_string(),
                id,
                field: field.to_string(),
            }),
            Value::String(url) if url.starts_with("http") => Ok(url),
            Value::Object(attachment) => Ok(attachment
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or(PLACEHOLDER_THUMBNAIL_URL)
                .to_string()),
            _ => Ok(PLACEHOLDER_THUMBNAIL_URL.to_string()),
        }
    }

    fn get_attachment_download_url(
        &self,
        entity_type: &str,
        id: i64,
        field: &str,
    ) -> GridResult<Option<String>> {
        let value = self.field_value(entity_type, id, field)?;
        Ok(attachment_url(&value))
    }

    fn download_attachment(&self, attachment: &Value) -> GridResult<Vec<u8>> {
        debug!(url = ?attachment_url(attachment), "download");
        Ok(MOCK_ATTACHMENT_BYTES.to_vec())
    }
}

/// Resolves an attachment value to a URL: the `url` key, then a URL built
/// from `name`, then the value itself when it is a string.
fn attachment_url(value: &Value) -> Option<String> {
    match value {
        Value::String(url) => Some(url.clone()),
        Value::Object(attachment) => {
            if let Some(url) = attachment.get("url").and_then(Value::as_str) {
                return Some(url.to_string());
            }
            attachment
                .get("name")
                .and_then(Value::as_str)
                .map(|name| format!("{PLACEHOLDER_ATTACHMENT_BASE}{name}"))
        }
        _ => None,
    }
}
