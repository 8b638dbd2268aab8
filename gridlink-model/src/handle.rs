use crate::entity::Entity;
use crate::error::{GridError, GridResult};
use crate::filter::FindQuery;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The CRUD/query contract every handle satisfies, live or emulated.
///
/// Tool code is written purely against this trait; it never asks which kind
/// of handle it holds.
pub trait EntityHandle: Send + Sync {
    /// Returns matching records, ordered and truncated per `query`.
    fn find(&self, entity_type: &str, query: &FindQuery) -> GridResult<Vec<Entity>>;

    /// `find` with `limit = 1`. The result always carries `type`.
    fn find_one(&self, entity_type: &str, query: &FindQuery) -> GridResult<Option<Entity>> {
        let query = query.clone().limit(1);
        let found = self.find(entity_type, &query)?.into_iter().next();
        Ok(found.map(|mut entity| {
            entity.entity_type = entity_type.to_string();
            entity
        }))
    }

    /// Creates a record. `data` must not contain `id` or `type`.
    fn create(&self, entity_type: &str, data: &Map<String, Value>) -> GridResult<Entity>;

    /// Shallow-merges `data` into an existing record.
    fn update(&self, entity_type: &str, id: i64, data: &Map<String, Value>) -> GridResult<Entity>;

    /// Retires a record. Returns `false` when there was nothing to retire.
    fn delete(&self, entity_type: &str, id: i64) -> GridResult<bool>;

    /// Restores a retired record. Returns `false` when it was not retired.
    fn revive(&self, entity_type: &str, id: i64) -> GridResult<bool>;

    /// Runs requests strictly in order. Not atomic: the first failure aborts
    /// the call and earlier requests stay applied.
    fn batch(&self, requests: &[BatchRequest]) -> GridResult<Vec<BatchOutcome>> {
        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            results.push(execute_batch_request(self, index, request)?);
        }
        Ok(results)
    }

    /// Full per-field schema in wire shape.
    fn schema_read(&self) -> GridResult<Value>;

    /// Per-type metadata blob.
    fn schema_entity_read(&self) -> GridResult<Value>;

    /// Field schema for one type, optionally narrowed to a single field.
    fn schema_field_read(&self, entity_type: &str, field: Option<&str>) -> GridResult<Value>;

    /// URL of a record's thumbnail image.
    fn get_thumbnail_url(&self, entity_type: &str, id: i64, field: &str) -> GridResult<String>;

    /// Download URL for an attachment field, `None` when the field is empty.
    fn get_attachment_download_url(
        &self,
        entity_type: &str,
        id: i64,
        field: &str,
    ) -> GridResult<Option<String>>;

    /// Raw bytes of an attachment value (a URL string or attachment object).
    fn download_attachment(&self, attachment: &Value) -> GridResult<Vec<u8>>;
}

/// Builds handles. Chosen once at registration time, never per call.
pub trait HandleFactory: Send + Sync {
    fn create_client(&self) -> GridResult<Box<dyn EntityHandle>>;
}

fn execute_batch_request<H: EntityHandle + ?Sized>(
    handle: &H,
    index: usize,
    request: &BatchRequest,
) -> GridResult<BatchOutcome> {
    let missing = |what: &str| {
        GridError::InvalidBatchRequest(format!(
            "request {} ({} {}) is missing {what}",
            index + 1,
            request.request_type,
            request.entity_type
        ))
    };

    match &request.request_type {
        BatchRequestType::Create => {
            let data = request.data.as_ref().ok_or_else(|| missing("data"))?;
            handle
                .create(&request.entity_type, data)
                .map(BatchOutcome::Record)
        }
        BatchRequestType::Update => {
            let id = request.entity_id.ok_or_else(|| missing("entity_id"))?;
            let data = request.data.as_ref().ok_or_else(|| missing("data"))?;
            handle
                .update(&request.entity_type, id, data)
                .map(BatchOutcome::Record)
        }
        BatchRequestType::Delete => {
            let id = request.entity_id.ok_or_else(|| missing("entity_id"))?;
            handle
                .delete(&request.entity_type, id)
                .map(BatchOutcome::Deleted)
        }
        BatchRequestType::Other(kind) => Err(GridError::InvalidBatchRequest(format!(
            "request {} has unknown request_type '{kind}'",
            index + 1
        ))),
    }
}

/// One entry of a `batch` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub request_type: BatchRequestType,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
}

impl BatchRequest {
    pub fn create(entity_type: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            request_type: BatchRequestType::Create,
            entity_type: entity_type.into(),
            data: Some(data),
            entity_id: None,
        }
    }

    pub fn update(entity_type: impl Into<String>, id: i64, data: Map<String, Value>) -> Self {
        Self {
            request_type: BatchRequestType::Update,
            entity_type: entity_type.into(),
            data: Some(data),
            entity_id: Some(id),
        }
    }

    pub fn delete(entity_type: impl Into<String>, id: i64) -> Self {
        Self {
            request_type: BatchRequestType::Delete,
            entity_type: entity_type.into(),
            data: None,
            entity_id: Some(id),
        }
    }
}

/// Kind of batch request. Unknown kinds are kept so the batch can reject them
/// at the point of execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BatchRequestType {
    Create,
    Update,
    Delete,
    Other(String),
}

impl BatchRequestType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for BatchRequestType {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Other(kind),
        }
    }
}

impl From<BatchRequestType> for String {
    fn from(kind: BatchRequestType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for BatchRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one batch request, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    /// The created or updated record.
    Record(Entity),
    /// Deletion acknowledgement.
    Deleted(bool),
}

impl BatchOutcome {
    pub fn as_record(&self) -> Option<&Entity> {
        match self {
            Self::Record(entity) => Some(entity),
            Self::Deleted(_) => None,
        }
    }
}
