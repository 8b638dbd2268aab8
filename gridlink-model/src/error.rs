//! Error types shared by every handle implementation.

use std::fmt;
use thiserror::Error;

/// Result type for handle and factory operations.
pub type GridResult<T> = Result<T, GridError>;

/// Errors surfaced through the handle and factory contracts.
#[derive(Debug, Error)]
pub enum GridError {
    /// Pool is at capacity and has no free handle.
    #[error("connection pool exhausted (max {max_size} handles)")]
    PoolExhausted { max_size: usize },

    /// A handle was released that the pool does not track as in use.
    #[error("handle is not in use by this pool")]
    NotInUse,

    /// Credential or session failure while constructing a handle.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Update or lookup target does not exist.
    #[error("{entity_type} with id {id} not found")]
    NotFound { entity_type: String, id: i64 },

    /// Caller supplied `id` or `type` in a field payload.
    #[error("reserved fields cannot be written: {}", .0.join(", "))]
    ReservedField(Vec<String>),

    /// One or more fields failed schema validation.
    #[error("{0}")]
    Validation(ValidationReport),

    /// A batch contained a request the store cannot execute.
    #[error("invalid batch request: {0}")]
    InvalidBatchRequest(String),

    /// The schema source could not be read or parsed.
    #[error("schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// Entity type is not declared in the schema.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Record exists but the attachment/image field is empty.
    #[error("{entity_type} with id {id} has no {field}")]
    MissingAttachment {
        entity_type: String,
        id: i64,
        field: String,
    },

    /// The remote service rejected a call or returned garbage.
    #[error("remote error: {0}")]
    Remote(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GridError {
    pub fn not_found(entity_type: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }
}

/// A single offending field in a create/update payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Every field violation found in one payload.
///
/// Validation never stops at the first problem, so callers get the full list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub entity_type: String,
    pub violations: Vec<FieldViolation>,
}

impl ValidationReport {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            violations: Vec::new(),
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Names of the offending fields, in payload order.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    /// `Ok(())` when nothing was recorded, otherwise the report as an error.
    pub fn into_result(self) -> GridResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(GridError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "validation failed for {} ({}):",
            self.entity_type,
            self.fields().join(", ")
        )?;
        for v in &self.violations {
            write!(f, "\n  {}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}
