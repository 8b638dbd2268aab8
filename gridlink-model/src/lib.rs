//! Core entity model for gridlink.
//!
//! Defines the types every other gridlink crate depends on:
//! - [`Entity`] / [`EntityRef`]: typed, identified records and links between them
//! - [`EntitySchema`]: per-type field declarations loaded from the service schema
//! - [`Filter`] / [`FindQuery`]: the query language accepted by `find`
//! - [`EntityHandle`]: the CRUD/query contract shared by live and emulated handles
//! - [`HandleFactory`]: the single construction point tool code depends on
//!
//! Live handles (connection pool) and emulated handles (in-memory store) both
//! implement [`EntityHandle`], so code written against one runs unmodified
//! against the other.

mod entity;
mod error;
mod filter;
mod handle;
mod schema;

pub use entity::{Entity, EntityRef, RESERVED_FIELDS, check_reserved};
pub use error::{FieldViolation, GridError, GridResult, ValidationReport};
pub use filter::{
    Filter, FilterOperator, FindQuery, LogicalOperator, RELATIVE_TIME_OPERATORS, SortKey,
    validate_filters,
};
pub use handle::{BatchOutcome, BatchRequest, BatchRequestType, EntityHandle, HandleFactory};
pub use schema::{EntitySchema, FieldDataType, FieldSpec, SchemaPaths};
