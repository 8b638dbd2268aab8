//! Emulated handle factory.

use crate::handle::MockHandle;
use gridlink_model::{EntityHandle, EntitySchema, GridResult, HandleFactory, SchemaPaths};
use std::sync::Arc;
use tracing::debug;

/// Where an emulated factory gets its schema from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Read both schema files on every `create_client` call.
    Paths(SchemaPaths),
    /// A schema already in memory, shared by every handle.
    Loaded(Arc<EntitySchema>),
}

impl SchemaSource {
    fn resolve(&self) -> GridResult<Arc<EntitySchema>> {
        match self {
            Self::Paths(paths) => EntitySchema::load(paths).map(Arc::new),
            Self::Loaded(schema) => Ok(Arc::clone(schema)),
        }
    }
}

/// Hands out schema-bound [`MockHandle`]s, each with a fresh, empty store.
#[derive(Debug, Clone)]
pub struct MockFactory {
    source: SchemaSource,
}

impl MockFactory {
    pub fn new(source: SchemaSource) -> Self {
        Self { source }
    }

    pub fn from_paths(paths: SchemaPaths) -> Self {
        Self::new(SchemaSource::Paths(paths))
    }

    pub fn from_schema(schema: EntitySchema) -> Self {
        Self::new(SchemaSource::Loaded(Arc::new(schema)))
    }

    /// Like `create_client`, but keeps the concrete type.
    pub fn create_mock(&self) -> GridResult<MockHandle> {
        let schema = self.source.resolve()?;
        debug!(entity_types = schema.entity_types().count(), "creating emulated handle");
        Ok(MockHandle::new(schema))
    }
}

impl HandleFactory for MockFactory {
    fn create_client(&self) -> GridResult<Box<dyn EntityHandle>> {
        Ok(Box::new(self.create_mock()?))
    }
}
