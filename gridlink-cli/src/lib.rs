//! Command execution for the `gridlink` binary.
//!
//! The factory is chosen once per process: a schema fixture directory selects
//! the in-memory emulation, otherwise live credentials are read from the
//! environment. Every command runs against a single client taken from that
//! factory and yields a JSON value for printing.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use gridlink_mock::MockFactory;
use gridlink_model::{
    BatchRequest, EntityHandle, Filter, FindQuery, HandleFactory, LogicalOperator, SchemaPaths,
    validate_filters,
};
use gridlink_pool::{PoolConfig, RemoteFactory};
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::{debug, info};

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Query records of one entity type
    Find {
        entity_type: String,

        /// JSON array of `[field, operator, value]` filters
        #[arg(short, long)]
        filters: Option<String>,

        /// Fields to return besides type and id
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Sort keys, `-field` for descending
        #[arg(long, value_delimiter = ',')]
        order: Vec<String>,

        /// Match any filter instead of all of them
        #[arg(long)]
        any: bool,

        /// Maximum number of records, 0 for no limit
        #[arg(short, long, default_value_t = 0)]
        limit: i64,

        /// List retired records instead of active ones
        #[arg(long)]
        retired: bool,
    },

    /// Create a record from a JSON object
    Create { entity_type: String, data: String },

    /// Merge a JSON object into an existing record
    Update {
        entity_type: String,
        id: i64,
        data: String,
    },

    /// Retire a record
    Delete { entity_type: String, id: i64 },

    /// Restore a retired record
    Revive { entity_type: String, id: i64 },

    /// Run a JSON array of batch requests
    Batch { requests: String },

    /// Print the schema, optionally narrowed to one type or field
    Schema {
        entity_type: Option<String>,
        field: Option<String>,
    },

    /// Check that the backend answers
    Ping,
}

/// Picks the emulated factory when `schema_dir` is given, the live one otherwise.
pub fn select_factory(schema_dir: Option<&Path>) -> Result<Box<dyn HandleFactory>> {
    match schema_dir {
        Some(dir) => {
            info!("Using schema fixture in {}", dir.display());
            Ok(Box::new(MockFactory::from_paths(SchemaPaths::in_dir(dir))))
        }
        None => {
            let config = PoolConfig::from_env().context("Failed to read connection settings")?;
            info!("Using live endpoint {}", config.endpoint);
            Ok(Box::new(RemoteFactory::from_config(config)))
        }
    }
}

/// Runs one command on a fresh client from `factory`.
pub fn run(factory: &dyn HandleFactory, command: &Command) -> Result<Value> {
    let client = factory.create_client().context("Failed to create client")?;
    execute(client.as_ref(), command)
}

/// Runs one command on an existing handle.
pub fn execute(handle: &dyn EntityHandle, command: &Command) -> Result<Value> {
    debug!(?command, "executing");
    match command {
        Command::Find {
            entity_type,
            filters,
            fields,
            order,
            any,
            limit,
            retired,
        } => {
            let filters = match filters {
                Some(raw) => parse_filters(raw)?,
                None => Vec::new(),
            };
            let operator = if *any {
                LogicalOperator::Or
            } else {
                LogicalOperator::And
            };
            let mut query = FindQuery::new(filters)
                .order(order.iter().cloned())
                .filter_operator(operator)
                .limit(*limit)
                .retired_only(*retired);
            // No `--fields` means full records, not an empty projection.
            if !fields.is_empty() {
                query = query.fields(fields.iter().cloned());
            }
            let found = handle.find(entity_type, &query)?;
            info!("Found {} {} record(s)", found.len(), entity_type);
            Ok(serde_json::to_value(found)?)
        }
        Command::Create { entity_type, data } => {
            let data = parse_object(data)?;
            let created = handle.create(entity_type, &data)?;
            info!("Created {} {}", entity_type, created.id);
            Ok(created.into_value())
        }
        Command::Update {
            entity_type,
            id,
            data,
        } => {
            let data = parse_object(data)?;
            Ok(handle.update(entity_type, *id, &data)?.into_value())
        }
        Command::Delete { entity_type, id } => {
            let deleted = handle.delete(entity_type, *id)?;
            Ok(json!({"type": entity_type, "id": id, "deleted": deleted}))
        }
        Command::Revive { entity_type, id } => {
            let revived = handle.revive(entity_type, *id)?;
            Ok(json!({"type": entity_type, "id": id, "revived": revived}))
        }
        Command::Batch { requests } => {
            let requests: Vec<BatchRequest> =
                serde_json::from_str(requests).context("Batch requests must be a JSON array")?;
            let outcomes = handle.batch(&requests)?;
            Ok(serde_json::to_value(outcomes)?)
        }
        Command::Schema { entity_type, field } => match entity_type {
            Some(entity_type) => Ok(handle.schema_field_read(entity_type, field.as_deref())?),
            None => Ok(handle.schema_read()?),
        },
        Command::Ping => {
            let entities = handle.schema_entity_read()?;
            let entity_types = entities.as_object().map_or(0, Map::len);
            Ok(json!({"ok": true, "entity_types": entity_types}))
        }
    }
}

/// Parses and checks a JSON filter list, reporting every malformed entry.
pub fn parse_filters(raw: &str) -> Result<Vec<Filter>> {
    let value: Value = serde_json::from_str(raw).context("Filters must be valid JSON")?;
    let Value::Array(items) = value else {
        bail!("Filters must be a JSON array");
    };
    let errors = validate_filters(&items);
    if !errors.is_empty() {
        bail!("Invalid filters: {}", errors.join("; "));
    }
    Ok(serde_json::from_value(Value::Array(items))?)
}

fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw).context("Data must be valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("Data must be a JSON object, got {other}"),
    }
}
