//! In-memory emulation of the production-tracking entity service.
//!
//! [`MockHandle`] reproduces the live service's CRUD, filter, sort and
//! validation contract over an internally locked [`EntityStore`], so tool code
//! can run hermetically against it. [`MockFactory`] is the emulated side of
//! the [`gridlink_model::HandleFactory`] contract.
//!
//! # Architecture
//!
//! - `store`: per-type sharded record tables, id allocation, retirement
//! - `query`: stateless filter evaluation and multi-pass stable sorting
//! - `validate`: schema-driven payload checks that report every bad field
//! - `handle` / `factory`: the pieces above composed behind the shared traits

mod factory;
mod handle;
pub mod query;
mod store;
pub mod validate;

pub use factory::{MockFactory, SchemaSource};
pub use handle::{
    MOCK_ATTACHMENT_BYTES, MockHandle, PLACEHOLDER_ATTACHMENT_BASE, PLACEHOLDER_THUMBNAIL_URL,
};
pub use store::EntityStore;
