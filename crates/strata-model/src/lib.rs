//! Entity model for Strata.
//!
//! This crate maps the scientific entity model — blocks, groups, tags,
//! data arrays, sources — onto the storage abstraction provided by
//! `strata-store`. It is written once against the backend trait and works
//! identically on both substrates.
//!
//! # Key Types
//!
//! - [`DataFile`] — an open dataset; block-level CRUD
//! - [`Block`] — top-level container of all other entities
//! - [`Group`] — ordered non-owning set of data array references
//! - [`Tag`] — a tagged region with optional `position`/`extent`/`units`
//! - [`DataArray`] — array metadata (bulk data lives elsewhere)
//! - [`Source`] — provenance entity
//! - [`Entity`] — accessors shared by every entity kind
//!
//! # Conventions
//!
//! Every entity occupies one storage node and the conventional property
//! names (`entity_id`, `type`, `name`, `created_at`, `updated_at`, plus
//! kind-specific fields). Optional fields read as empty when absent;
//! presence is checked explicitly. Every mutator bumps `updated_at`.

pub mod block;
pub mod data_array;
pub mod entity;
pub mod error;
pub mod file;
pub mod group;
pub mod resolver;
pub mod source;
pub mod tag;

pub use block::Block;
pub use data_array::DataArray;
pub use entity::{attrs, Entity, EntityCore};
pub use error::{ModelError, ModelResult};
pub use file::DataFile;
pub use group::Group;
pub use source::Source;
pub use tag::Tag;

// Re-export the storage surface callers need to open datasets.
pub use strata_store::{ContainerConfig, StorageBackend, SyncMode};
pub use strata_types::{EntityId, Timestamp, Value};
