//! Foundation types for Strata.
//!
//! This crate provides the identity, temporal, and value types used
//! throughout the Strata persistence layer. Every other strata crate
//! depends on `strata-types`.
//!
//! # Key Types
//!
//! - [`EntityId`] — Globally unique, immutable entity identifier
//! - [`Timestamp`] — Wall-clock creation/modification timestamp
//! - [`Value`] — A typed property value (scalar, vector, string, string array)
//! - [`DataType`] — The type tag describing a [`Value`]

pub mod error;
pub mod id;
pub mod timestamp;
pub mod value;

pub use error::TypeError;
pub use id::EntityId;
pub use timestamp::Timestamp;
pub use value::{DataType, Value};
