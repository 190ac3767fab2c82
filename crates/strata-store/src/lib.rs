//! Storage backends for Strata.
//!
//! This crate implements the node/attribute abstraction the entity layer
//! is written against: one addressable node per entity, holding named
//! typed properties, with lazy existence-or-create semantics. Two
//! substrates implement it:
//!
//! - [`Container`] — a single-file hierarchical binary container
//!   (path-addressed groups, CRC-framed bincode image, variable-length
//!   heap for string data)
//! - [`FsStore`] — a plain directory tree with one `.attributes` JSON
//!   document per directory, reloaded on every access
//!
//! # Design Rules
//!
//! 1. Both backends produce identical observable results for presence
//!    checks, absent-property removal, and write-then-read round trips.
//! 2. Absence is a first-class state distinct from an empty value;
//!    removing a property deletes it from storage entirely.
//! 3. `ensure()` is idempotent and never truncates or resets existing
//!    on-disk state.
//! 4. Variable-length read buffers are reclaimed on every exit path; a
//!    read cycle leaves no substrate memory outstanding.
//! 5. All I/O errors are propagated with their node/property context,
//!    never retried, never silently ignored.

pub mod codec;
pub mod container;
pub mod error;
pub mod filesystem;
pub mod path;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use codec::{RawAttr, VlenBuffers};
pub use container::{Container, ContainerConfig, SyncMode};
pub use error::{StoreError, StoreResult};
pub use filesystem::{FsStore, ATTRIBUTES_FILE};
pub use path::NodePath;
pub use traits::{AttrNode, StorageBackend};
