//! Reference resolution: id and index lookup inside an entity section.
//!
//! A section is the node holding one kind of entity for a block (for
//! example `/data/<block>/data_arrays`); each child node is named by the
//! entity's id. Resolution happens against the section's *current*
//! children: the index view is live, not a snapshot, so two index-based
//! calls around a structural change may see different entities. Callers
//! needing stability pin by id. Nothing here caches a resolved handle
//! beyond the call.

use std::sync::Arc;

use strata_store::{NodePath, StorageBackend};
use strata_types::EntityId;
use tracing::warn;

use crate::error::{ModelError, ModelResult};

/// Ids of all entities in the section, in stored (name-sorted) order.
///
/// Child names that do not parse as ids are skipped: the filesystem
/// backend cannot stop foreign directories from appearing next to ours.
pub fn entity_ids(
    backend: &Arc<dyn StorageBackend>,
    section: &NodePath,
) -> ModelResult<Vec<EntityId>> {
    let mut ids = Vec::new();
    for name in backend.children(section)? {
        match EntityId::parse(&name) {
            Ok(id) => ids.push(id),
            Err(_) => {
                warn!(section = %section, name, "skipping non-entity child");
            }
        }
    }
    Ok(ids)
}

/// Number of entities in the section.
pub fn count(backend: &Arc<dyn StorageBackend>, section: &NodePath) -> ModelResult<usize> {
    Ok(entity_ids(backend, section)?.len())
}

/// Whether an entity with this id exists in the section right now.
pub fn contains(
    backend: &Arc<dyn StorageBackend>,
    section: &NodePath,
    id: &EntityId,
) -> ModelResult<bool> {
    Ok(backend.exists(&section.child(&id.to_string())?)?)
}

/// Resolve an id to its node address.
///
/// Fails with `NotFound` if no such entity exists in the section at call
/// time — a dangling reference is the caller's signal that its target was
/// deleted.
pub fn resolve_by_id(
    backend: &Arc<dyn StorageBackend>,
    section: &NodePath,
    id: &EntityId,
    kind: &'static str,
) -> ModelResult<NodePath> {
    let path = section.child(&id.to_string())?;
    if !backend.exists(&path)? {
        return Err(ModelError::not_found(kind, id.to_string()));
    }
    Ok(path)
}

/// Resolve a positional index to a node address.
///
/// The position is evaluated against the live child listing; fails with
/// `NotFound` when the index is out of bounds.
pub fn resolve_by_index(
    backend: &Arc<dyn StorageBackend>,
    section: &NodePath,
    index: usize,
    kind: &'static str,
) -> ModelResult<NodePath> {
    let ids = entity_ids(backend, section)?;
    let id = ids
        .get(index)
        .ok_or_else(|| ModelError::not_found(kind, format!("index {index} of {}", ids.len())))?;
    section.child(&id.to_string()).map_err(ModelError::from)
}
