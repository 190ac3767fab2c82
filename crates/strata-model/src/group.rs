//! Groups: ordered, non-owning collections of data array references.

use std::sync::Arc;

use strata_store::{NodePath, StorageBackend};
use strata_types::{EntityId, Timestamp};
use tracing::warn;

use crate::data_array::DataArray;
use crate::entity::{attrs, Entity, EntityCore};
use crate::error::{ModelError, ModelResult};
use crate::resolver;

/// A group of data arrays.
///
/// The group stores target ids only (the `references` string array) and
/// resolves them on demand against the owning block's `data_arrays`
/// section. The relation is non-owning: adding a reference never copies
/// the array, removing one never deletes it, and deleting an array
/// elsewhere simply leaves a dangling id behind.
#[derive(Clone, Debug)]
pub struct Group {
    core: EntityCore,
    /// The block's data array section, where references resolve.
    arrays_section: NodePath,
}

impl Group {
    pub(crate) fn create(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
        arrays_section: NodePath,
    ) -> ModelResult<Self> {
        Self::create_at(
            backend,
            path,
            id,
            type_,
            name,
            arrays_section,
            Timestamp::now(),
        )
    }

    pub(crate) fn create_at(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
        arrays_section: NodePath,
        time: Timestamp,
    ) -> ModelResult<Self> {
        let core = EntityCore::create_at(backend, path, id, type_, name, time)?;
        Ok(Self {
            core,
            arrays_section,
        })
    }

    pub(crate) fn open(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        arrays_section: NodePath,
    ) -> ModelResult<Self> {
        Ok(Self {
            core: EntityCore::open(backend, path)?,
            arrays_section,
        })
    }

    /// The stored reference list, in insertion order.
    fn reference_ids(&self) -> ModelResult<Vec<EntityId>> {
        self.core
            .optional_str_vec(attrs::REFERENCES)?
            .iter()
            .map(|s| EntityId::parse(s).map_err(|e| ModelError::InvalidId(e.to_string())))
            .collect()
    }

    fn store_reference_ids(&self, ids: &[EntityId]) -> ModelResult<()> {
        let strings: Vec<String> = ids.iter().map(EntityId::to_string).collect();
        self.core.set_str_vec(attrs::REFERENCES, &strings)
    }

    /// Add a data array to the group's references.
    ///
    /// Set semantics on id: adding an already-referenced array leaves the
    /// list unchanged (and does not bump `updated_at`).
    pub fn add_data_array(&self, id: &EntityId) -> ModelResult<()> {
        let mut ids = self.reference_ids()?;
        if ids.contains(id) {
            return Ok(());
        }
        ids.push(*id);
        self.store_reference_ids(&ids)
    }

    /// Drop the reference to a data array. The array itself is untouched.
    ///
    /// Returns `Ok(false)` if the id was never referenced — a no-op, not
    /// an error.
    pub fn remove_data_array(&self, id: &EntityId) -> ModelResult<bool> {
        let mut ids = self.reference_ids()?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() == before {
            return Ok(false);
        }
        self.store_reference_ids(&ids)?;
        Ok(true)
    }

    /// Whether the group references this data array.
    pub fn has_data_array(&self, id: &EntityId) -> ModelResult<bool> {
        Ok(self.reference_ids()?.contains(id))
    }

    /// Number of referenced data arrays.
    pub fn data_array_count(&self) -> ModelResult<usize> {
        Ok(self.reference_ids()?.len())
    }

    /// Resolve one referenced data array by id.
    ///
    /// Fails with `NotFound` if the id is not in the reference list, or if
    /// it is dangling (the target was deleted from the block).
    pub fn data_array(&self, id: &EntityId) -> ModelResult<DataArray> {
        if !self.has_data_array(id)? {
            return Err(ModelError::not_found("data array reference", id.to_string()));
        }
        self.resolve(id)
    }

    /// Resolve a referenced data array by its position in the stored list.
    pub fn data_array_by_index(&self, index: usize) -> ModelResult<DataArray> {
        let ids = self.reference_ids()?;
        let id = ids.get(index).ok_or_else(|| {
            ModelError::not_found(
                "data array reference",
                format!("index {index} of {}", ids.len()),
            )
        })?;
        self.resolve(id)
    }

    /// All referenced data arrays matching `filter`, in stored order.
    ///
    /// Dangling references are skipped with a warning; they do not fail
    /// the listing.
    pub fn data_arrays<F>(&self, filter: F) -> ModelResult<Vec<DataArray>>
    where
        F: Fn(&DataArray) -> bool,
    {
        let mut arrays = Vec::new();
        for id in self.reference_ids()? {
            match self.resolve(&id) {
                Ok(array) => {
                    if filter(&array) {
                        arrays.push(array);
                    }
                }
                Err(ModelError::NotFound { .. }) => {
                    warn!(group = %self.core.path(), target = %id, "skipping dangling reference");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(arrays)
    }

    fn resolve(&self, id: &EntityId) -> ModelResult<DataArray> {
        let path = resolver::resolve_by_id(
            self.core.backend(),
            &self.arrays_section,
            id,
            "data array",
        )?;
        DataArray::open(Arc::clone(self.core.backend()), path)
    }
}

impl Entity for Group {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}
