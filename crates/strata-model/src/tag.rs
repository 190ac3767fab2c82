//! Tags: regions of interest in n-dimensional data.

use std::sync::Arc;

use strata_store::{NodePath, StorageBackend};
use strata_types::{EntityId, Timestamp, Value};

use crate::entity::{attrs, Entity, EntityCore};
use crate::error::ModelResult;

/// A tagged region: a `position` with optional `extent` and `units`.
///
/// The three fields are independent optional vectors — setting or clearing
/// one never touches the others, and their lengths are not cross-validated
/// here. Absent fields read as empty vectors; use the `has_*` checks to
/// tell absence from an explicitly empty value.
#[derive(Clone, Debug)]
pub struct Tag {
    core: EntityCore,
}

impl Tag {
    pub(crate) fn create(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
        position: &[f64],
    ) -> ModelResult<Self> {
        Self::create_at(backend, path, id, type_, name, position, Timestamp::now())
    }

    pub(crate) fn create_at(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
        position: &[f64],
        time: Timestamp,
    ) -> ModelResult<Self> {
        let core = EntityCore::create_at(backend, path, id, type_, name, time)?;
        // The construction stamp covers this write; no separate bump.
        core.set_attr_unstamped(attrs::POSITION, &Value::FloatVec(position.to_vec()))?;
        Ok(Self { core })
    }

    pub(crate) fn open(backend: Arc<dyn StorageBackend>, path: NodePath) -> ModelResult<Self> {
        Ok(Self {
            core: EntityCore::open(backend, path)?,
        })
    }

    /// The tagged position, one coordinate per dimension. Empty if unset.
    pub fn position(&self) -> ModelResult<Vec<f64>> {
        self.core.optional_float_vec(attrs::POSITION)
    }

    /// Overwrite the position. Bumps `updated_at` like every other field
    /// mutator.
    pub fn set_position(&self, values: &[f64]) -> ModelResult<()> {
        self.core.set_float_vec(attrs::POSITION, values)
    }

    pub fn clear_position(&self) -> ModelResult<()> {
        self.core.clear_optional(attrs::POSITION)
    }

    pub fn has_position(&self) -> ModelResult<bool> {
        self.core.has(attrs::POSITION)
    }

    /// The extent of the region, one size per dimension. Empty if unset.
    pub fn extent(&self) -> ModelResult<Vec<f64>> {
        self.core.optional_float_vec(attrs::EXTENT)
    }

    pub fn set_extent(&self, values: &[f64]) -> ModelResult<()> {
        self.core.set_float_vec(attrs::EXTENT, values)
    }

    pub fn clear_extent(&self) -> ModelResult<()> {
        self.core.clear_optional(attrs::EXTENT)
    }

    pub fn has_extent(&self) -> ModelResult<bool> {
        self.core.has(attrs::EXTENT)
    }

    /// Units for the tagged dimensions. Empty if unset.
    pub fn units(&self) -> ModelResult<Vec<String>> {
        self.core.optional_str_vec(attrs::UNITS)
    }

    pub fn set_units(&self, units: &[String]) -> ModelResult<()> {
        self.core.set_str_vec(attrs::UNITS, units)
    }

    pub fn clear_units(&self) -> ModelResult<()> {
        self.core.clear_optional(attrs::UNITS)
    }

    pub fn has_units(&self) -> ModelResult<bool> {
        self.core.has(attrs::UNITS)
    }
}

impl Entity for Tag {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}
