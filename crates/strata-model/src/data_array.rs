//! Data array metadata entities.

use std::sync::Arc;

use strata_store::{NodePath, StorageBackend};
use strata_types::{EntityId, Timestamp};

use crate::entity::{attrs, Entity, EntityCore};
use crate::error::ModelResult;

/// Metadata for one n-dimensional data array.
///
/// The bulk numeric data itself lives in the external array engine and is
/// referenced by this entity's id; this layer persists only the
/// descriptive fields (`label`, `unit`) alongside the entity base.
#[derive(Clone, Debug)]
pub struct DataArray {
    core: EntityCore,
}

impl DataArray {
    pub(crate) fn create(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
    ) -> ModelResult<Self> {
        Self::create_at(backend, path, id, type_, name, Timestamp::now())
    }

    pub(crate) fn create_at(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
        time: Timestamp,
    ) -> ModelResult<Self> {
        Ok(Self {
            core: EntityCore::create_at(backend, path, id, type_, name, time)?,
        })
    }

    pub(crate) fn open(backend: Arc<dyn StorageBackend>, path: NodePath) -> ModelResult<Self> {
        Ok(Self {
            core: EntityCore::open(backend, path)?,
        })
    }

    /// Human-readable label for plots and listings.
    pub fn label(&self) -> ModelResult<Option<String>> {
        self.core.optional_str(attrs::LABEL)
    }

    pub fn set_label(&self, label: &str) -> ModelResult<()> {
        self.core.set_str(attrs::LABEL, label)
    }

    pub fn clear_label(&self) -> ModelResult<()> {
        self.core.clear_optional(attrs::LABEL)
    }

    /// The SI unit of the stored values.
    pub fn unit(&self) -> ModelResult<Option<String>> {
        self.core.optional_str(attrs::UNIT)
    }

    pub fn set_unit(&self, unit: &str) -> ModelResult<()> {
        self.core.set_str(attrs::UNIT, unit)
    }

    pub fn clear_unit(&self) -> ModelResult<()> {
        self.core.clear_optional(attrs::UNIT)
    }
}

impl Entity for DataArray {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_store::{Container, ContainerConfig};

    fn make() -> (tempfile::TempDir, DataArray) {
        let dir = tempfile::tempdir().unwrap();
        let c = Container::open(&dir.path().join("a.strata"), ContainerConfig::default()).unwrap();
        let backend: Arc<dyn StorageBackend> = Arc::new(c);
        let array = DataArray::create(
            backend,
            NodePath::parse("/data/b1/data_arrays/a1").unwrap(),
            EntityId::new(),
            "test.array",
            "membrane voltage",
        )
        .unwrap();
        (dir, array)
    }

    #[test]
    fn label_and_unit_are_optional() {
        let (_d, array) = make();
        assert!(array.label().unwrap().is_none());
        assert!(array.unit().unwrap().is_none());

        array.set_label("Vm").unwrap();
        array.set_unit("mV").unwrap();
        assert_eq!(array.label().unwrap().as_deref(), Some("Vm"));
        assert_eq!(array.unit().unwrap().as_deref(), Some("mV"));
    }

    #[test]
    fn clear_is_independent() {
        let (_d, array) = make();
        array.set_label("Vm").unwrap();
        array.set_unit("mV").unwrap();

        array.clear_label().unwrap();
        assert!(array.label().unwrap().is_none());
        assert_eq!(array.unit().unwrap().as_deref(), Some("mV"));
    }

    #[test]
    fn base_entity_fields_work() {
        let (_d, array) = make();
        assert_eq!(array.name().unwrap(), "membrane voltage");
        assert_eq!(array.entity_type().unwrap(), "test.array");
        assert!(array.definition().unwrap().is_none());
        array.set_definition("whole-cell recording").unwrap();
        assert_eq!(
            array.definition().unwrap().as_deref(),
            Some("whole-cell recording")
        );
    }
}
