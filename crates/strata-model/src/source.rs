//! Source entities: provenance of recorded data.

use std::sync::Arc;

use strata_store::{NodePath, StorageBackend};
use strata_types::{EntityId, Timestamp};

use crate::entity::{Entity, EntityCore};
use crate::error::ModelResult;

/// Where a piece of data came from: an electrode, a cell, a subject.
///
/// Sources carry only the entity base fields; other entities point at them
/// by id.
#[derive(Clone, Debug)]
pub struct Source {
    core: EntityCore,
}

impl Source {
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
}

impl Entity for Source {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}
