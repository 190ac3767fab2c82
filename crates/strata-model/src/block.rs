//! Blocks: top-level grouping of arrays, tags, groups, and sources.

use std::sync::Arc;

use strata_store::{NodePath, StorageBackend};
use strata_types::EntityId;
use tracing::{debug, warn};

use crate::data_array::DataArray;
use crate::entity::{Entity, EntityCore};
use crate::error::{ModelError, ModelResult};
use crate::group::Group;
use crate::resolver;
use crate::source::Source;
use crate::tag::Tag;

/// Section names under a block node. Like the `position`/`extent`/`units`
/// property names, these are part of the on-disk layout contract.
mod sections {
    pub const DATA_ARRAYS: &str = "data_arrays";
    pub const GROUPS: &str = "groups";
    pub const TAGS: &str = "tags";
    pub const SOURCES: &str = "sources";
}

/// A block of recorded data: the unit under which all other entities live.
///
/// Each entity kind occupies one section node below the block, with one
/// child node per entity keyed by id. Deleting an entity removes its node
/// and every attached property; entities referencing it by id are left
/// with dangling references, never deleted themselves.
#[derive(Clone, Debug)]
pub struct Block {
    core: EntityCore,
}

impl Block {
    pub(crate) fn create(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
    ) -> ModelResult<Self> {
        let core = EntityCore::create(backend, path, id, type_, name)?;
        let block = Self { core };
        // Sections exist from the start so listings never hit absent nodes.
        for section in [
            sections::DATA_ARRAYS,
            sections::GROUPS,
            sections::TAGS,
            sections::SOURCES,
        ] {
            block.backend().node(&block.section(section)?)?.ensure()?;
        }
        debug!(block = %block.core.path(), "block created");
        Ok(block)
    }

    pub(crate) fn open(backend: Arc<dyn StorageBackend>, path: NodePath) -> ModelResult<Self> {
        Ok(Self {
            core: EntityCore::open(backend, path)?,
        })
    }

    fn backend(&self) -> &Arc<dyn StorageBackend> {
        self.core.backend()
    }

    fn section(&self, name: &str) -> ModelResult<NodePath> {
        Ok(self.core.path().child(name)?)
    }

    fn entity_path(&self, section: &str, id: &EntityId) -> ModelResult<NodePath> {
        Ok(self.section(section)?.child(&id.to_string())?)
    }

    fn delete_entity(&self, section: &str, id: &EntityId) -> ModelResult<bool> {
        Ok(self.backend().remove_node(&self.entity_path(section, id)?)?)
    }

    /// Open every entity in a section through `open`, filtered by the
    /// caller's predicate, skipping nodes that are not valid entities.
    fn list_entities<T, F, O>(&self, section: &str, open: O, filter: F) -> ModelResult<Vec<T>>
    where
        O: Fn(NodePath) -> ModelResult<T>,
        F: Fn(&T) -> bool,
    {
        let section_path = self.section(section)?;
        let mut out = Vec::new();
        for id in resolver::entity_ids(self.backend(), &section_path)? {
            match open(section_path.child(&id.to_string())?) {
                Ok(entity) => {
                    if filter(&entity) {
                        out.push(entity);
                    }
                }
                Err(ModelError::UninitializedEntity { path }) => {
                    warn!(%path, "skipping uninitialized node in listing");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Data arrays
    // -----------------------------------------------------------------------

    /// Create a data array entity in this block.
    pub fn create_data_array(&self, name: &str, type_: &str) -> ModelResult<DataArray> {
        let id = EntityId::new();
        DataArray::create(
            Arc::clone(self.backend()),
            self.entity_path(sections::DATA_ARRAYS, &id)?,
            id,
            type_,
            name,
        )
    }

    /// Get a data array by id. Fails with `NotFound` if it does not exist.
    pub fn data_array(&self, id: &EntityId) -> ModelResult<DataArray> {
        let path = resolver::resolve_by_id(
            self.backend(),
            &self.section(sections::DATA_ARRAYS)?,
            id,
            "data array",
        )?;
        DataArray::open(Arc::clone(self.backend()), path)
    }

    /// Get a data array by live positional index.
    pub fn data_array_by_index(&self, index: usize) -> ModelResult<DataArray> {
        let path = resolver::resolve_by_index(
            self.backend(),
            &self.section(sections::DATA_ARRAYS)?,
            index,
            "data array",
        )?;
        DataArray::open(Arc::clone(self.backend()), path)
    }

    pub fn has_data_array(&self, id: &EntityId) -> ModelResult<bool> {
        resolver::contains(self.backend(), &self.section(sections::DATA_ARRAYS)?, id)
    }

    pub fn data_array_count(&self) -> ModelResult<usize> {
        resolver::count(self.backend(), &self.section(sections::DATA_ARRAYS)?)
    }

    /// All data arrays matching `filter`, in stored order.
    pub fn data_arrays<F>(&self, filter: F) -> ModelResult<Vec<DataArray>>
    where
        F: Fn(&DataArray) -> bool,
    {
        let backend = Arc::clone(self.backend());
        self.list_entities(
            sections::DATA_ARRAYS,
            move |path| DataArray::open(Arc::clone(&backend), path),
            filter,
        )
    }

    /// Delete a data array entity and all its properties.
    ///
    /// Groups referencing it keep their (now dangling) ids.
    pub fn delete_data_array(&self, id: &EntityId) -> ModelResult<bool> {
        self.delete_entity(sections::DATA_ARRAYS, id)
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Create a tag at `position`.
    pub fn create_tag(&self, name: &str, type_: &str, position: &[f64]) -> ModelResult<Tag> {
        let id = EntityId::new();
        Tag::create(
            Arc::clone(self.backend()),
            self.entity_path(sections::TAGS, &id)?,
            id,
            type_,
            name,
            position,
        )
    }

    pub fn tag(&self, id: &EntityId) -> ModelResult<Tag> {
        let path =
            resolver::resolve_by_id(self.backend(), &self.section(sections::TAGS)?, id, "tag")?;
        Tag::open(Arc::clone(self.backend()), path)
    }

    pub fn tag_by_index(&self, index: usize) -> ModelResult<Tag> {
        let path = resolver::resolve_by_index(
            self.backend(),
            &self.section(sections::TAGS)?,
            index,
            "tag",
        )?;
        Tag::open(Arc::clone(self.backend()), path)
    }

    pub fn has_tag(&self, id: &EntityId) -> ModelResult<bool> {
        resolver::contains(self.backend(), &self.section(sections::TAGS)?, id)
    }

    pub fn tag_count(&self) -> ModelResult<usize> {
        resolver::count(self.backend(), &self.section(sections::TAGS)?)
    }

    pub fn tags<F>(&self, filter: F) -> ModelResult<Vec<Tag>>
    where
        F: Fn(&Tag) -> bool,
    {
        let backend = Arc::clone(self.backend());
        self.list_entities(
            sections::TAGS,
            move |path| Tag::open(Arc::clone(&backend), path),
            filter,
        )
    }

    pub fn delete_tag(&self, id: &EntityId) -> ModelResult<bool> {
        self.delete_entity(sections::TAGS, id)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Create a group. References added to it resolve against this block's
    /// data arrays.
    pub fn create_group(&self, name: &str, type_: &str) -> ModelResult<Group> {
        let id = EntityId::new();
        Group::create(
            Arc::clone(self.backend()),
            self.entity_path(sections::GROUPS, &id)?,
            id,
            type_,
            name,
            self.section(sections::DATA_ARRAYS)?,
        )
    }

    pub fn group(&self, id: &EntityId) -> ModelResult<Group> {
        let path =
            resolver::resolve_by_id(self.backend(), &self.section(sections::GROUPS)?, id, "group")?;
        Group::open(
            Arc::clone(self.backend()),
            path,
            self.section(sections::DATA_ARRAYS)?,
        )
    }

    pub fn group_by_index(&self, index: usize) -> ModelResult<Group> {
        let path = resolver::resolve_by_index(
            self.backend(),
            &self.section(sections::GROUPS)?,
            index,
            "group",
        )?;
        Group::open(
            Arc::clone(self.backend()),
            path,
            self.section(sections::DATA_ARRAYS)?,
        )
    }

    pub fn has_group(&self, id: &EntityId) -> ModelResult<bool> {
        resolver::contains(self.backend(), &self.section(sections::GROUPS)?, id)
    }

    pub fn group_count(&self) -> ModelResult<usize> {
        resolver::count(self.backend(), &self.section(sections::GROUPS)?)
    }

    pub fn groups<F>(&self, filter: F) -> ModelResult<Vec<Group>>
    where
        F: Fn(&Group) -> bool,
    {
        let backend = Arc::clone(self.backend());
        let arrays_section = self.section(sections::DATA_ARRAYS)?;
        self.list_entities(
            sections::GROUPS,
            move |path| Group::open(Arc::clone(&backend), path, arrays_section.clone()),
            filter,
        )
    }

    pub fn delete_group(&self, id: &EntityId) -> ModelResult<bool> {
        self.delete_entity(sections::GROUPS, id)
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    pub fn create_source(&self, name: &str, type_: &str) -> ModelResult<Source> {
        let id = EntityId::new();
        Source::create(
            Arc::clone(self.backend()),
            self.entity_path(sections::SOURCES, &id)?,
            id,
            type_,
            name,
        )
    }

    pub fn source(&self, id: &EntityId) -> ModelResult<Source> {
        let path = resolver::resolve_by_id(
            self.backend(),
            &self.section(sections::SOURCES)?,
            id,
            "source",
        )?;
        Source::open(Arc::clone(self.backend()), path)
    }

    pub fn source_by_index(&self, index: usize) -> ModelResult<Source> {
        let path = resolver::resolve_by_index(
            self.backend(),
            &self.section(sections::SOURCES)?,
            index,
            "source",
        )?;
        Source::open(Arc::clone(self.backend()), path)
    }

    pub fn has_source(&self, id: &EntityId) -> ModelResult<bool> {
        resolver::contains(self.backend(), &self.section(sections::SOURCES)?, id)
    }

    pub fn source_count(&self) -> ModelResult<usize> {
        resolver::count(self.backend(), &self.section(sections::SOURCES)?)
    }

    pub fn sources<F>(&self, filter: F) -> ModelResult<Vec<Source>>
    where
        F: Fn(&Source) -> bool,
    {
        let backend = Arc::clone(self.backend());
        self.list_entities(
            sections::SOURCES,
            move |path| Source::open(Arc::clone(&backend), path),
            filter,
        )
    }

    pub fn delete_source(&self, id: &EntityId) -> ModelResult<bool> {
        self.delete_entity(sections::SOURCES, id)
    }
}

impl Entity for Block {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}
