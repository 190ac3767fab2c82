//! The storage-agnostic entity mapper.
//!
//! [`EntityCore`] binds one entity to one storage node and implements the
//! conventional property layout every entity shares: `entity_id`, `type`,
//! `name`, `definition`, `created_at`, `updated_at`. Entity kinds (Block,
//! Group, Tag, ...) wrap an `EntityCore` and add their own fields on top.
//!
//! Timestamp discipline: every mutating property operation bumps
//! `updated_at` to the current time, unless explicitly superseded by the
//! bulk-construction path (`create_at`). Clearing an optional field bumps
//! even when the field was already absent.

use std::sync::Arc;

use strata_store::{AttrNode, NodePath, StorageBackend};
use strata_types::{DataType, EntityId, Timestamp, Value};

use crate::error::{ModelError, ModelResult};

/// Conventional property names shared by all entities. The `position`,
/// `extent`, and `units` names are compatibility-critical: external
/// consumers read them verbatim.
pub mod attrs {
    pub const ENTITY_ID: &str = "entity_id";
    pub const TYPE: &str = "type";
    pub const NAME: &str = "name";
    pub const DEFINITION: &str = "definition";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const POSITION: &str = "position";
    pub const EXTENT: &str = "extent";
    pub const UNITS: &str = "units";
    pub const REFERENCES: &str = "references";
    pub const LABEL: &str = "label";
    pub const UNIT: &str = "unit";
}

/// One entity bound to one storage node.
///
/// The handle is cheap: it holds only the backend and the node address,
/// and reacquires the node for every operation rather than caching any
/// substrate state.
#[derive(Clone)]
pub struct EntityCore {
    backend: Arc<dyn StorageBackend>,
    path: NodePath,
}

impl EntityCore {
    /// Create a fresh entity at `path`, stamping `created_at` and
    /// `updated_at` with the current time.
    pub(crate) fn create(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
    ) -> ModelResult<Self> {
        Self::create_at(backend, path, id, type_, name, Timestamp::now())
    }

    /// Create an entity with an explicit timestamp. This is the
    /// bulk/deserializing construction path: the stamp writes below do not
    /// individually bump `updated_at`.
    pub(crate) fn create_at(
        backend: Arc<dyn StorageBackend>,
        path: NodePath,
        id: EntityId,
        type_: &str,
        name: &str,
        time: Timestamp,
    ) -> ModelResult<Self> {
        let core = Self { backend, path };
        let node = core.node()?;
        node.ensure()?;
        node.set_attr(attrs::ENTITY_ID, &Value::from(id.to_string()))?;
        node.set_attr(attrs::TYPE, &Value::from(type_))?;
        node.set_attr(attrs::NAME, &Value::from(name))?;
        node.set_attr(attrs::CREATED_AT, &Value::Int(time.as_secs()))?;
        node.set_attr(attrs::UPDATED_AT, &Value::Int(time.as_secs()))?;
        Ok(core)
    }

    /// Bind to an existing entity at `path`.
    ///
    /// Fails with [`ModelError::UninitializedEntity`] if the location was
    /// never bound to an entity.
    pub(crate) fn open(backend: Arc<dyn StorageBackend>, path: NodePath) -> ModelResult<Self> {
        let core = Self { backend, path };
        let node = core.node()?;
        if !node.has_attr(attrs::ENTITY_ID)? {
            return Err(ModelError::UninitializedEntity {
                path: core.path.to_string(),
            });
        }
        Ok(core)
    }

    /// The node address this entity is bound to.
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub(crate) fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    fn node(&self) -> ModelResult<Box<dyn AttrNode>> {
        Ok(self.backend.node(&self.path)?)
    }

    fn bump_updated(&self, node: &dyn AttrNode) -> ModelResult<()> {
        node.set_attr(attrs::UPDATED_AT, &Value::Int(Timestamp::now().as_secs()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Base fields
    // -----------------------------------------------------------------------

    /// The immutable entity id.
    pub fn id(&self) -> ModelResult<EntityId> {
        let value = self.node()?.require_attr(attrs::ENTITY_ID)?;
        let s = expect_str(attrs::ENTITY_ID, value)?;
        EntityId::parse(&s).map_err(|e| ModelError::InvalidId(e.to_string()))
    }

    /// The free-form type tag.
    pub fn entity_type(&self) -> ModelResult<String> {
        expect_str(attrs::TYPE, self.node()?.require_attr(attrs::TYPE)?)
    }

    pub fn set_entity_type(&self, type_: &str) -> ModelResult<()> {
        let node = self.node()?;
        node.set_attr(attrs::TYPE, &Value::from(type_))?;
        self.bump_updated(node.as_ref())
    }

    pub fn name(&self) -> ModelResult<String> {
        expect_str(attrs::NAME, self.node()?.require_attr(attrs::NAME)?)
    }

    pub fn set_name(&self, name: &str) -> ModelResult<()> {
        let node = self.node()?;
        node.set_attr(attrs::NAME, &Value::from(name))?;
        self.bump_updated(node.as_ref())
    }

    pub fn created_at(&self) -> ModelResult<Timestamp> {
        let value = self.node()?.require_attr(attrs::CREATED_AT)?;
        expect_int(attrs::CREATED_AT, value).map(Timestamp::from_secs)
    }

    pub fn updated_at(&self) -> ModelResult<Timestamp> {
        let value = self.node()?.require_attr(attrs::UPDATED_AT)?;
        expect_int(attrs::UPDATED_AT, value).map(Timestamp::from_secs)
    }

    /// Force `updated_at` to the current time.
    pub fn touch(&self) -> ModelResult<()> {
        self.bump_updated(self.node()?.as_ref())
    }

    // -----------------------------------------------------------------------
    // Optional fields
    // -----------------------------------------------------------------------

    /// Presence check for any property. This is the only way to tell an
    /// absent optional field from one set to an empty collection.
    pub fn has(&self, name: &str) -> ModelResult<bool> {
        Ok(self.node()?.has_attr(name)?)
    }

    pub(crate) fn optional_str(&self, name: &str) -> ModelResult<Option<String>> {
        match self.node()?.get_attr(name)? {
            Some(value) => expect_str(name, value).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn set_str(&self, name: &str, value: &str) -> ModelResult<()> {
        let node = self.node()?;
        node.set_attr(name, &Value::from(value))?;
        self.bump_updated(node.as_ref())
    }

    /// Read an optional float vector; absent means empty, never an error.
    pub(crate) fn optional_float_vec(&self, name: &str) -> ModelResult<Vec<f64>> {
        match self.node()?.get_attr(name)? {
            Some(Value::FloatVec(v)) => Ok(v),
            Some(other) => Err(type_mismatch(name, DataType::FloatVec, &other)),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn set_float_vec(&self, name: &str, values: &[f64]) -> ModelResult<()> {
        let node = self.node()?;
        node.set_attr(name, &Value::FloatVec(values.to_vec()))?;
        self.bump_updated(node.as_ref())
    }

    /// Read an optional string array; absent means empty, never an error.
    pub(crate) fn optional_str_vec(&self, name: &str) -> ModelResult<Vec<String>> {
        match self.node()?.get_attr(name)? {
            Some(Value::StrVec(v)) => Ok(v),
            Some(other) => Err(type_mismatch(name, DataType::StringVec, &other)),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn set_str_vec(&self, name: &str, values: &[String]) -> ModelResult<()> {
        let node = self.node()?;
        node.set_attr(name, &Value::StrVec(values.to_vec()))?;
        self.bump_updated(node.as_ref())
    }

    /// Write a property without bumping `updated_at`. Only for the
    /// bulk/deserializing construction path, where the construction stamp
    /// supersedes per-write bumps.
    pub(crate) fn set_attr_unstamped(&self, name: &str, value: &Value) -> ModelResult<()> {
        self.node()?.set_attr(name, value)?;
        Ok(())
    }

    /// Remove an optional property if present. Always bumps `updated_at`,
    /// whether or not the property existed.
    pub(crate) fn clear_optional(&self, name: &str) -> ModelResult<()> {
        let node = self.node()?;
        node.remove_attr(name)?;
        self.bump_updated(node.as_ref())
    }
}

impl std::fmt::Debug for EntityCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCore")
            .field("backend", &self.backend.kind())
            .field("path", &self.path)
            .finish()
    }
}

/// Common accessors shared by every entity kind.
pub trait Entity {
    /// The underlying mapper core.
    fn core(&self) -> &EntityCore;

    fn id(&self) -> ModelResult<EntityId> {
        self.core().id()
    }

    fn entity_type(&self) -> ModelResult<String> {
        self.core().entity_type()
    }

    fn set_entity_type(&self, type_: &str) -> ModelResult<()> {
        self.core().set_entity_type(type_)
    }

    fn name(&self) -> ModelResult<String> {
        self.core().name()
    }

    fn set_name(&self, name: &str) -> ModelResult<()> {
        self.core().set_name(name)
    }

    fn definition(&self) -> ModelResult<Option<String>> {
        self.core().optional_str(attrs::DEFINITION)
    }

    fn set_definition(&self, definition: &str) -> ModelResult<()> {
        self.core().set_str(attrs::DEFINITION, definition)
    }

    fn clear_definition(&self) -> ModelResult<()> {
        self.core().clear_optional(attrs::DEFINITION)
    }

    fn created_at(&self) -> ModelResult<Timestamp> {
        self.core().created_at()
    }

    fn updated_at(&self) -> ModelResult<Timestamp> {
        self.core().updated_at()
    }
}

fn expect_str(name: &str, value: Value) -> ModelResult<String> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(type_mismatch(name, DataType::String, &other)),
    }
}

fn expect_int(name: &str, value: Value) -> ModelResult<i64> {
    match value {
        Value::Int(i) => Ok(i),
        other => Err(type_mismatch(name, DataType::Int64, &other)),
    }
}

fn type_mismatch(name: &str, expected: DataType, actual: &Value) -> ModelError {
    ModelError::Store(strata_store::StoreError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual: actual.dtype(),
    })
}
