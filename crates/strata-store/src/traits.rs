use strata_types::Value;

use crate::error::{StoreError, StoreResult};
use crate::path::NodePath;

/// One addressable storage location holding named typed properties.
///
/// All implementations must satisfy these invariants:
/// - `ensure()` is idempotent: calling it N times, with property writes in
///   between, leaves exactly the same stored content as calling it once.
///   It never truncates or resets existing data.
/// - Every property operation ensures the location exists first (lazy
///   existence-or-create), so a freshly acquired handle is usable
///   immediately.
/// - Absence is a first-class state: a presence check on an unwritten name
///   is `Ok(false)`, never an error, and removing an absent property is a
///   no-op returning `Ok(false)`.
/// - Handles are cheap and carry no cached document state; acquiring one
///   does not pin any substrate resource beyond the call.
pub trait AttrNode: Send + Sync {
    /// The address of this node.
    fn path(&self) -> &NodePath;

    /// Create the location (and any missing parents) with empty contents if
    /// it does not exist; open it unchanged if it does.
    fn ensure(&self) -> StoreResult<()>;

    /// Check whether a property with this name is present.
    fn has_attr(&self, name: &str) -> StoreResult<bool>;

    /// Read a property. Returns `Ok(None)` if it is absent.
    fn get_attr(&self, name: &str) -> StoreResult<Option<Value>>;

    /// Write a property, overwriting any previous value of any type.
    fn set_attr(&self, name: &str, value: &Value) -> StoreResult<()>;

    /// Delete a property from storage entirely.
    ///
    /// Returns `Ok(true)` if it existed, `Ok(false)` if it did not.
    fn remove_attr(&self, name: &str) -> StoreResult<bool>;

    /// Read a property that must be present.
    ///
    /// Fails with [`StoreError::AttrMissing`] when absent. Optional fields
    /// go through `get_attr` instead and treat `None` as empty.
    fn require_attr(&self, name: &str) -> StoreResult<Value> {
        self.get_attr(name)?.ok_or_else(|| StoreError::AttrMissing {
            node: self.path().to_string(),
            name: name.to_string(),
        })
    }
}

/// A concrete substrate: the pairing of node handles and the codec that
/// bridges [`Value`]s onto native storage.
///
/// Exactly two implementations exist — the single-file binary
/// [`Container`](crate::Container) and the directory-tree
/// [`FsStore`](crate::FsStore) — and both must produce identical
/// observable results for presence checks, absent-property removal, and
/// write-then-read round trips. The entity layer is written once against
/// this trait and stays backend-oblivious.
pub trait StorageBackend: Send + Sync {
    /// Short backend name for diagnostics ("container" / "filesystem").
    fn kind(&self) -> &'static str;

    /// Acquire a handle for the node at `path`. The node need not exist
    /// yet; the handle's lazy-create semantics take care of that.
    fn node(&self, path: &NodePath) -> StoreResult<Box<dyn AttrNode>>;

    /// Check whether a node exists at `path`.
    fn exists(&self, path: &NodePath) -> StoreResult<bool>;

    /// Names of the direct children of `path`, sorted.
    ///
    /// An absent node is observationally an empty one: `Ok(vec![])`.
    fn children(&self, path: &NodePath) -> StoreResult<Vec<String>>;

    /// Remove the node at `path`, all its properties, and all descendant
    /// nodes. Returns `Ok(true)` if the node existed, `Ok(false)` if not.
    ///
    /// The root node cannot be removed.
    fn remove_node(&self, path: &NodePath) -> StoreResult<bool>;
}
