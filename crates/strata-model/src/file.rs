//! The file façade: opening a substrate and managing blocks.

use std::path::Path;
use std::sync::Arc;

use strata_store::{Container, ContainerConfig, FsStore, NodePath, StorageBackend};
use strata_types::EntityId;
use tracing::debug;

use crate::block::Block;
use crate::error::{ModelError, ModelResult};
use crate::resolver;

/// Root node under which all blocks live.
const DATA_ROOT: &str = "data";

/// An open Strata dataset on one of the two substrates.
///
/// `DataFile` holds the backend behind an `Arc` shared with every entity
/// handle created from it; dropping the façade does not tear down the
/// substrate while entities are still using it, and the façade never
/// assumes it is the sole owner of that state.
#[derive(Clone)]
pub struct DataFile {
    backend: Arc<dyn StorageBackend>,
}

impl DataFile {
    /// Open (or create) a dataset stored in a single binary container file.
    pub fn open_container(path: &Path) -> ModelResult<Self> {
        Self::open_container_with(path, ContainerConfig::default())
    }

    /// Open a container dataset with explicit configuration.
    pub fn open_container_with(path: &Path, config: ContainerConfig) -> ModelResult<Self> {
        let container = Container::open(path, config)?;
        Self::with_backend(Arc::new(container))
    }

    /// Open (or create) a dataset stored as a directory tree.
    pub fn open_directory(root: &Path) -> ModelResult<Self> {
        let store = FsStore::open(root)?;
        Self::with_backend(Arc::new(store))
    }

    /// Wrap an already-open backend.
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> ModelResult<Self> {
        let file = Self { backend };
        // Idempotent: never disturbs an existing dataset.
        file.backend.node(&file.data_root()?)?.ensure()?;
        debug!(kind = file.backend.kind(), "dataset open");
        Ok(file)
    }

    /// Which substrate this dataset lives on ("container" / "filesystem").
    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// The shared backend handle.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    fn data_root(&self) -> ModelResult<NodePath> {
        Ok(NodePath::root().child(DATA_ROOT)?)
    }

    fn block_path(&self, id: &EntityId) -> ModelResult<NodePath> {
        Ok(self.data_root()?.child(&id.to_string())?)
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    /// Create a block with a fresh id.
    pub fn create_block(&self, name: &str, type_: &str) -> ModelResult<Block> {
        let id = EntityId::new();
        Block::create(
            Arc::clone(&self.backend),
            self.block_path(&id)?,
            id,
            type_,
            name,
        )
    }

    /// Get a block by id. Fails with `NotFound` if it does not exist.
    pub fn block(&self, id: &EntityId) -> ModelResult<Block> {
        let path = resolver::resolve_by_id(&self.backend, &self.data_root()?, id, "block")?;
        Block::open(Arc::clone(&self.backend), path)
    }

    /// Get a block by live positional index.
    pub fn block_by_index(&self, index: usize) -> ModelResult<Block> {
        let path = resolver::resolve_by_index(&self.backend, &self.data_root()?, index, "block")?;
        Block::open(Arc::clone(&self.backend), path)
    }

    pub fn has_block(&self, id: &EntityId) -> ModelResult<bool> {
        resolver::contains(&self.backend, &self.data_root()?, id)
    }

    pub fn block_count(&self) -> ModelResult<usize> {
        resolver::count(&self.backend, &self.data_root()?)
    }

    /// All blocks matching `filter`, in stored order.
    pub fn blocks<F>(&self, filter: F) -> ModelResult<Vec<Block>>
    where
        F: Fn(&Block) -> bool,
    {
        let root = self.data_root()?;
        let mut out = Vec::new();
        for id in resolver::entity_ids(&self.backend, &root)? {
            match Block::open(Arc::clone(&self.backend), root.child(&id.to_string())?) {
                Ok(block) => {
                    if filter(&block) {
                        out.push(block);
                    }
                }
                Err(ModelError::UninitializedEntity { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Delete a block and everything inside it.
    pub fn delete_block(&self, id: &EntityId) -> ModelResult<bool> {
        Ok(self.backend.remove_node(&self.block_path(id)?)?)
    }
}

impl std::fmt::Debug for DataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFile")
            .field("backend", &self.backend.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    fn both_files() -> (tempfile::TempDir, Vec<DataFile>) {
        let dir = tempfile::tempdir().unwrap();
        let container = DataFile::open_container(&dir.path().join("f.strata")).unwrap();
        let fs = DataFile::open_directory(&dir.path().join("f-dir")).unwrap();
        (dir, vec![container, fs])
    }

    #[test]
    fn open_both_kinds() {
        let (_d, files) = both_files();
        assert_eq!(files[0].backend_kind(), "container");
        assert_eq!(files[1].backend_kind(), "filesystem");
    }

    #[test]
    fn block_crud_on_both_backends() {
        let (_d, files) = both_files();
        for file in files {
            let block = file.create_block("b1", "test.block").unwrap();
            let id = block.id().unwrap();

            assert!(file.has_block(&id).unwrap());
            assert_eq!(file.block_count().unwrap(), 1);
            assert_eq!(file.block(&id).unwrap().name().unwrap(), "b1");
            assert_eq!(file.block_by_index(0).unwrap().id().unwrap(), id);

            assert!(file.delete_block(&id).unwrap());
            assert!(!file.has_block(&id).unwrap());
            assert_eq!(file.block_count().unwrap(), 0);
            assert!(!file.delete_block(&id).unwrap());
        }
    }

    #[test]
    fn unknown_block_is_not_found() {
        let (_d, files) = both_files();
        for file in files {
            assert!(matches!(
                file.block(&EntityId::new()).unwrap_err(),
                ModelError::NotFound { kind: "block", .. }
            ));
            assert!(matches!(
                file.block_by_index(0).unwrap_err(),
                ModelError::NotFound { .. }
            ));
        }
    }

    #[test]
    fn blocks_filtered_listing() {
        let (_d, files) = both_files();
        for file in files {
            file.create_block("keep", "test.block").unwrap();
            file.create_block("drop", "test.block").unwrap();
            let kept = file
                .blocks(|b| b.name().map(|n| n == "keep").unwrap_or(false))
                .unwrap();
            assert_eq!(kept.len(), 1);
            assert_eq!(file.blocks(|_| true).unwrap().len(), 2);
        }
    }

    #[test]
    fn reopening_a_dataset_preserves_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.strata");
        let id = {
            let file = DataFile::open_container(&path).unwrap();
            file.create_block("b", "test.block").unwrap().id().unwrap()
        };
        let file = DataFile::open_container(&path).unwrap();
        assert!(file.has_block(&id).unwrap());
        assert_eq!(file.block(&id).unwrap().name().unwrap(), "b");
    }

    #[test]
    fn facade_clones_share_the_substrate() {
        let (_d, files) = both_files();
        for file in &files {
            let clone = file.clone();
            let id = file.create_block("shared", "test.block").unwrap().id().unwrap();
            assert!(clone.has_block(&id).unwrap());
        }
    }

    #[test]
    fn deleting_a_block_removes_contents() {
        let (_d, files) = both_files();
        for file in files {
            let block = file.create_block("b", "test.block").unwrap();
            block.create_data_array("a", "test.array").unwrap();
            let id = block.id().unwrap();
            assert!(file.delete_block(&id).unwrap());
            assert!(!file.backend().exists(block.core().path()).unwrap());
        }
    }
}
