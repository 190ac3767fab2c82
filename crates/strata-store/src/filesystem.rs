//! Backend B: plain directories with one side-car record per node.
//!
//! Every node is a directory under the store root; its properties live in
//! a reserved `.attributes` file holding a JSON mapping from property name
//! to value. The document is created empty on first access and reloaded
//! from disk before every read *and* write — nothing is cached across
//! calls, trading performance for correctness when another process
//! mutates the tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_types::Value;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::path::NodePath;
use crate::traits::{AttrNode, StorageBackend};

/// Name of the per-directory property record.
pub const ATTRIBUTES_FILE: &str = ".attributes";

/// One node's property document, keyed by property name.
type AttrDoc = BTreeMap<String, Value>;

struct FsInner {
    root: PathBuf,
}

/// The filesystem backend: one directory per node, one `.attributes`
/// document per directory.
#[derive(Clone)]
pub struct FsStore {
    inner: Arc<FsInner>,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory and its empty
    /// property document if needed.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)
            .map_err(|e| StoreError::io(format!("create {}", root.display()), e))?;
        let store = Self {
            inner: Arc::new(FsInner {
                root: root.to_path_buf(),
            }),
        };
        // Root behaves like any other node: open-or-create its record.
        open_or_create(&store.inner.root, &NodePath::root())?;
        debug!(root = %root.display(), "filesystem store open");
        Ok(store)
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    fn dir_of(&self, path: &NodePath) -> PathBuf {
        let mut dir = self.inner.root.clone();
        for seg in path.segments() {
            dir.push(seg);
        }
        dir
    }
}

impl std::fmt::Debug for FsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsStore").field("root", &self.inner.root).finish()
    }
}

/// Create the directory and an empty `.attributes` document if either is
/// missing, then load the document. Existing content is never touched.
fn open_or_create(dir: &Path, node: &NodePath) -> StoreResult<AttrDoc> {
    fs::create_dir_all(dir).map_err(|e| StoreError::io(format!("create {}", dir.display()), e))?;
    let doc_path = dir.join(ATTRIBUTES_FILE);
    if !doc_path.exists() {
        fs::write(&doc_path, b"{}")
            .map_err(|e| StoreError::io(format!("create {}", doc_path.display()), e))?;
    }
    load_doc(&doc_path, node)
}

fn load_doc(doc_path: &Path, node: &NodePath) -> StoreResult<AttrDoc> {
    let text = fs::read_to_string(doc_path)
        .map_err(|e| StoreError::io(format!("read {}", doc_path.display()), e))?;
    // Guard for a just-created or hand-emptied record.
    if text.trim().is_empty() {
        return Ok(AttrDoc::new());
    }
    serde_json::from_str(&text).map_err(|e| {
        warn!(path = %doc_path.display(), error = %e, "corrupt attributes document");
        StoreError::Corrupt {
            path: node.to_string(),
            reason: format!("attributes document: {e}"),
        }
    })
}

fn store_doc(dir: &Path, doc: &AttrDoc) -> StoreResult<()> {
    let doc_path = dir.join(ATTRIBUTES_FILE);
    let text = serde_json::to_string_pretty(doc)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let tmp = dir.join(".attributes.tmp");
    fs::write(&tmp, text.as_bytes())
        .map_err(|e| StoreError::io(format!("write {}", tmp.display()), e))?;
    fs::rename(&tmp, &doc_path)
        .map_err(|e| StoreError::io(format!("rename to {}", doc_path.display()), e))?;
    Ok(())
}

impl StorageBackend for FsStore {
    fn kind(&self) -> &'static str {
        "filesystem"
    }

    fn node(&self, path: &NodePath) -> StoreResult<Box<dyn AttrNode>> {
        Ok(Box::new(FsNode {
            dir: self.dir_of(path),
            path: path.clone(),
        }))
    }

    fn exists(&self, path: &NodePath) -> StoreResult<bool> {
        Ok(self.dir_of(path).is_dir())
    }

    fn children(&self, path: &NodePath) -> StoreResult<Vec<String>> {
        let dir = self.dir_of(path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| StoreError::io(format!("list {}", dir.display()), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(format!("list {}", dir.display()), e))?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !name.starts_with('.') => names.push(name),
                _ => {}
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove_node(&self, path: &NodePath) -> StoreResult<bool> {
        if path.is_root() {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
                reason: "the root node cannot be removed".to_string(),
            });
        }
        let dir = self.dir_of(path);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("remove {}", dir.display()), e))?;
        Ok(true)
    }
}

/// Handle for one directory node in an [`FsStore`].
///
/// Holds only the resolved directory path; every operation re-runs the
/// open-or-create step and reloads the document, mirroring the substrate's
/// no-caching contract.
struct FsNode {
    dir: PathBuf,
    path: NodePath,
}

impl AttrNode for FsNode {
    fn path(&self) -> &NodePath {
        &self.path
    }

    fn ensure(&self) -> StoreResult<()> {
        open_or_create(&self.dir, &self.path).map(|_| ())
    }

    fn has_attr(&self, name: &str) -> StoreResult<bool> {
        let doc = open_or_create(&self.dir, &self.path)?;
        Ok(!doc.is_empty() && doc.contains_key(name))
    }

    fn get_attr(&self, name: &str) -> StoreResult<Option<Value>> {
        let doc = open_or_create(&self.dir, &self.path)?;
        Ok(doc.get(name).cloned())
    }

    fn set_attr(&self, name: &str, value: &Value) -> StoreResult<()> {
        let mut doc = open_or_create(&self.dir, &self.path)?;
        doc.insert(name.to_string(), value.clone());
        store_doc(&self.dir, &doc)
    }

    fn remove_attr(&self, name: &str) -> StoreResult<bool> {
        let mut doc = open_or_create(&self.dir, &self.path)?;
        if doc.remove(name).is_none() {
            return Ok(false);
        }
        store_doc(&self.dir, &doc)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(&dir.path().join("store")).unwrap();
        (dir, store)
    }

    fn p(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[test]
    fn open_creates_root_record() {
        let (_dir, store) = open_temp();
        assert!(store.root().join(ATTRIBUTES_FILE).is_file());
    }

    #[test]
    fn fresh_directory_has_no_fields_but_gains_a_record() {
        let (_dir, store) = open_temp();
        let node = store.node(&p("/data/b1")).unwrap();

        assert!(!node.has_attr("anything").unwrap());

        // The presence check left a valid empty document behind.
        let doc_path = store.root().join("data/b1").join(ATTRIBUTES_FILE);
        assert!(doc_path.is_file());
        let text = fs::read_to_string(doc_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, serde_json::json!({}));
    }

    #[test]
    fn write_then_read_roundtrip() {
        let (_dir, store) = open_temp();
        let node = store.node(&p("/data/t1")).unwrap();

        let values = vec![
            Value::Bool(false),
            Value::Int(99),
            Value::Float(-0.5),
            Value::from("tag one"),
            Value::FloatVec(vec![1.0, 2.0, 3.5]),
            Value::StrVec(vec!["mV".into(), "ms".into()]),
        ];
        for (i, v) in values.iter().enumerate() {
            let name = format!("attr{i}");
            node.set_attr(&name, v).unwrap();
            assert_eq!(node.get_attr(&name).unwrap().as_ref(), Some(v));
        }
    }

    #[test]
    fn reads_see_external_mutation() {
        let (_dir, store) = open_temp();
        let node = store.node(&p("/data")).unwrap();
        node.set_attr("x", &Value::Int(1)).unwrap();

        // Another writer replaces the document behind our back.
        let doc_path = store.root().join("data").join(ATTRIBUTES_FILE);
        fs::write(&doc_path, r#"{"x":{"Int":2}}"#).unwrap();

        assert_eq!(node.get_attr("x").unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn remove_absent_attr_is_noop() {
        let (_dir, store) = open_temp();
        let node = store.node(&p("/data")).unwrap();
        assert!(!node.remove_attr("ghost").unwrap());
    }

    #[test]
    fn remove_present_attr_deletes_from_document() {
        let (_dir, store) = open_temp();
        let node = store.node(&p("/data")).unwrap();
        node.set_attr("x", &Value::from("y")).unwrap();
        assert!(node.remove_attr("x").unwrap());
        assert!(!node.has_attr("x").unwrap());

        let text = fs::read_to_string(store.root().join("data").join(ATTRIBUTES_FILE)).unwrap();
        assert!(!text.contains('x'));
    }

    #[test]
    fn ensure_is_idempotent_and_preserving() {
        let (_dir, store) = open_temp();
        let node = store.node(&p("/data/b1")).unwrap();
        node.ensure().unwrap();
        node.set_attr("keep", &Value::Float(2.5)).unwrap();
        for _ in 0..5 {
            node.ensure().unwrap();
        }
        assert_eq!(node.get_attr("keep").unwrap(), Some(Value::Float(2.5)));
    }

    #[test]
    fn empty_document_file_is_tolerated() {
        let (_dir, store) = open_temp();
        let node = store.node(&p("/data")).unwrap();
        node.ensure().unwrap();
        fs::write(store.root().join("data").join(ATTRIBUTES_FILE), b"").unwrap();
        assert!(!node.has_attr("x").unwrap());
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let (_dir, store) = open_temp();
        let node = store.node(&p("/data")).unwrap();
        node.ensure().unwrap();
        fs::write(store.root().join("data").join(ATTRIBUTES_FILE), b"{ not json").unwrap();
        assert!(matches!(
            node.get_attr("x").unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }

    #[test]
    fn children_are_sorted_directories_only() {
        let (_dir, store) = open_temp();
        for name in ["zeta", "alpha", "mid"] {
            store
                .node(&p(&format!("/data/{name}")))
                .unwrap()
                .ensure()
                .unwrap();
        }
        // A stray file must not show up as a node.
        fs::write(store.root().join("data/notes.txt"), b"hi").unwrap();

        assert_eq!(
            store.children(&p("/data")).unwrap(),
            vec!["alpha", "mid", "zeta"]
        );
    }

    #[test]
    fn children_of_absent_node_is_empty() {
        let (_dir, store) = open_temp();
        assert!(store.children(&p("/nope")).unwrap().is_empty());
    }

    #[test]
    fn remove_node_is_recursive() {
        let (_dir, store) = open_temp();
        store.node(&p("/data/b1/tags/t1")).unwrap().ensure().unwrap();
        assert!(store.remove_node(&p("/data/b1")).unwrap());
        assert!(!store.exists(&p("/data/b1")).unwrap());
        assert!(!store.remove_node(&p("/data/b1")).unwrap());
    }

    #[test]
    fn root_cannot_be_removed() {
        let (_dir, store) = open_temp();
        assert!(matches!(
            store.remove_node(&NodePath::root()).unwrap_err(),
            StoreError::InvalidPath { .. }
        ));
    }

    #[test]
    fn document_survives_node_reacquisition() {
        let (_dir, store) = open_temp();
        store
            .node(&p("/data"))
            .unwrap()
            .set_attr("x", &Value::Int(3))
            .unwrap();
        // A fresh handle sees the same state: nothing lives on the handle.
        assert_eq!(
            store.node(&p("/data")).unwrap().get_attr("x").unwrap(),
            Some(Value::Int(3))
        );
    }
}
