//! Backend A: the single-file hierarchical binary container.
//!
//! All nodes live in one image file. On disk the image is framed as:
//!
//! ```text
//! [8 bytes: magic "STRATA1\0"]
//! [4 bytes: format version (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [8 bytes: payload length (little-endian u64)]
//! [N bytes: payload (bincode-serialized image)]
//! ```
//!
//! The payload is a path-keyed node map (each node an attribute table)
//! plus the variable-length heap holding string payloads. The image is
//! loaded once at open, held behind a mutex, and rewritten whole via a
//! temp-file-and-rename on every mutation. A corrupt image is rejected at
//! open; it is never silently reset.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use strata_types::Value;
use tracing::debug;

use crate::codec::{self, RawAttr, VlenHeap};
use crate::error::{StoreError, StoreResult};
use crate::path::NodePath;
use crate::traits::{AttrNode, StorageBackend};

const MAGIC: [u8; 8] = *b"STRATA1\0";
const FORMAT_VERSION: u32 = 1;

/// Header size: magic + version + CRC + payload length.
const HEADER_SIZE: usize = 8 + 4 + 4 + 8;

/// Flush/sync strategy for image rewrites.
#[derive(Clone, Debug, Default)]
pub enum SyncMode {
    /// `fsync` the image before renaming it into place (safest).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for a [`Container`].
#[derive(Clone, Debug, Default)]
pub struct ContainerConfig {
    /// Sync/flush strategy.
    pub sync_mode: SyncMode,
}

/// One node's attribute table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct NodeRecord {
    attrs: BTreeMap<String, RawAttr>,
}

/// The full in-memory image of a container file.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ContainerImage {
    nodes: BTreeMap<String, NodeRecord>,
    heap: VlenHeap,
}

impl ContainerImage {
    fn fresh() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), NodeRecord::default());
        Self {
            nodes,
            heap: VlenHeap::default(),
        }
    }
}

struct ContainerInner {
    file_path: PathBuf,
    config: ContainerConfig,
    image: Mutex<ContainerImage>,
    outstanding: Arc<AtomicUsize>,
}

/// The container backend: path-addressed groups with typed attributes in a
/// single binary file.
///
/// Cloning is cheap and shares the underlying open container; the handle
/// does not assume it is the sole owner of that state.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Open a container file, creating an empty one if none exists.
    pub fn open(path: &Path, config: ContainerConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::io(format!("create {}", parent.display()), e))?;
            }
        }

        let (image, created) = if path.exists() {
            (load_image(path)?, false)
        } else {
            (ContainerImage::fresh(), true)
        };

        let inner = Arc::new(ContainerInner {
            file_path: path.to_path_buf(),
            config,
            image: Mutex::new(image),
            outstanding: Arc::new(AtomicUsize::new(0)),
        });

        if created {
            let image = inner.image.lock().expect("container mutex poisoned");
            inner.flush(&image)?;
        }

        debug!(path = %path.display(), created, "container open");
        Ok(Self { inner })
    }

    /// Path of the underlying image file.
    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    /// Number of nodes currently stored (including the root).
    pub fn node_count(&self) -> usize {
        self.inner
            .image
            .lock()
            .expect("container mutex poisoned")
            .nodes
            .len()
    }

    /// Live variable-length heap segments.
    pub fn vlen_segment_count(&self) -> usize {
        self.inner
            .image
            .lock()
            .expect("container mutex poisoned")
            .heap
            .segment_count()
    }

    /// Substrate read buffers handed out and not yet reclaimed. Zero
    /// whenever no variable-length read is in flight.
    pub fn outstanding_vlen_buffers(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("file", &self.inner.file_path)
            .field("nodes", &self.node_count())
            .finish()
    }
}

impl ContainerInner {
    /// Rewrite the image file: serialize, frame, write to a temp sibling,
    /// optionally fsync, rename into place.
    fn flush(&self, image: &ContainerImage) -> StoreResult<()> {
        let payload =
            bincode::serialize(image).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&payload);

        let tmp = {
            let mut os = self.file_path.as_os_str().to_owned();
            os.push(".tmp");
            PathBuf::from(os)
        };

        let mut file = File::create(&tmp)
            .map_err(|e| StoreError::io(format!("create {}", tmp.display()), e))?;
        file.write_all(&bytes)
            .map_err(|e| StoreError::io(format!("write {}", tmp.display()), e))?;
        if matches!(self.config.sync_mode, SyncMode::EveryWrite) {
            file.sync_all()
                .map_err(|e| StoreError::io(format!("sync {}", tmp.display()), e))?;
        }
        drop(file);

        fs::rename(&tmp, &self.file_path)
            .map_err(|e| StoreError::io(format!("rename to {}", self.file_path.display()), e))?;

        debug!(bytes = bytes.len(), path = %self.file_path.display(), "container flush");
        Ok(())
    }
}

fn load_image(path: &Path) -> StoreResult<ContainerImage> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.display().to_string(),
        reason,
    };

    let mut bytes = Vec::new();
    File::open(path)
        .map_err(|e| StoreError::io(format!("open {}", path.display()), e))?
        .read_to_end(&mut bytes)
        .map_err(|e| StoreError::io(format!("read {}", path.display()), e))?;

    if bytes.len() < HEADER_SIZE {
        return Err(corrupt(format!("file of {} bytes is too short", bytes.len())));
    }
    if bytes[..8] != MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }
    let version = u32::from_le_bytes(bytes[8..12].try_into().expect("4 bytes"));
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {version}")));
    }
    let expected_crc = u32::from_le_bytes(bytes[12..16].try_into().expect("4 bytes"));
    let payload_len = u64::from_le_bytes(bytes[16..24].try_into().expect("8 bytes"));
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() as u64 != payload_len {
        return Err(corrupt(format!(
            "payload length mismatch: header says {payload_len}, file has {}",
            payload.len()
        )));
    }
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(corrupt(format!(
            "crc mismatch: expected {expected_crc:08x}, computed {actual_crc:08x}"
        )));
    }

    bincode::deserialize(payload).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Insert the node at `path` and any missing ancestors. Existing nodes are
/// left untouched. Returns `true` if anything was inserted.
fn ensure_in(image: &mut ContainerImage, path: &NodePath) -> bool {
    let mut changed = insert_missing(image, "/");
    let mut key = String::new();
    for seg in path.segments() {
        key.push('/');
        key.push_str(seg);
        changed |= insert_missing(image, &key);
    }
    changed
}

fn insert_missing(image: &mut ContainerImage, key: &str) -> bool {
    if image.nodes.contains_key(key) {
        return false;
    }
    image.nodes.insert(key.to_string(), NodeRecord::default());
    true
}

impl StorageBackend for Container {
    fn kind(&self) -> &'static str {
        "container"
    }

    fn node(&self, path: &NodePath) -> StoreResult<Box<dyn AttrNode>> {
        Ok(Box::new(ContainerNode {
            inner: Arc::clone(&self.inner),
            path: path.clone(),
        }))
    }

    fn exists(&self, path: &NodePath) -> StoreResult<bool> {
        let image = self.inner.image.lock().expect("container mutex poisoned");
        Ok(image.nodes.contains_key(&path.to_string()))
    }

    fn children(&self, path: &NodePath) -> StoreResult<Vec<String>> {
        let image = self.inner.image.lock().expect("container mutex poisoned");
        let prefix = if path.is_root() {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        // BTreeMap iteration order makes the result sorted.
        let names = image
            .nodes
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(&prefix)?;
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
            })
            .collect();
        Ok(names)
    }

    fn remove_node(&self, path: &NodePath) -> StoreResult<bool> {
        if path.is_root() {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
                reason: "the root node cannot be removed".to_string(),
            });
        }

        let mut image = self.inner.image.lock().expect("container mutex poisoned");
        let key = path.to_string();
        if !image.nodes.contains_key(&key) {
            return Ok(false);
        }

        let prefix = format!("{key}/");
        let doomed: Vec<String> = image
            .nodes
            .keys()
            .filter(|k| *k == &key || k.starts_with(&prefix))
            .cloned()
            .collect();
        for k in doomed {
            if let Some(record) = image.nodes.remove(&k) {
                for attr in record.attrs.values() {
                    codec::free_segments(attr, &mut image.heap);
                }
            }
        }

        self.inner.flush(&image)?;
        Ok(true)
    }
}

/// Handle for one group inside a [`Container`].
struct ContainerNode {
    inner: Arc<ContainerInner>,
    path: NodePath,
}

impl ContainerNode {
    fn key(&self) -> String {
        self.path.to_string()
    }
}

impl AttrNode for ContainerNode {
    fn path(&self) -> &NodePath {
        &self.path
    }

    fn ensure(&self) -> StoreResult<()> {
        let mut image = self.inner.image.lock().expect("container mutex poisoned");
        if ensure_in(&mut image, &self.path) {
            self.inner.flush(&image)?;
        }
        Ok(())
    }

    fn has_attr(&self, name: &str) -> StoreResult<bool> {
        let mut image = self.inner.image.lock().expect("container mutex poisoned");
        if ensure_in(&mut image, &self.path) {
            self.inner.flush(&image)?;
        }
        Ok(image
            .nodes
            .get(&self.key())
            .is_some_and(|n| n.attrs.contains_key(name)))
    }

    fn get_attr(&self, name: &str) -> StoreResult<Option<Value>> {
        let mut image = self.inner.image.lock().expect("container mutex poisoned");
        if ensure_in(&mut image, &self.path) {
            self.inner.flush(&image)?;
        }
        let Some(attr) = image.nodes.get(&self.key()).and_then(|n| n.attrs.get(name)) else {
            return Ok(None);
        };
        let ctx = format!("attr \"{name}\" at {}", self.path);
        codec::decode(attr, &image.heap, &self.inner.outstanding, &ctx).map(Some)
    }

    fn set_attr(&self, name: &str, value: &Value) -> StoreResult<()> {
        let mut image = self.inner.image.lock().expect("container mutex poisoned");
        ensure_in(&mut image, &self.path);

        let key = self.key();
        // Overwriting a string attribute frees its old heap segments first.
        let old = image.nodes.entry(key.clone()).or_default().attrs.remove(name);
        if let Some(old) = old {
            codec::free_segments(&old, &mut image.heap);
        }

        let raw = codec::encode(value, &mut image.heap);
        image
            .nodes
            .entry(key)
            .or_default()
            .attrs
            .insert(name.to_string(), raw);

        self.inner.flush(&image)
    }

    fn remove_attr(&self, name: &str) -> StoreResult<bool> {
        let mut image = self.inner.image.lock().expect("container mutex poisoned");
        let created = ensure_in(&mut image, &self.path);

        let old = image
            .nodes
            .entry(self.key())
            .or_default()
            .attrs
            .remove(name);

        match old {
            Some(old) => {
                codec::free_segments(&old, &mut image.heap);
                self.inner.flush(&image)?;
                Ok(true)
            }
            None => {
                // Absent property: a no-op, but node creation still persists.
                if created {
                    self.inner.flush(&image)?;
                }
                Ok(false)
            }
        }
    }
}
