//! Hierarchical node addresses.
//!
//! A [`NodePath`] addresses one storage location in either backend: a group
//! inside the binary container, or a directory under the filesystem root.
//! Paths are `/`-separated; the empty path is the root node.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// A validated hierarchical storage address.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// The root node address.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a `/`-separated path. A leading `/` is optional; the empty
    /// string and `"/"` both address the root.
    pub fn parse(s: &str) -> StoreResult<Self> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for seg in trimmed.split('/') {
            validate_segment(seg).map_err(|reason| StoreError::InvalidPath {
                path: s.to_string(),
                reason,
            })?;
            segments.push(seg.to_string());
        }
        Ok(Self { segments })
    }

    /// The address of a direct child of this node.
    pub fn child(&self, segment: &str) -> StoreResult<Self> {
        validate_segment(segment).map_err(|reason| StoreError::InvalidPath {
            path: segment.to_string(),
            reason,
        })?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// The parent address, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The final path segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// All path segments, root-first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` for the root address.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

/// Segment rules shared by both backends: non-empty, no separators or NUL,
/// no `.`-prefixed names (the filesystem backend reserves those for its
/// side-car document).
fn validate_segment(seg: &str) -> Result<(), String> {
    if seg.is_empty() {
        return Err("empty segment".to_string());
    }
    if seg == "." || seg == ".." {
        return Err(format!("segment \"{seg}\" is not allowed"));
    }
    if seg.starts_with('.') {
        return Err(format!("segment \"{seg}\" starts with a reserved '.'"));
    }
    if seg.contains('/') || seg.contains('\\') || seg.contains('\0') {
        return Err(format!("segment \"{seg}\" contains a separator or NUL"));
    }
    Ok(())
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for seg in &self.segments {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({self})")
    }
}
