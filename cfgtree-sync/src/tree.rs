//! The coordination-client seam: a hierarchical key-value store with
//! per-node access-control entries.
//!
//! The store never creates ancestors on its own; [`crate::synchronizer::ensure_path`]
//! does that on top of [`TreeSession::create`].

use cfgtree_core::AclEntry;

use crate::error::TreeError;
use crate::path::NodePath;

/// Snapshot of one node as returned by [`TreeSession::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub data: Vec<u8>,
    pub acl: Vec<AclEntry>,
    /// Number of direct children.
    pub children: usize,
}

/// Blocking session against a coordination tree.
pub trait TreeSession {
    /// The node at `path`, or `None` if absent.
    fn get(&mut self, path: &NodePath) -> Result<Option<Node>, TreeError>;

    /// Create `path`. Fails with `NodeExists` or `NoParent`.
    fn create(&mut self, path: &NodePath, data: &[u8], acl: &[AclEntry]) -> Result<(), TreeError>;

    /// Replace the value and ACL of an existing node. Fails with `NoNode`.
    fn write(&mut self, path: &NodePath, data: &[u8], acl: &[AclEntry]) -> Result<(), TreeError>;

    /// Remove a childless node. Fails with `NoNode` or `NotEmpty`.
    fn delete(&mut self, path: &NodePath) -> Result<(), TreeError>;

    /// Names of the direct children of `path`, sorted. Fails with `NoNode`.
    fn list_children(&mut self, path: &NodePath) -> Result<Vec<String>, TreeError>;
}

impl<T: TreeSession + ?Sized> TreeSession for &mut T {
    fn get(&mut self, path: &NodePath) -> Result<Option<Node>, TreeError> {
        (**self).get(path)
    }

    fn create(&mut self, path: &NodePath, data: &[u8], acl: &[AclEntry]) -> Result<(), TreeError> {
        (**self).create(path, data, acl)
    }

    fn write(&mut self, path: &NodePath, data: &[u8], acl: &[AclEntry]) -> Result<(), TreeError> {
        (**self).write(path, data, acl)
    }

    fn delete(&mut self, path: &NodePath) -> Result<(), TreeError> {
        (**self).delete(path)
    }

    fn list_children(&mut self, path: &NodePath) -> Result<Vec<String>, TreeError> {
        (**self).list_children(path)
    }
}
