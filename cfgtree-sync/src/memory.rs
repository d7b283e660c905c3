//! In-process coordination tree. Backs `cfgtree serve` and the test suites.

use std::collections::{BTreeMap, BTreeSet};

use cfgtree_core::AclEntry;

use crate::error::TreeError;
use crate::path::NodePath;
use crate::tree::{Node, TreeSession};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MemNode {
    data: Vec<u8>,
    acl: Vec<AclEntry>,
    children: BTreeSet<String>,
}

/// A tree held entirely in memory. The root always exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTree {
    nodes: BTreeMap<NodePath, MemNode>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(NodePath::root(), MemNode::default());
        MemoryTree { nodes }
    }

    /// Every non-root node with its value, keyed by path string.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.nodes
            .iter()
            .filter(|(path, _)| !path.is_root())
            .map(|(path, node)| (path.to_string(), node.data.clone()))
            .collect()
    }

    /// ACL of the node at `path`, if present.
    pub fn acl_of(&self, path: &NodePath) -> Option<&[AclEntry]> {
        self.nodes.get(path).map(|node| node.acl.as_slice())
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }
}

impl TreeSession for MemoryTree {
    fn get(&mut self, path: &NodePath) -> Result<Option<Node>, TreeError> {
        Ok(self.nodes.get(path).map(|node| Node {
            data: node.data.clone(),
            acl: node.acl.clone(),
            children: node.children.len(),
        }))
    }

    fn create(&mut self, path: &NodePath, data: &[u8], acl: &[AclEntry]) -> Result<(), TreeError> {
        if self.nodes.contains_key(path) {
            return Err(TreeError::NodeExists { path: path.clone() });
        }
        let Some(parent) = path.parent() else {
            return Err(TreeError::NodeExists { path: path.clone() });
        };
        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            return Err(TreeError::NoParent { path: path.clone() });
        };
        parent_node.children.insert(path.name().to_string());
        self.nodes.insert(
            path.clone(),
            MemNode {
                data: data.to_vec(),
                acl: acl.to_vec(),
                children: BTreeSet::new(),
            },
        );
        Ok(())
    }

    fn write(&mut self, path: &NodePath, data: &[u8], acl: &[AclEntry]) -> Result<(), TreeError> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| TreeError::NoNode { path: path.clone() })?;
        node.data = data.to_vec();
        node.acl = acl.to_vec();
        Ok(())
    }

    fn delete(&mut self, path: &NodePath) -> Result<(), TreeError> {
        let Some(parent) = path.parent() else {
            return Err(TreeError::InvalidPath {
                path: path.to_string(),
                reason: "the root cannot be deleted".to_string(),
            });
        };
        match self.nodes.get(path) {
            None => return Err(TreeError::NoNode { path: path.clone() }),
            Some(node) if !node.children.is_empty() => {
                return Err(TreeError::NotEmpty { path: path.clone() })
            }
            Some(_) => {}
        }
        self.nodes.remove(path);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.remove(path.name());
        }
        Ok(())
    }

    fn list_children(&mut self, path: &NodePath) -> Result<Vec<String>, TreeError> {
        self.nodes
            .get(path)
            .map(|node| node.children.iter().cloned().collect())
            .ok_or_else(|| TreeError::NoNode { path: path.clone() })
    }
}
