//! Slash-delimited coordination-tree paths.

use std::fmt;

use cfgtree_core::Target;

use crate::error::TreeError;

/// Absolute, normalised node path: `/` or `/a/b/c` with no empty, `.` or
/// `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self {
        NodePath("/".to_string())
    }

    /// Parse `raw`; the leading `/` is optional and one trailing `/` is ignored.
    pub fn parse(raw: &str) -> Result<Self, TreeError> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(NodePath::root());
        }
        let mut path = NodePath::root();
        for segment in trimmed.split('/') {
            path = path.child(segment).map_err(|e| match e {
                TreeError::InvalidPath { reason, .. } => TreeError::InvalidPath {
                    path: raw.to_string(),
                    reason,
                },
                other => other,
            })?;
        }
        Ok(path)
    }

    /// `/<app>/<env>/<deployment>`.
    pub fn for_target(target: &Target) -> Result<Self, TreeError> {
        let mut path = NodePath::root();
        for segment in target.segments() {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    /// Append one segment.
    pub fn child(&self, segment: &str) -> Result<Self, TreeError> {
        if let Some(reason) = segment_problem(segment) {
            return Err(TreeError::InvalidPath {
                path: format!("{}/{}", self.0.trim_end_matches('/'), segment),
                reason: reason.to_string(),
            });
        }
        if self.is_root() {
            Ok(NodePath(format!("/{segment}")))
        } else {
            Ok(NodePath(format!("{}/{segment}", self.0)))
        }
    }

    /// Append a relative `a/b/c` path.
    pub fn join(&self, relative: &str) -> Result<Self, TreeError> {
        if relative.is_empty() || relative.starts_with('/') {
            return Err(TreeError::InvalidPath {
                path: relative.to_string(),
                reason: "expected a non-empty relative path".to_string(),
            });
        }
        let mut path = self.clone();
        for segment in relative.split('/') {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(NodePath::root()),
            Some(idx) => Some(NodePath(self.0[..idx].to_string())),
        }
    }

    /// Last segment; empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Every non-root prefix of this path, root to leaf, ending with `self`.
    pub fn lineage(&self) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut current = NodePath::root();
        for segment in self.0.split('/').filter(|s| !s.is_empty()) {
            current = if current.is_root() {
                NodePath(format!("/{segment}"))
            } else {
                NodePath(format!("{}/{segment}", current.0))
            };
            out.push(current.clone());
        }
        out
    }

    /// True if `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &NodePath) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn segment_problem(segment: &str) -> Option<&'static str> {
    if segment.is_empty() {
        Some("empty path segment")
    } else if segment == "." || segment == ".." {
        Some("relative path segment")
    } else if segment.contains('/') {
        Some("segment contains '/'")
    } else if segment.chars().any(char::is_control) {
        Some("segment contains control characters")
    } else {
        None
    }
}
