//! Unified diff between the tree and what `props` would write.

use similar::TextDiff;

use cfgtree_renderer::RenderedArtifact;

use crate::error::SyncError;
use crate::path::NodePath;
use crate::tree::TreeSession;

/// A single artifact whose node content differs from the rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDiff {
    pub artifact: String,
    pub path: NodePath,
    pub unified_diff: String,
}

/// Compare each artifact against the node at `base/<name>`; a missing node
/// diffs as empty. Nothing is written.
pub fn diff_tree<S: TreeSession + ?Sized>(
    session: &mut S,
    base: &NodePath,
    artifacts: &[RenderedArtifact],
) -> Result<Vec<NodeDiff>, SyncError> {
    let mut diffs = Vec::new();
    for artifact in artifacts {
        let path = base
            .join(&artifact.name)
            .map_err(|err| SyncError::InvalidName {
                artifact: artifact.name.clone(),
                reason: err.to_string(),
            })?;
        let current = session
            .get(&path)
            .map_err(|source| SyncError::Node {
                artifact: artifact.name.clone(),
                path: path.clone(),
                source,
            })?
            .map(|node| node.data)
            .unwrap_or_default();
        if current == artifact.content {
            continue;
        }

        let existing = String::from_utf8_lossy(&current);
        let rendered = String::from_utf8_lossy(&artifact.content);
        let relative = path.as_str().trim_start_matches('/');
        let old_header = format!("a/{relative}");
        let new_header = format!("b/{relative}");
        let unified = TextDiff::from_lines(existing.as_ref(), rendered.as_ref())
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        diffs.push(NodeDiff {
            artifact: artifact.name.clone(),
            path,
            unified_diff: unified,
        });
    }
    Ok(diffs)
}
