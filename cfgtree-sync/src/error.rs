//! Error types for cfgtree-sync.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use cfgtree_core::{RegistryError, Target};
use cfgtree_renderer::RenderError;

use crate::path::NodePath;
use crate::synchronizer::WriteResult;

/// Errors reported by a coordination-tree session.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Every connection attempt failed.
    #[error("cannot reach coordination service at {addr} after {attempts} attempt(s): {source}")]
    Connection {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// An established session broke mid-request.
    #[error("session with coordination service at {addr} lost: {source}")]
    SessionLost {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("node {path} does not exist")]
    NoNode { path: NodePath },

    #[error("node {path} already exists")]
    NodeExists { path: NodePath },

    #[error("parent of {path} does not exist")]
    NoParent { path: NodePath },

    #[error("node {path} has children")]
    NotEmpty { path: NodePath },

    #[error("invalid node path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The peer answered with something this client does not understand.
    #[error("coordination protocol error: {0}")]
    Protocol(String),

    #[error("coordination protocol JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TreeError {
    /// Stable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            TreeError::NoNode { .. } => "no_node",
            TreeError::NodeExists { .. } => "node_exists",
            TreeError::NoParent { .. } => "no_parent",
            TreeError::NotEmpty { .. } => "not_empty",
            TreeError::InvalidPath { .. } => "invalid_path",
            _ => "internal",
        }
    }
}

/// Errors from writing artifacts or hosts into the tree, or files to disk.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A single node write failed; re-running the sync is safe.
    #[error("failed to sync '{artifact}' at {path}: {source}")]
    Node {
        artifact: String,
        path: NodePath,
        #[source]
        source: TreeError,
    },

    /// The artifact's node collides with the existing tree shape.
    #[error("cannot sync '{artifact}' at {path}: {reason}")]
    PathConflict {
        artifact: String,
        path: NodePath,
        reason: String,
    },

    /// The artifact name cannot be placed under the target.
    #[error("invalid artifact name '{artifact}': {reason}")]
    InvalidName { artifact: String, reason: String },

    /// A host-list node could not be written or removed.
    #[error("failed to sync host '{host}' at {path}: {source}")]
    Host {
        host: String,
        path: NodePath,
        #[source]
        source: TreeError,
    },

    /// Session failure outside a specific artifact (e.g. listing the host subtree).
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// File emitter I/O failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Steps of a run. A run moves strictly forward through the ones it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    EnvironmentsResolved,
    AclChecked,
    Connected,
    SettingsRendered,
    TreeSynced,
    FilesEmitted,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Idle => "idle",
            Stage::EnvironmentsResolved => "environments resolved",
            Stage::AclChecked => "acl checked",
            Stage::Connected => "connected",
            Stage::SettingsRendered => "settings rendered",
            Stage::TreeSynced => "tree synced",
            Stage::FilesEmitted => "files emitted",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

impl Stage {
    /// What a run does to reach this stage, for error messages.
    pub fn action(self) -> &'static str {
        match self {
            Stage::Idle => "starting",
            Stage::EnvironmentsResolved => "resolving the environment",
            Stage::AclChecked => "checking host permissions",
            Stage::Connected => "connecting to the coordination service",
            Stage::SettingsRendered => "rendering templates",
            Stage::TreeSynced => "syncing the tree",
            Stage::FilesEmitted => "writing files",
            Stage::Done => "finishing",
        }
    }
}

/// A run that stopped before reaching `stage`.
#[derive(Debug, Error)]
#[error("{} failed", action_of(.stage))]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub kind: FailureKind,
}

/// What went wrong in a [`PipelineError`].
#[derive(Debug, Error)]
pub enum FailureKind {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// The current host is not an administrator in the ACL document.
    #[error("host '{host}' is not authorized to administer {target}")]
    PermissionDenied { host: String, target: Target },

    #[error(transparent)]
    Connect(TreeError),

    /// Some artifacts were written, others failed. `writes` lists the successes.
    #[error("{}", sync_summary(.writes, .failures))]
    Sync {
        writes: Vec<WriteResult>,
        failures: Vec<SyncError>,
    },

    #[error(transparent)]
    Tree(SyncError),
}

fn sync_summary(writes: &[WriteResult], failures: &[SyncError]) -> String {
    let total = writes.len() + failures.len();
    match failures.first() {
        Some(first) => format!(
            "{} of {total} artifact(s) failed to sync; first: {first}",
            failures.len()
        ),
        None => format!("0 of {total} artifact(s) failed to sync"),
    }
}

fn action_of(stage: &Stage) -> &'static str {
    stage.action()
}
