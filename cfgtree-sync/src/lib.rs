//! # cfgtree-sync
//!
//! Coordination-tree synchronization and file emission.
//!
//! - [`tree`] — the [`TreeSession`] seam; [`memory`] and [`client`] implement it
//! - [`wire`] / [`server`] — newline-delimited JSON protocol and its server
//! - [`synchronizer`] — settings merge and authoritative host-list rewrite
//! - [`emitter`] — hash-gated atomic file writes
//! - [`diff`] — unified diff between tree content and rendered output
//! - [`pipeline`] — staged runs used by the CLI

pub mod client;
pub mod diff;
pub mod emitter;
pub mod error;
pub mod memory;
pub mod path;
pub mod pipeline;
pub mod server;
pub mod synchronizer;
pub mod tree;
pub mod wire;

pub use client::{connect, connect_with, ConnectOptions, TcpSession};
pub use diff::{diff_tree, NodeDiff};
pub use emitter::{emit, FileWriteResult};
pub use error::{FailureKind, PipelineError, Stage, SyncError, TreeError};
pub use memory::MemoryTree;
pub use path::NodePath;
pub use pipeline::{run_diff, run_files, run_hosts, run_props, RunRequest};
pub use synchronizer::{
    ensure_path, sync_hosts, write_settings, HostsReport, SettingsReport, SyncOptions, WriteResult,
};
pub use tree::{Node, TreeSession};
