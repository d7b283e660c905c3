//! Settings and host-list writes into the coordination tree.
//!
//! The two write paths stay separate. Settings are merged in: nodes the
//! artifacts do not name are never touched. The host list is authoritative:
//! every host node missing from the ACL document is removed.

use std::collections::BTreeMap;

use cfgtree_core::{AccessControlEntrySet, AclDocument, AclEntry};
use cfgtree_renderer::RenderedArtifact;

use crate::error::{SyncError, TreeError};
use crate::path::NodePath;
use crate::tree::{Node, TreeSession};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one node operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Node did not exist and was created with the new value.
    Created { path: NodePath },
    /// Node existed with a different value or ACL and was overwritten.
    Updated { path: NodePath },
    /// Node already holds the same value and ACL.
    Unchanged { path: NodePath },
    /// `--dry-run`: the node would have been created or overwritten.
    WouldWrite { path: NodePath },
    /// Stale host node removed.
    Deleted { path: NodePath },
    /// `--dry-run`: the stale host node would have been removed.
    WouldDelete { path: NodePath },
}

impl WriteResult {
    pub fn path(&self) -> &NodePath {
        match self {
            WriteResult::Created { path }
            | WriteResult::Updated { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path }
            | WriteResult::Deleted { path }
            | WriteResult::WouldDelete { path } => path,
        }
    }

    /// True for anything but `Unchanged`.
    pub fn is_change(&self) -> bool {
        !matches!(self, WriteResult::Unchanged { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            WriteResult::Created { .. } => "created",
            WriteResult::Updated { .. } => "updated",
            WriteResult::Unchanged { .. } => "unchanged",
            WriteResult::WouldWrite { .. } => "would write",
            WriteResult::Deleted { .. } => "deleted",
            WriteResult::WouldDelete { .. } => "would delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Name of the host-list node under the deployment path.
    pub hosts_node: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            dry_run: false,
            hosts_node: "hosts".to_string(),
        }
    }
}

/// Result of [`write_settings`]. `writes` and `failures` together cover every artifact.
#[derive(Debug, Default)]
pub struct SettingsReport {
    pub writes: Vec<WriteResult>,
    pub failures: Vec<SyncError>,
}

impl SettingsReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostsReport {
    pub writes: Vec<WriteResult>,
}

// ---------------------------------------------------------------------------
// ensure_path
// ---------------------------------------------------------------------------

/// Create every missing node from the root down to and including `path`,
/// with empty content and `acl`. Returns the nodes it created.
pub fn ensure_path<S: TreeSession + ?Sized>(
    session: &mut S,
    path: &NodePath,
    acl: &[AclEntry],
) -> Result<Vec<NodePath>, TreeError> {
    let mut created = Vec::new();
    for node in path.lineage() {
        if session.get(&node)?.is_some() {
            continue;
        }
        match session.create(&node, b"", acl) {
            Ok(()) => {
                tracing::debug!("created {node}");
                created.push(node);
            }
            // Someone else created it between our get and create.
            Err(TreeError::NodeExists { .. }) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(created)
}

// ---------------------------------------------------------------------------
// write_settings
// ---------------------------------------------------------------------------

/// Write each artifact to `base/<name>` with the target's ACL.
///
/// Artifacts are independent: a failure is recorded and the rest are still
/// attempted. Re-running with the same input is safe.
pub fn write_settings<S: TreeSession + ?Sized>(
    session: &mut S,
    base: &NodePath,
    artifacts: &[RenderedArtifact],
    acl: &AccessControlEntrySet,
    options: &SyncOptions,
) -> SettingsReport {
    let mut report = SettingsReport::default();
    for artifact in artifacts {
        match write_artifact(session, base, artifact, acl.entries(), options) {
            Ok(result) => report.writes.push(result),
            Err(err) => {
                tracing::error!("{err}");
                report.failures.push(err);
            }
        }
    }
    report
}

fn write_artifact<S: TreeSession + ?Sized>(
    session: &mut S,
    base: &NodePath,
    artifact: &RenderedArtifact,
    acl: &[AclEntry],
    options: &SyncOptions,
) -> Result<WriteResult, SyncError> {
    let path = base
        .join(&artifact.name)
        .map_err(|err| SyncError::InvalidName {
            artifact: artifact.name.clone(),
            reason: err.to_string(),
        })?;
    let node_err = |source: TreeError| SyncError::Node {
        artifact: artifact.name.clone(),
        path: path.clone(),
        source,
    };
    let conflict = |reason: String| SyncError::PathConflict {
        artifact: artifact.name.clone(),
        path: path.clone(),
        reason,
    };

    if artifact.name.split('/').next() == Some(options.hosts_node.as_str()) {
        return Err(conflict(format!(
            "'{}' is reserved for the host list",
            options.hosts_node
        )));
    }

    for ancestor in path.lineage() {
        if ancestor == path || !ancestor.is_descendant_of(base) {
            continue;
        }
        if let Some(node) = session.get(&ancestor).map_err(node_err)? {
            if !node.data.is_empty() {
                return Err(conflict(format!("ancestor {ancestor} already holds a value")));
            }
        }
    }

    let existing = session.get(&path).map_err(node_err)?;
    if let Some(node) = &existing {
        if node.children > 0 {
            return Err(conflict("node already has children".to_string()));
        }
    }

    put_node(session, &path, existing, &artifact.content, acl, options.dry_run).map_err(node_err)
}

/// Create or overwrite one leaf whose current state is `existing`.
fn put_node<S: TreeSession + ?Sized>(
    session: &mut S,
    path: &NodePath,
    existing: Option<Node>,
    data: &[u8],
    acl: &[AclEntry],
    dry_run: bool,
) -> Result<WriteResult, TreeError> {
    let path = path.clone();
    if let Some(node) = &existing {
        if node.data == data && node.acl == acl {
            tracing::debug!("unchanged: {path}");
            return Ok(WriteResult::Unchanged { path });
        }
    }

    if dry_run {
        tracing::info!("[dry-run] would write: {path}");
        return Ok(WriteResult::WouldWrite { path });
    }

    if existing.is_some() {
        session.write(&path, data, acl)?;
        tracing::info!("updated: {path}");
        return Ok(WriteResult::Updated { path });
    }

    if let Some(parent) = path.parent() {
        ensure_path(session, &parent, acl)?;
    }
    match session.create(&path, data, acl) {
        Ok(()) => {
            tracing::info!("created: {path}");
            Ok(WriteResult::Created { path })
        }
        Err(TreeError::NodeExists { .. }) => {
            session.write(&path, data, acl)?;
            tracing::info!("updated: {path}");
            Ok(WriteResult::Updated { path })
        }
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// sync_hosts
// ---------------------------------------------------------------------------

/// Rewrite `base/<hosts_node>` so it holds exactly one node per host in `doc`,
/// each containing the host's permission descriptor.
///
/// Stops at the first failure.
pub fn sync_hosts<S: TreeSession + ?Sized>(
    session: &mut S,
    base: &NodePath,
    doc: &AclDocument,
    acl: &AccessControlEntrySet,
    options: &SyncOptions,
) -> Result<HostsReport, SyncError> {
    let hosts_path = base.child(&options.hosts_node)?;
    let entries = acl.entries();

    let desired: BTreeMap<&str, String> = doc
        .hosts()
        .map(|(host, permission)| (host, permission.describe()))
        .collect();

    let mut report = HostsReport::default();

    let existing = match session.get(&hosts_path)? {
        Some(node) => {
            if node.acl != entries {
                if options.dry_run {
                    tracing::info!("[dry-run] would update acl: {hosts_path}");
                    report.writes.push(WriteResult::WouldWrite {
                        path: hosts_path.clone(),
                    });
                } else {
                    session.write(&hosts_path, &node.data, entries)?;
                    tracing::info!("updated acl: {hosts_path}");
                    report.writes.push(WriteResult::Updated {
                        path: hosts_path.clone(),
                    });
                }
            }
            session.list_children(&hosts_path)?
        }
        None => {
            if !options.dry_run {
                ensure_path(session, &hosts_path, entries)?;
            }
            Vec::new()
        }
    };

    for (host, descriptor) in &desired {
        let host_err = |path: &NodePath, source: TreeError| SyncError::Host {
            host: host.to_string(),
            path: path.clone(),
            source,
        };
        let path = hosts_path
            .child(host)
            .map_err(|source| host_err(&hosts_path, source))?;
        let current = session.get(&path).map_err(|source| host_err(&path, source))?;
        let result = put_node(
            session,
            &path,
            current,
            descriptor.as_bytes(),
            entries,
            options.dry_run,
        )
        .map_err(|source| host_err(&path, source))?;
        report.writes.push(result);
    }

    for stale in existing.iter().filter(|name| !desired.contains_key(name.as_str())) {
        let path = hosts_path.child(stale)?;
        if options.dry_run {
            tracing::info!("[dry-run] would delete: {path}");
            report.writes.push(WriteResult::WouldDelete { path });
            continue;
        }
        let removed = delete_recursive(session, &path).map_err(|source| SyncError::Host {
            host: stale.clone(),
            path: path.clone(),
            source,
        })?;
        report
            .writes
            .extend(removed.into_iter().map(|path| WriteResult::Deleted { path }));
    }

    Ok(report)
}

/// Delete `path` and everything below it, deepest first.
fn delete_recursive<S: TreeSession + ?Sized>(
    session: &mut S,
    path: &NodePath,
) -> Result<Vec<NodePath>, TreeError> {
    let mut removed = Vec::new();
    for child in session.list_children(path)? {
        removed.extend(delete_recursive(session, &path.child(&child)?)?);
    }
    match session.delete(path) {
        Ok(()) | Err(TreeError::NoNode { .. }) => {}
        Err(err) => return Err(err),
    }
    tracing::info!("deleted: {path}");
    removed.push(path.clone());
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTree;
    use cfgtree_core::{acl, Target};
    use std::path::Path;

    fn target() -> Target {
        Target::new("myapp".into(), "prod".into(), "web".into()).unwrap()
    }

    fn base() -> NodePath {
        NodePath::for_target(&target()).unwrap()
    }

    fn acl_doc(text: &str) -> AclDocument {
        acl::parse(text, Path::new("hosts.properties")).unwrap()
    }

    fn artifact(name: &str, content: &str) -> RenderedArtifact {
        RenderedArtifact {
            name: name.to_string(),
            content: content.as_bytes().to_vec(),
        }
    }

    fn p(raw: &str) -> NodePath {
        NodePath::parse(raw).unwrap()
    }

    #[test]
    fn ensure_path_creates_missing_ancestors_once() {
        let mut tree = MemoryTree::new();
        let created = ensure_path(&mut tree, &p("/a/b/c"), &[]).unwrap();
        assert_eq!(created.len(), 3);
        let created = ensure_path(&mut tree, &p("/a/b/c"), &[]).unwrap();
        assert!(created.is_empty());
        assert_eq!(tree.get(&p("/a/b")).unwrap().unwrap().data, b"");
    }

    #[test]
    fn write_settings_creates_then_reports_unchanged() {
        let mut tree = MemoryTree::new();
        let doc = acl_doc("ops1 = admin,all\n");
        let entries = acl::compute_acl(&doc, &target());
        let artifacts = vec![artifact("conn.txt", "db1:5432")];

        let first = write_settings(&mut tree, &base(), &artifacts, &entries, &SyncOptions::default());
        assert!(first.is_clean());
        assert!(matches!(first.writes[0], WriteResult::Created { .. }));
        assert_eq!(
            tree.acl_of(&p("/myapp/prod/web/conn.txt")).unwrap(),
            entries.entries()
        );

        let second = write_settings(&mut tree, &base(), &artifacts, &entries, &SyncOptions::default());
        assert!(matches!(second.writes[0], WriteResult::Unchanged { .. }));
    }

    #[test]
    fn changed_acl_rewrites_node() {
        let mut tree = MemoryTree::new();
        let artifacts = vec![artifact("conn.txt", "db1:5432")];
        let before = acl::compute_acl(&acl_doc("ops1 = admin\n"), &target());
        let after = acl::compute_acl(&acl_doc("ops1 = admin\nops2 = read\n"), &target());

        write_settings(&mut tree, &base(), &artifacts, &before, &SyncOptions::default());
        let report = write_settings(&mut tree, &base(), &artifacts, &after, &SyncOptions::default());
        assert!(matches!(report.writes[0], WriteResult::Updated { .. }));
        assert_eq!(tree.acl_of(&p("/myapp/prod/web/conn.txt")).unwrap().len(), 2);
    }

    #[test]
    fn failures_do_not_stop_other_artifacts() {
        let mut tree = MemoryTree::new();
        let entries = acl::compute_acl(&acl_doc(""), &target());
        let artifacts = vec![
            artifact("a", "leaf"),
            artifact("a/b", "under a value"),
            artifact("c", "fine"),
        ];
        let report = write_settings(&mut tree, &base(), &artifacts, &entries, &SyncOptions::default());
        assert_eq!(report.writes.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], SyncError::PathConflict { .. }));
        assert!(tree.get(&p("/myapp/prod/web/a/b")).unwrap().is_none());
        assert_eq!(tree.get(&p("/myapp/prod/web/c")).unwrap().unwrap().data, b"fine");
    }

    #[test]
    fn node_with_children_is_a_conflict() {
        let mut tree = MemoryTree::new();
        ensure_path(&mut tree, &p("/myapp/prod/web/conf/inner"), &[]).unwrap();
        let entries = acl::compute_acl(&acl_doc(""), &target());
        let report = write_settings(
            &mut tree,
            &base(),
            &[artifact("conf", "value")],
            &entries,
            &SyncOptions::default(),
        );
        assert!(matches!(report.failures[0], SyncError::PathConflict { .. }));
    }

    #[test]
    fn host_list_name_is_reserved_for_settings() {
        let mut tree = MemoryTree::new();
        let entries = acl::compute_acl(&acl_doc(""), &target());
        let report = write_settings(
            &mut tree,
            &base(),
            &[artifact("hosts/x", "v")],
            &entries,
            &SyncOptions::default(),
        );
        assert!(matches!(report.failures[0], SyncError::PathConflict { .. }));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let mut tree = MemoryTree::new();
        let entries = acl::compute_acl(&acl_doc(""), &target());
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let report = write_settings(&mut tree, &base(), &[artifact("a.txt", "x")], &entries, &options);
        assert!(matches!(report.writes[0], WriteResult::WouldWrite { .. }));
        assert!(tree.is_empty());
    }

    #[test]
    fn settings_sync_leaves_unrelated_nodes_alone() {
        let mut tree = MemoryTree::new();
        ensure_path(&mut tree, &p("/myapp/prod/web/manual"), &[]).unwrap();
        let entries = acl::compute_acl(&acl_doc(""), &target());
        write_settings(&mut tree, &base(), &[artifact("a.txt", "x")], &entries, &SyncOptions::default());
        assert!(tree.get(&p("/myapp/prod/web/manual")).unwrap().is_some());
    }

    #[test]
    fn sync_hosts_writes_descriptors_and_removes_stale_hosts() {
        let mut tree = MemoryTree::new();
        let options = SyncOptions::default();
        let first = acl_doc("a = admin\nb = read\nc = read,write\n");
        let entries = acl::compute_acl(&first, &target());
        sync_hosts(&mut tree, &base(), &first, &entries, &options).unwrap();
        ensure_path(&mut tree, &p("/myapp/prod/web/hosts/b/nested"), &[]).unwrap();

        let second = acl_doc("a = admin\nc = read,write\n");
        let entries = acl::compute_acl(&second, &target());
        let report = sync_hosts(&mut tree, &base(), &second, &entries, &options).unwrap();

        let hosts = tree.list_children(&p("/myapp/prod/web/hosts")).unwrap();
        assert_eq!(hosts, vec!["a".to_string(), "c".to_string()]);
        assert!(report
            .writes
            .contains(&WriteResult::Deleted { path: p("/myapp/prod/web/hosts/b") }));
        assert_eq!(
            tree.get(&p("/myapp/prod/web/hosts/c")).unwrap().unwrap().data,
            b"read,write"
        );
    }

    #[test]
    fn sync_hosts_refreshes_hosts_node_acl() {
        let mut tree = MemoryTree::new();
        let options = SyncOptions::default();
        let first = acl_doc("a = admin\n");
        sync_hosts(&mut tree, &base(), &first, &acl::compute_acl(&first, &target()), &options)
            .unwrap();

        let second = acl_doc("a = admin\nb = read\n");
        let entries = acl::compute_acl(&second, &target());
        let report = sync_hosts(&mut tree, &base(), &second, &entries, &options).unwrap();

        let hosts_node = p("/myapp/prod/web/hosts");
        assert_eq!(tree.acl_of(&hosts_node), Some(entries.entries()));
        assert!(report
            .writes
            .contains(&WriteResult::Updated { path: hosts_node.clone() }));

        let again = sync_hosts(&mut tree, &base(), &second, &entries, &options).unwrap();
        assert!(!again.writes.iter().any(|w| w.path() == &hosts_node));
    }

    #[test]
    fn sync_hosts_dry_run_reports_without_touching_tree() {
        let mut tree = MemoryTree::new();
        let doc = acl_doc("a = admin\n");
        let entries = acl::compute_acl(&doc, &target());
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let report = sync_hosts(&mut tree, &base(), &doc, &entries, &options).unwrap();
        assert_eq!(
            report.writes,
            vec![WriteResult::WouldWrite { path: p("/myapp/prod/web/hosts/a") }]
        );
        assert!(tree.is_empty());
    }
}
