//! Run pipelines shared by every CLI command that touches the tree or disk.
//!
//! Each run walks a fixed sequence of [`Stage`]s and stops at the first
//! failure, reporting the stage it was trying to reach. Registry and render
//! failures always happen before anything is written.

use std::path::{Path, PathBuf};

use cfgtree_core::{
    acl, environment, AccessControlEntrySet, AclDocument, AppName, CoordinatorConfig,
    DeploymentName, EnvName, ResolvedEnvironment, Target,
};
use cfgtree_renderer::{RenderedArtifact, TemplateSet};

use crate::diff::{diff_tree, NodeDiff};
use crate::emitter::{emit, FileWriteResult};
use crate::error::{FailureKind, PipelineError, Stage, SyncError, TreeError};
use crate::path::NodePath;
use crate::synchronizer::{sync_hosts, write_settings, SyncOptions, WriteResult};
use crate::tree::TreeSession;

/// Inputs of one run. Paths are used as given; nothing is cached between runs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub environments: PathBuf,
    pub acl: PathBuf,
    pub templates: PathBuf,
    /// Render only these templates, in this order. `None` renders all.
    pub template_names: Option<Vec<String>>,
    pub app: AppName,
    /// `None` scans every environment for the deployment.
    pub env: Option<EnvName>,
    pub deployment: DeploymentName,
    /// Host checked against the ACL document before any tree access.
    pub current_host: String,
    pub coordinator: CoordinatorConfig,
    pub hosts_node: String,
    pub dry_run: bool,
}

impl RunRequest {
    fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            hosts_node: self.hosts_node.clone(),
        }
    }
}

/// Result of a `props` or `hosts` run.
#[derive(Debug)]
pub struct TreeRunReport {
    pub target: Target,
    /// Stages reached, in order, ending with [`Stage::Done`].
    pub stages: Vec<Stage>,
    pub writes: Vec<WriteResult>,
}

#[derive(Debug)]
pub struct FilesRunReport {
    pub target: Target,
    pub stages: Vec<Stage>,
    pub files: Vec<FileWriteResult>,
}

#[derive(Debug)]
pub struct DiffRunReport {
    pub target: Target,
    pub stages: Vec<Stage>,
    pub diffs: Vec<NodeDiff>,
}

// ---------------------------------------------------------------------------
// Stage tracking
// ---------------------------------------------------------------------------

struct Run {
    stage: Stage,
    reached: Vec<Stage>,
}

impl Run {
    fn new() -> Self {
        Run {
            stage: Stage::Idle,
            reached: Vec::new(),
        }
    }

    /// Attempt the transition to `next`.
    fn step<T>(
        &mut self,
        next: Stage,
        work: impl FnOnce() -> Result<T, FailureKind>,
    ) -> Result<T, PipelineError> {
        match work() {
            Ok(value) => {
                tracing::info!("{} -> {}", self.stage, next);
                self.stage = next;
                self.reached.push(next);
                Ok(value)
            }
            Err(kind) => {
                tracing::error!("{} failed: {kind}", next.action());
                Err(PipelineError { stage: next, kind })
            }
        }
    }

    fn finish(mut self) -> Vec<Stage> {
        tracing::info!("{} -> {}", self.stage, Stage::Done);
        self.reached.push(Stage::Done);
        self.reached
    }
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

fn resolve_target(request: &RunRequest) -> Result<ResolvedEnvironment, FailureKind> {
    let doc = environment::load_at(&request.environments)?;
    Ok(environment::resolve(
        &doc,
        &request.app,
        request.env.as_ref(),
        &request.deployment,
    )?)
}

fn check_admin(
    request: &RunRequest,
    target: &Target,
) -> Result<(AclDocument, AccessControlEntrySet), FailureKind> {
    let doc = acl::load_at(&request.acl)?;
    if !acl::can_administer(&doc, &request.current_host) {
        return Err(FailureKind::PermissionDenied {
            host: request.current_host.clone(),
            target: target.clone(),
        });
    }
    let entries = acl::compute_acl(&doc, target);
    Ok((doc, entries))
}

fn render(request: &RunRequest, env: &ResolvedEnvironment) -> Result<Vec<RenderedArtifact>, FailureKind> {
    let set = TemplateSet::load(&request.templates, request.template_names.as_deref())?;
    Ok(set.render(env)?)
}

fn base_path(target: &Target) -> Result<NodePath, FailureKind> {
    NodePath::for_target(target).map_err(|err| FailureKind::Tree(SyncError::Tree(err)))
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// Render the target's templates and merge them into the tree.
///
/// `connect` is only called once the current host has passed the admin gate.
pub fn run_props<S, F>(request: &RunRequest, connect: F) -> Result<TreeRunReport, PipelineError>
where
    S: TreeSession,
    F: FnOnce(&CoordinatorConfig) -> Result<S, TreeError>,
{
    let mut run = Run::new();
    let env = run.step(Stage::EnvironmentsResolved, || resolve_target(request))?;
    let target = env.target().clone();
    let (_, entries) = run.step(Stage::AclChecked, || check_admin(request, &target))?;
    let mut session = run.step(Stage::Connected, || {
        connect(&request.coordinator).map_err(FailureKind::Connect)
    })?;
    let artifacts = run.step(Stage::SettingsRendered, || render(request, &env))?;
    let writes = run.step(Stage::TreeSynced, || {
        let base = base_path(&target)?;
        let report = write_settings(&mut session, &base, &artifacts, &entries, &request.sync_options());
        if report.is_clean() {
            Ok(report.writes)
        } else {
            Err(FailureKind::Sync {
                writes: report.writes,
                failures: report.failures,
            })
        }
    })?;

    Ok(TreeRunReport {
        target,
        stages: run.finish(),
        writes,
    })
}

/// Rewrite the target's host-list subtree from the ACL document.
pub fn run_hosts<S, F>(request: &RunRequest, connect: F) -> Result<TreeRunReport, PipelineError>
where
    S: TreeSession,
    F: FnOnce(&CoordinatorConfig) -> Result<S, TreeError>,
{
    let mut run = Run::new();
    let env = run.step(Stage::EnvironmentsResolved, || resolve_target(request))?;
    let target = env.target().clone();
    let (doc, entries) = run.step(Stage::AclChecked, || check_admin(request, &target))?;
    let mut session = run.step(Stage::Connected, || {
        connect(&request.coordinator).map_err(FailureKind::Connect)
    })?;
    let writes = run.step(Stage::TreeSynced, || {
        let base = base_path(&target)?;
        sync_hosts(&mut session, &base, &doc, &entries, &request.sync_options())
            .map(|report| report.writes)
            .map_err(FailureKind::Tree)
    })?;

    Ok(TreeRunReport {
        target,
        stages: run.finish(),
        writes,
    })
}

/// Render the target's templates into `dest`. No ACL or tree access.
pub fn run_files(request: &RunRequest, dest: &Path) -> Result<FilesRunReport, PipelineError> {
    let mut run = Run::new();
    let env = run.step(Stage::EnvironmentsResolved, || resolve_target(request))?;
    let artifacts = run.step(Stage::SettingsRendered, || render(request, &env))?;
    let files = run.step(Stage::FilesEmitted, || {
        emit(&artifacts, dest, request.dry_run).map_err(FailureKind::Tree)
    })?;

    Ok(FilesRunReport {
        target: env.target().clone(),
        stages: run.finish(),
        files,
    })
}

/// Show how the tree differs from what [`run_props`] would write.
pub fn run_diff<S, F>(request: &RunRequest, connect: F) -> Result<DiffRunReport, PipelineError>
where
    S: TreeSession,
    F: FnOnce(&CoordinatorConfig) -> Result<S, TreeError>,
{
    let mut run = Run::new();
    let env = run.step(Stage::EnvironmentsResolved, || resolve_target(request))?;
    let target = env.target().clone();
    let artifacts = run.step(Stage::SettingsRendered, || render(request, &env))?;
    let mut session = run.step(Stage::Connected, || {
        connect(&request.coordinator).map_err(FailureKind::Connect)
    })?;
    let diffs = run.step(Stage::Done, || {
        let base = base_path(&target)?;
        diff_tree(&mut session, &base, &artifacts).map_err(FailureKind::Tree)
    })?;

    Ok(DiffRunReport {
        target,
        stages: run.reached,
        diffs,
    })
}
