//! Subcommand implementations and the argument groups they share.

pub mod diff;
pub mod files;
pub mod hosts;
pub mod list;
pub mod props;
pub mod serve;
pub mod show;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use cfgtree_core::{config, AppName, DeploymentName, EnvName, ToolConfig};
use cfgtree_sync::{RunRequest, WriteResult};

// ---------------------------------------------------------------------------
// Shared argument groups
// ---------------------------------------------------------------------------

/// Input documents. Unset flags fall back to `~/.cfgtree/config.yaml`.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Environment document (YAML: env → deployment → settings).
    #[arg(long, short = 'e', value_name = "FILE")]
    pub environments: Option<PathBuf>,

    /// Host-permission property file.
    #[arg(long, value_name = "FILE")]
    pub acl: Option<PathBuf>,

    /// Template directory.
    #[arg(long, short = 't', value_name = "DIR")]
    pub templates: Option<PathBuf>,
}

/// The `(app, env, deployment)` a command is aimed at.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Application name (first tree path segment).
    #[arg(long, short = 'a')]
    pub app: String,

    /// Environment; omit to find the one defining the deployment.
    #[arg(long)]
    pub env: Option<String>,

    /// Deployment name.
    #[arg(long, short = 'd')]
    pub deployment: String,
}

/// Where the coordination service lives.
#[derive(Args, Debug, Clone, Default)]
pub struct CoordinatorArgs {
    /// Coordination service host.
    #[arg(long = "server", value_name = "HOST")]
    pub server: Option<String>,

    /// Coordination service port.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Name of the host-list node under the deployment path.
    #[arg(long, value_name = "NAME")]
    pub hosts_node: Option<String>,

    /// Host name checked against the ACL document (defaults to this machine's).
    #[arg(long, value_name = "HOST")]
    pub as_host: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn load_tool_config() -> Result<ToolConfig> {
    config::load_config().context("failed to load ~/.cfgtree/config.yaml")
}

impl SourceArgs {
    pub fn environments(&self, config: &ToolConfig) -> PathBuf {
        self.environments
            .clone()
            .unwrap_or_else(|| config.environments.clone())
    }

    pub fn acl(&self, config: &ToolConfig) -> PathBuf {
        self.acl.clone().unwrap_or_else(|| config.acl.clone())
    }

    pub fn templates(&self, config: &ToolConfig) -> PathBuf {
        self.templates
            .clone()
            .unwrap_or_else(|| config.templates.clone())
    }
}

fn current_host(explicit: Option<&str>) -> Result<String> {
    if let Some(host) = explicit {
        return Ok(host.to_string());
    }
    let name = hostname::get().context("could not determine this machine's host name")?;
    Ok(name.to_string_lossy().into_owned())
}

/// Merge flags over the config file into one run request.
pub fn build_request(
    sources: &SourceArgs,
    target: &TargetArgs,
    coordinator: &CoordinatorArgs,
    template_names: Vec<String>,
    dry_run: bool,
) -> Result<RunRequest> {
    let config = load_tool_config()?;
    let mut endpoint = config.coordinator.clone();
    if let Some(server) = &coordinator.server {
        endpoint.host = server.clone();
    }
    if let Some(port) = coordinator.port {
        endpoint.port = port;
    }

    Ok(RunRequest {
        environments: sources.environments(&config),
        acl: sources.acl(&config),
        templates: sources.templates(&config),
        template_names: (!template_names.is_empty()).then_some(template_names),
        app: AppName::from(target.app.as_str()),
        env: target.env.as_deref().map(EnvName::from),
        deployment: DeploymentName::from(target.deployment.as_str()),
        current_host: current_host(coordinator.as_host.as_deref())?,
        coordinator: endpoint,
        hosts_node: coordinator
            .hosts_node
            .clone()
            .unwrap_or_else(|| config.hosts_node.clone()),
        dry_run,
    })
}

/// One line per node operation, prefixed with a change marker.
pub fn print_writes(writes: &[WriteResult]) {
    for w in writes {
        let marker = match w {
            WriteResult::Created { .. } => "+".green().bold(),
            WriteResult::Updated { .. } => "✎".yellow().bold(),
            WriteResult::Unchanged { .. } => "·".bright_black(),
            WriteResult::WouldWrite { .. } => "~".cyan(),
            WriteResult::Deleted { .. } => "-".red().bold(),
            WriteResult::WouldDelete { .. } => "~".red(),
        };
        println!("  {marker}  {}  ({})", w.path(), w.label());
    }
}
