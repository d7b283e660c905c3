//! `cfgtree hosts` — rewrite the host-list subtree from the ACL document.

use anyhow::{Context, Result};
use clap::Args;

use cfgtree_sync::{connect_with, run_hosts};

use super::{build_request, print_writes, CoordinatorArgs, SourceArgs, TargetArgs};

/// Arguments for `cfgtree hosts`.
#[derive(Args, Debug)]
pub struct HostsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub coordinator: CoordinatorArgs,

    /// Report what would change without writing to the tree.
    #[arg(long)]
    pub dry_run: bool,
}

impl HostsArgs {
    pub fn run(self) -> Result<()> {
        let request = build_request(
            &self.sources,
            &self.target,
            &self.coordinator,
            Vec::new(),
            self.dry_run,
        )?;
        let report = run_hosts(&request, connect_with).with_context(|| {
            format!("hosts sync failed for deployment '{}'", self.target.deployment)
        })?;

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        println!(
            "{prefix}✓ {} host list synced ({} host node operation(s))",
            report.target,
            report.writes.len()
        );
        print_writes(&report.writes);
        Ok(())
    }
}
