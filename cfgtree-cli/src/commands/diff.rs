//! `cfgtree diff` — show unified diffs for what `props` would write.

use anyhow::{Context, Result};
use clap::Args;

use cfgtree_sync::{connect_with, run_diff};

use super::{build_request, CoordinatorArgs, SourceArgs, TargetArgs};

/// Arguments for `cfgtree diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub coordinator: CoordinatorArgs,

    /// Templates to render (default: every template in the directory).
    pub names: Vec<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let request = build_request(
            &self.sources,
            &self.target,
            &self.coordinator,
            self.names,
            true,
        )?;
        let report = run_diff(&request, connect_with).with_context(|| {
            format!("diff failed for deployment '{}'", self.target.deployment)
        })?;

        if report.diffs.is_empty() {
            println!("No differences for {}.", report.target);
            return Ok(());
        }

        for diff in report.diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
