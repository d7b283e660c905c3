//! `cfgtree props` — render settings and merge them into the coordination tree.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use cfgtree_sync::{connect_with, run_props, FailureKind, WriteResult};

use super::{build_request, print_writes, CoordinatorArgs, SourceArgs, TargetArgs};

/// Arguments for `cfgtree props`.
#[derive(Args, Debug)]
pub struct PropsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub coordinator: CoordinatorArgs,

    /// Templates to render, in order (default: every template in the directory).
    pub names: Vec<String>,

    /// Report what would change without writing to the tree.
    #[arg(long)]
    pub dry_run: bool,
}

impl PropsArgs {
    pub fn run(self) -> Result<()> {
        let request = build_request(
            &self.sources,
            &self.target,
            &self.coordinator,
            self.names,
            self.dry_run,
        )?;

        let report = match run_props(&request, connect_with) {
            Ok(report) => report,
            Err(err) => {
                if let FailureKind::Sync { writes, failures } = &err.kind {
                    print_writes(writes);
                    for failure in failures {
                        eprintln!("  {}  {failure}", "✗".red().bold());
                    }
                    eprintln!("Re-run `cfgtree props` once the cause is fixed; writes are idempotent.");
                }
                return Err(anyhow::Error::new(err)
                    .context(format!("props failed for deployment '{}'", self.target.deployment)));
            }
        };

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        let changed = report.writes.iter().filter(|w| w.is_change()).count();
        let unchanged = report
            .writes
            .iter()
            .filter(|w| matches!(w, WriteResult::Unchanged { .. }))
            .count();
        println!(
            "{prefix}✓ {} synced ({changed} changed, {unchanged} unchanged)",
            report.target
        );
        print_writes(&report.writes);
        Ok(())
    }
}
