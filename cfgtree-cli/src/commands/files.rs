//! `cfgtree files` — render settings to flat files instead of the tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use cfgtree_sync::{run_files, FileWriteResult};

use super::{build_request, CoordinatorArgs, SourceArgs, TargetArgs};

/// Arguments for `cfgtree files`.
#[derive(Args, Debug)]
pub struct FilesArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Destination directory (created if missing).
    #[arg(long, short = 'o', value_name = "DIR")]
    pub out: PathBuf,

    /// Templates to render, in order (default: every template in the directory).
    pub names: Vec<String>,

    /// Show what would be written without writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl FilesArgs {
    pub fn run(self) -> Result<()> {
        // No tree access, so the current host is irrelevant.
        let coordinator = CoordinatorArgs {
            as_host: Some(String::new()),
            ..CoordinatorArgs::default()
        };
        let request = build_request(
            &self.sources,
            &self.target,
            &coordinator,
            self.names,
            self.dry_run,
        )?;
        let report = run_files(&request, &self.out).with_context(|| {
            format!("failed to write files to '{}'", self.out.display())
        })?;

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        let written = report
            .files
            .iter()
            .filter(|r| !matches!(r, FileWriteResult::Unchanged { .. }))
            .count();
        println!(
            "{prefix}✓ {} rendered to {} ({} written, {} unchanged)",
            report.target,
            self.out.display(),
            written,
            report.files.len() - written
        );
        for r in &report.files {
            match r {
                FileWriteResult::Written { path } => println!("  ✎  {}", path.display()),
                FileWriteResult::WouldWrite { path } => println!("  ~  {}", path.display()),
                FileWriteResult::Unchanged { path } => println!("  ·  {}", path.display()),
            }
        }
        Ok(())
    }
}
