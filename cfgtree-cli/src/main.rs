//! cfgtree — distribute environment settings into a coordination tree.
//!
//! # Usage
//!
//! ```text
//! cfgtree props    -a <app> [--env <env>] -d <deployment> [<template>...] [--dry-run]
//! cfgtree hosts    -a <app> [--env <env>] -d <deployment> [--dry-run]
//! cfgtree files    -a <app> [--env <env>] -d <deployment> -o <dir> [<template>...] [--dry-run]
//! cfgtree diff     -a <app> [--env <env>] -d <deployment> [<template>...]
//! cfgtree show     -a <app> [--env <env>] -d <deployment> [--json]
//! cfgtree validate [--json]
//! cfgtree list     [--template-names] [--json]
//! cfgtree serve    [--listen <addr>]
//! ```
//!
//! Input paths and the coordination endpoint default to
//! `~/.cfgtree/config.yaml`; flags override them.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, files::FilesArgs, hosts::HostsArgs, list::ListArgs, props::PropsArgs,
    serve::ServeArgs, show::ShowArgs, validate::ValidateArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cfgtree",
    version,
    about = "Render per-deployment settings and sync them into a coordination tree",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render templates and merge the results into the tree.
    Props(PropsArgs),

    /// Rewrite the deployment's host-list subtree from the ACL document.
    Hosts(HostsArgs),

    /// Render templates into a directory instead of the tree.
    Files(FilesArgs),

    /// Show unified diff of what props would write.
    Diff(DiffArgs),

    /// Check the environment, ACL and template inputs.
    Validate(ValidateArgs),

    /// List environments and deployments, or template names.
    List(ListArgs),

    /// Print the resolved settings for a deployment.
    Show(ShowArgs),

    /// Serve an in-memory coordination tree over TCP.
    Serve(ServeArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Props(args) => args.run(),
        Commands::Hosts(args) => args.run(),
        Commands::Files(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Validate(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Show(args) => args.run(),
        Commands::Serve(args) => args.run(),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    tracing::debug!("log filter: {default}");
}
