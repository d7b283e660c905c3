//! `cfgtree show` — print the resolved settings and ACL entries for a target.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use cfgtree_core::{acl, environment, AppName, DeploymentName, EnvName};

use super::{load_tool_config, SourceArgs, TargetArgs};

/// Arguments for `cfgtree show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "value")]
    value: String,
}

#[derive(Serialize)]
struct ShowJson {
    target: String,
    settings: BTreeMap<String, String>,
    acl: Vec<String>,
}

impl ShowArgs {
    pub fn run(self) -> Result<()> {
        let config = load_tool_config()?;
        let env_path = self.sources.environments(&config);
        let doc = environment::load_at(&env_path)
            .with_context(|| format!("failed to load environments from '{}'", env_path.display()))?;
        let resolved = environment::resolve(
            &doc,
            &AppName::from(self.target.app.as_str()),
            self.target.env.as_deref().map(EnvName::from).as_ref(),
            &DeploymentName::from(self.target.deployment.as_str()),
        )
        .context("failed to resolve the target")?;

        let acl_path = self.sources.acl(&config);
        let entries: Vec<String> = if acl_path.exists() {
            let doc = acl::load_at(&acl_path)
                .with_context(|| format!("failed to load ACL from '{}'", acl_path.display()))?;
            acl::compute_acl(&doc, resolved.target())
                .entries()
                .iter()
                .map(ToString::to_string)
                .collect()
        } else {
            Vec::new()
        };

        let settings = resolved.flatten();
        if self.json {
            let payload = ShowJson {
                target: resolved.target().to_string(),
                settings,
                acl: entries,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize settings")?
            );
            return Ok(());
        }

        println!("{}", resolved.target().to_string().bold());
        let rows: Vec<SettingRow> = settings
            .into_iter()
            .map(|(key, value)| SettingRow { key, value })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        if !entries.is_empty() {
            println!("acl: {}", entries.join(" "));
        }
        Ok(())
    }
}
