//! `cfgtree list` — environments, their deployments, and templates.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use cfgtree_core::environment;
use cfgtree_renderer::list_templates;

use super::{load_tool_config, SourceArgs};

/// Arguments for `cfgtree list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// List template names instead of environments.
    #[arg(long = "template-names")]
    pub template_names: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "environment")]
    environment: String,
    #[tabled(rename = "deployments")]
    #[serde(skip)]
    summary: String,
    #[tabled(skip)]
    deployments: Vec<String>,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let config = load_tool_config()?;

        if self.template_names {
            let dir = self.sources.templates(&config);
            let names = list_templates(&dir)
                .with_context(|| format!("failed to list templates in '{}'", dir.display()))?;
            if self.json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                for name in names {
                    println!("{name}");
                }
            }
            return Ok(());
        }

        let path = self.sources.environments(&config);
        let doc = environment::load_at(&path)
            .with_context(|| format!("failed to load environments from '{}'", path.display()))?;

        let rows: Vec<EnvironmentRow> = environment::list(&doc)
            .into_iter()
            .map(|env| {
                let deployments: Vec<String> = environment::deployments(&doc, &env)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|d| d.0)
                    .collect();
                EnvironmentRow {
                    environment: env.0,
                    summary: deployments.join(", "),
                    deployments,
                }
            })
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize environments")?
            );
            return Ok(());
        }

        if rows.is_empty() {
            println!("No environments defined in '{}'.", path.display());
            return Ok(());
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
