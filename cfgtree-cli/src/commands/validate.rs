//! `cfgtree validate` — check input documents without touching the tree.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use cfgtree_core::{acl, environment};
use cfgtree_renderer::{load_templates, RenderError};

use super::{load_tool_config, SourceArgs};

/// Arguments for `cfgtree validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct Finding {
    #[tabled(rename = "document")]
    document: String,
    #[tabled(rename = "severity")]
    severity: String,
    #[tabled(rename = "location")]
    location: String,
    #[tabled(rename = "message")]
    message: String,
}

impl Finding {
    fn error(document: &Path, location: impl Into<String>, message: impl Into<String>) -> Self {
        Finding {
            document: document.display().to_string(),
            severity: "error".to_string(),
            location: location.into(),
            message: message.into(),
        }
    }

    fn is_error(&self) -> bool {
        self.severity == "error"
    }
}

#[derive(Serialize)]
struct ValidateReportJson<'a> {
    ok: bool,
    errors: usize,
    warnings: usize,
    findings: &'a [Finding],
}

impl ValidateArgs {
    pub fn run(self) -> Result<()> {
        let config = load_tool_config()?;
        let mut findings = Vec::new();

        let env_path = self.sources.environments(&config);
        findings.extend(check_environments(&env_path));

        let acl_path = self.sources.acl(&config);
        if self.sources.acl.is_some() || acl_path.exists() {
            findings.extend(check_acl(&acl_path));
        }

        let template_dir = self.sources.templates(&config);
        if self.sources.templates.is_some() || template_dir.exists() {
            findings.extend(check_templates(&template_dir));
        }

        let errors = findings.iter().filter(|f| f.is_error()).count();
        let warnings = findings.len() - errors;

        if self.json {
            let payload = ValidateReportJson {
                ok: errors == 0,
                errors,
                warnings,
                findings: &findings,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize findings")?
            );
        } else if findings.is_empty() {
            println!("{} all documents valid", "✓".green().bold());
        } else {
            let mut table = Table::new(findings.iter().cloned());
            table.with(Style::rounded());
            println!("{table}");
            println!("{errors} error(s), {warnings} warning(s)");
        }

        if errors > 0 {
            bail!("validation found {errors} error(s)");
        }
        Ok(())
    }
}

fn check_environments(path: &Path) -> Vec<Finding> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => return vec![Finding::error(path, "", format!("cannot read file: {err}"))],
    };
    environment::validate_source(&source)
        .into_iter()
        .map(|issue| Finding {
            document: path.display().to_string(),
            severity: issue.severity.to_string(),
            location: issue.location,
            message: issue.message,
        })
        .collect()
}

fn check_acl(path: &Path) -> Vec<Finding> {
    match acl::load_at(path) {
        Ok(_) => Vec::new(),
        Err(cfgtree_core::RegistryError::AclParse { line, message, .. }) => {
            vec![Finding::error(path, format!("line {line}"), message)]
        }
        Err(err) => vec![Finding::error(path, "", err.to_string())],
    }
}

fn check_templates(dir: &Path) -> Vec<Finding> {
    let templates = match load_templates(dir, None) {
        Ok(templates) => templates,
        Err(err) => return vec![Finding::error(dir, "", err.to_string())],
    };
    templates
        .iter()
        .filter_map(|template| match template.placeholders() {
            Ok(_) => None,
            Err(RenderError::Syntax { line, message, .. }) => Some(Finding::error(
                &dir.join(template.name()),
                format!("line {line}"),
                message,
            )),
            Err(err) => Some(Finding::error(&dir.join(template.name()), "", err.to_string())),
        })
        .collect()
}
