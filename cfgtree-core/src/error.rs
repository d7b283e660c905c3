//! Error types for cfgtree-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::environment::ValidationIssue;
use crate::types::{DeploymentName, EnvName};

/// All errors that can arise while loading or querying the registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The environment document is not valid YAML.
    #[error("failed to parse environment document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The environment document is YAML but does not have the
    /// env → deployment → settings shape.
    #[error("invalid environment document {path}: {}", summarize(.issues))]
    Malformed {
        path: PathBuf,
        issues: Vec<ValidationIssue>,
    },

    /// A line of the ACL property document could not be understood.
    #[error("failed to parse ACL document {path} at line {line}: {message}")]
    AclParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The tool configuration file is malformed.
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No environment defines the requested deployment.
    #[error("{}", not_found_message(.env.as_ref(), .deployment))]
    NotFound {
        env: Option<EnvName>,
        deployment: DeploymentName,
    },

    /// More than one environment defines the deployment and none was named.
    #[error(
        "deployment '{deployment}' is defined in several environments ({}); specify the environment",
        join_names(.candidates)
    )]
    AmbiguousEnvironment {
        deployment: DeploymentName,
        candidates: Vec<EnvName>,
    },

    /// A name cannot be used as a coordination-tree path segment.
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    /// `dirs::home_dir()` returned `None`, so `~/.cfgtree/` cannot be located.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`RegistryError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

fn not_found_message(env: Option<&EnvName>, deployment: &DeploymentName) -> String {
    match env {
        Some(env) => format!("deployment '{deployment}' not found in environment '{env}'"),
        None => format!("deployment '{deployment}' not found in any environment"),
    }
}

fn join_names(names: &[EnvName]) -> String {
    names
        .iter()
        .map(|n| n.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
