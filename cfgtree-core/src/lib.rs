//! cfgtree core library — registries, tool configuration, and errors.
//!
//! - [`environment`] — env → deployment → settings document, resolution
//! - [`acl`] — host-permission document, admin gate, ACL entry computation
//! - [`config`] — `~/.cfgtree/config.yaml`
//! - [`types`] — name newtypes and [`Target`]
//! - [`error`] — [`RegistryError`]

pub mod acl;
pub mod config;
pub mod environment;
pub mod error;
pub mod types;

pub use acl::{AccessControlEntrySet, AclDocument, AclEntry, HostPermission, Perms};
pub use config::{CoordinatorConfig, ToolConfig};
pub use environment::{EnvironmentDocument, ResolvedEnvironment, SettingValue, Settings, ValidationIssue};
pub use error::RegistryError;
pub use types::{AppName, DeploymentName, EnvName, Target};
