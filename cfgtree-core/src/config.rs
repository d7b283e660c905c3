//! Tool configuration at `~/.cfgtree/config.yaml`.
//!
//! Every field has a default, so a missing file (or a partial one) is fine.
//! Command-line flags override whatever is loaded here.
//!
//! ```yaml
//! coordinator:
//!   host: zk1.example.com
//!   port: 2181
//!   connect_timeout_ms: 5000
//!   connect_attempts: 3
//!   io_timeout_ms: 10000
//! environments: /etc/cfgtree/environments.yaml
//! acl: /etc/cfgtree/hosts.properties
//! templates: /etc/cfgtree/templates
//! hosts_node: hosts
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, RegistryError};

/// Connection settings for the coordination service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub connect_attempts: u32,
    pub io_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            host: "localhost".to_string(),
            port: 2181,
            connect_timeout_ms: 5_000,
            connect_attempts: 3,
            io_timeout_ms: 10_000,
        }
    }
}

impl CoordinatorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub coordinator: CoordinatorConfig,
    /// Environment document (YAML).
    pub environments: PathBuf,
    /// Host-permission property document.
    pub acl: PathBuf,
    /// Template directory.
    pub templates: PathBuf,
    /// Name of the host-list node under each deployment path.
    pub hosts_node: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            coordinator: CoordinatorConfig::default(),
            environments: PathBuf::from("environments.yaml"),
            acl: PathBuf::from("hosts.properties"),
            templates: PathBuf::from("templates"),
            hosts_node: "hosts".to_string(),
        }
    }
}

/// `<home>/.cfgtree/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".cfgtree").join("config.yaml")
}

/// Load the configuration under `home`, falling back to defaults if absent.
pub fn load_config_at(home: &Path) -> Result<ToolConfig, RegistryError> {
    let path = config_path_at(home);
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(ToolConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(ToolConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::ConfigParse { path, source: e })
}

/// `load_config_at` convenience wrapper.
pub fn load_config() -> Result<ToolConfig, RegistryError> {
    load_config_at(&home()?)
}

fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}
