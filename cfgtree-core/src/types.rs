//! Domain types shared by the registries, the renderer, and the synchronizer.
//!
//! Names that end up as coordination-tree path segments (app, environment,
//! deployment) are newtypes so they cannot be swapped by accident.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Application name: first segment of every settings path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppName(pub String);

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for AppName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AppName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Environment name, a top-level key of the environment document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnvName(pub String);

impl fmt::Display for EnvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EnvName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EnvName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Deployment name, unique within one environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeploymentName(pub String);

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DeploymentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeploymentName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// The `(app, env, deployment)` triple a run is aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub app: AppName,
    pub env: EnvName,
    pub deployment: DeploymentName,
}

impl Target {
    /// Build a target, rejecting names that cannot be used as tree path segments.
    pub fn new(
        app: AppName,
        env: EnvName,
        deployment: DeploymentName,
    ) -> Result<Self, RegistryError> {
        check_segment("app", &app.0)?;
        check_segment("environment", &env.0)?;
        check_segment("deployment", &deployment.0)?;
        Ok(Target { app, env, deployment })
    }

    /// Path segments in root-to-leaf order.
    pub fn segments(&self) -> [&str; 3] {
        [&self.app.0, &self.env.0, &self.deployment.0]
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app, self.env, self.deployment)
    }
}

/// Returns a description of why `value` is unusable as a path segment, if it is.
pub fn segment_problem(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        Some("name is empty")
    } else if value == "." || value == ".." {
        Some("name is a relative path component")
    } else if value.contains('/') {
        Some("name contains '/'")
    } else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("name contains whitespace or control characters")
    } else {
        None
    }
}

fn check_segment(kind: &'static str, value: &str) -> Result<(), RegistryError> {
    match segment_problem(value) {
        Some(reason) => Err(RegistryError::InvalidName {
            kind,
            name: value.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(AppName::from("myapp").to_string(), "myapp");
        assert_eq!(EnvName::from("prod").to_string(), "prod");
        assert_eq!(DeploymentName::from("web").to_string(), "web");
    }

    #[test]
    fn target_display_is_slash_joined() {
        let target = Target::new("myapp".into(), "prod".into(), "web".into()).unwrap();
        assert_eq!(target.to_string(), "myapp/prod/web");
        assert_eq!(target.segments(), ["myapp", "prod", "web"]);
    }

    #[test]
    fn target_rejects_slashes_and_empty_names() {
        let err = Target::new("my/app".into(), "prod".into(), "web".into()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { kind: "app", .. }));

        let err = Target::new("myapp".into(), "".into(), "web".into()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { kind: "environment", .. }));

        let err = Target::new("myapp".into(), "prod".into(), "..".into()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { kind: "deployment", .. }));
    }
}
