//! Environment registry: the env → deployment → settings document.
//!
//! # Document shape
//!
//! ```yaml
//! prod:                 # environment
//!   web:                # deployment
//!     db.host: db1      # literal dotted key
//!     db:
//!       port: 5432      # nested table, addressed as `db.port`
//! staging:
//!   web: {}
//! ```
//!
//! Leaves must be scalars (string, number, bool). Structural problems are
//! collected as [`ValidationIssue`]s; [`parse`] turns any error-severity issue
//! into [`RegistryError::Malformed`], while [`validate_source`] hands them back
//! as a plain list for a validate mode.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::{io_err, RegistryError};
use crate::types::{segment_problem, AppName, DeploymentName, EnvName, Target};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// A single settings value: a scalar rendered as text, or a nested table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Scalar(String),
    Table(Settings),
}

/// Settings of one deployment, keyed by setting name.
pub type Settings = BTreeMap<String, SettingValue>;

/// Deployments of one environment.
pub type Deployments = BTreeMap<DeploymentName, Settings>;

/// Parsed environment document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentDocument {
    environments: BTreeMap<EnvName, Deployments>,
}

impl EnvironmentDocument {
    /// Add (or replace) the settings of one deployment.
    pub fn insert(&mut self, env: EnvName, deployment: DeploymentName, settings: Settings) {
        self.environments
            .entry(env)
            .or_default()
            .insert(deployment, settings);
    }

    /// Add an environment with no deployments.
    pub fn insert_environment(&mut self, env: EnvName) {
        self.environments.entry(env).or_default();
    }

    pub fn environments(&self) -> &BTreeMap<EnvName, Deployments> {
        &self.environments
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Validation issues
// ---------------------------------------------------------------------------

/// How serious a [`ValidationIssue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The document cannot be used for a run.
    Error,
    /// The document is usable but probably not what the operator meant.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Category of a [`ValidationIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Syntax,
    Nesting,
    KeyType,
    InvalidName,
    NonScalar,
    DuplicateDeployment,
    EmptyEnvironment,
    EmptyDocument,
}

/// One diagnostic produced while checking an environment document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    /// Dotted location inside the document, empty for the document itself.
    pub location: String,
    pub message: String,
}

impl ValidationIssue {
    fn error(kind: IssueKind, location: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            severity: Severity::Error,
            kind,
            location: location.into(),
            message: message.into(),
        }
    }

    fn warning(kind: IssueKind, location: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            severity: Severity::Warning,
            kind,
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.location, self.message)
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse an environment document from YAML text.
///
/// `origin` only labels errors. Returns [`RegistryError::Parse`] for invalid
/// YAML and [`RegistryError::Malformed`] for a document with the wrong shape.
/// Warnings (duplicate deployments, empty environments) are logged, not fatal.
pub fn parse(source: &str, origin: &Path) -> Result<EnvironmentDocument, RegistryError> {
    let root: Value = serde_yaml::from_str(source).map_err(|e| RegistryError::Parse {
        path: origin.to_path_buf(),
        source: e,
    })?;

    let (doc, issues) = convert(&root);
    if !issues.is_empty() {
        return Err(RegistryError::Malformed {
            path: origin.to_path_buf(),
            issues,
        });
    }

    for issue in validate(&doc) {
        tracing::warn!("{}: {issue}", origin.display());
    }
    Ok(doc)
}

/// Read and parse the environment document at `path`.
pub fn load_at(path: &Path) -> Result<EnvironmentDocument, RegistryError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let doc = parse(&contents, path)?;
    tracing::debug!(
        "loaded {} environment(s) from {}",
        doc.environments.len(),
        path.display()
    );
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

/// Semantic checks on an already-parsed document. Never fails.
pub fn validate(doc: &EnvironmentDocument) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if doc.environments.is_empty() {
        issues.push(ValidationIssue::warning(
            IssueKind::EmptyDocument,
            "",
            "document defines no environments",
        ));
        return issues;
    }

    let mut owners: BTreeMap<&DeploymentName, Vec<&EnvName>> = BTreeMap::new();
    for (env, deployments) in &doc.environments {
        if deployments.is_empty() {
            issues.push(ValidationIssue::warning(
                IssueKind::EmptyEnvironment,
                env.0.clone(),
                "environment defines no deployments",
            ));
        }
        for deployment in deployments.keys() {
            owners.entry(deployment).or_default().push(env);
        }
    }

    for (deployment, envs) in owners {
        if envs.len() > 1 {
            let names: Vec<&str> = envs.iter().map(|e| e.0.as_str()).collect();
            issues.push(ValidationIssue::warning(
                IssueKind::DuplicateDeployment,
                deployment.0.clone(),
                format!(
                    "deployment is defined in environments {}; runs must name the environment",
                    names.join(", ")
                ),
            ));
        }
    }
    issues
}

/// Full diagnostic pass over raw YAML text, for a validate mode.
///
/// Syntax and structural problems come back as error-severity issues instead
/// of an `Err`.
pub fn validate_source(source: &str) -> Vec<ValidationIssue> {
    let root: Value = match serde_yaml::from_str(source) {
        Ok(root) => root,
        Err(e) => {
            let location = e
                .location()
                .map(|l| format!("line {}", l.line()))
                .unwrap_or_default();
            return vec![ValidationIssue::error(IssueKind::Syntax, location, e.to_string())];
        }
    };
    let (doc, mut issues) = convert(&root);
    issues.extend(validate(&doc));
    issues
}

// ---------------------------------------------------------------------------
// Resolve / list
// ---------------------------------------------------------------------------

/// The settings selected for one `(app, env, deployment)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    target: Target,
    settings: Settings,
}

impl ResolvedEnvironment {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Look up a dotted key such as `db.port`.
    ///
    /// At each table level the longest literal key wins, so `"db.port": 1`
    /// and `db: {port: 1}` both answer `db.port`. Only scalars resolve.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        let parts: Vec<&str> = key.split('.').collect();
        lookup_in(&self.settings, &parts)
    }

    /// Every scalar setting keyed by its full dotted path, sorted.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        flatten_into(&self.settings, "", &mut out);
        out
    }
}

/// Select the settings for `deployment`.
///
/// With `env`, only that environment is consulted. Without it, every
/// environment is scanned and exactly one must define the deployment.
pub fn resolve(
    doc: &EnvironmentDocument,
    app: &AppName,
    env: Option<&EnvName>,
    deployment: &DeploymentName,
) -> Result<ResolvedEnvironment, RegistryError> {
    let (env_name, settings) = match env {
        Some(env) => {
            let settings = doc
                .environments
                .get(env)
                .and_then(|deployments| deployments.get(deployment))
                .ok_or_else(|| RegistryError::NotFound {
                    env: Some(env.clone()),
                    deployment: deployment.clone(),
                })?;
            (env, settings)
        }
        None => {
            let mut matches: Vec<(&EnvName, &Settings)> = Vec::new();
            for (name, deployments) in &doc.environments {
                if let Some(settings) = deployments.get(deployment) {
                    matches.push((name, settings));
                }
            }
            match matches.len() {
                0 => {
                    return Err(RegistryError::NotFound {
                        env: None,
                        deployment: deployment.clone(),
                    })
                }
                1 => matches[0],
                _ => {
                    return Err(RegistryError::AmbiguousEnvironment {
                        deployment: deployment.clone(),
                        candidates: matches.into_iter().map(|(name, _)| name.clone()).collect(),
                    })
                }
            }
        }
    };

    let target = Target::new(app.clone(), env_name.clone(), deployment.clone())?;
    tracing::debug!("resolved {target} ({} top-level settings)", settings.len());
    Ok(ResolvedEnvironment {
        target,
        settings: settings.clone(),
    })
}

/// Environment names in sorted order.
pub fn list(doc: &EnvironmentDocument) -> Vec<EnvName> {
    doc.environments.keys().cloned().collect()
}

/// Deployment names of `env` in sorted order, or `None` if `env` is unknown.
pub fn deployments(doc: &EnvironmentDocument, env: &EnvName) -> Option<Vec<DeploymentName>> {
    doc.environments
        .get(env)
        .map(|deployments| deployments.keys().cloned().collect())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn lookup_in<'a>(table: &'a Settings, parts: &[&str]) -> Option<&'a str> {
    for take in (1..=parts.len()).rev() {
        let candidate = parts[..take].join(".");
        match table.get(&candidate) {
            Some(SettingValue::Scalar(value)) if take == parts.len() => return Some(value),
            Some(SettingValue::Table(inner)) if take < parts.len() => {
                if let Some(found) = lookup_in(inner, &parts[take..]) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn flatten_into(table: &Settings, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            SettingValue::Scalar(text) => {
                out.insert(full, text.clone());
            }
            SettingValue::Table(inner) => flatten_into(inner, &full, out),
        }
    }
}

/// Build the typed document, collecting every structural problem on the way.
fn convert(root: &Value) -> (EnvironmentDocument, Vec<ValidationIssue>) {
    let mut doc = EnvironmentDocument::default();
    let mut issues = Vec::new();

    let envs = match root {
        Value::Null => return (doc, issues),
        Value::Mapping(envs) => envs,
        _ => {
            issues.push(ValidationIssue::error(
                IssueKind::Nesting,
                "",
                "document root must map environment names to deployments",
            ));
            return (doc, issues);
        }
    };

    for (key, value) in envs {
        let Some(env) = segment_key(key, "", "environment", &mut issues) else {
            continue;
        };
        let env = EnvName::from(env);
        match value {
            Value::Null => doc.insert_environment(env),
            Value::Mapping(deployments) => {
                doc.insert_environment(env.clone());
                for (key, value) in deployments {
                    let Some(deployment) = segment_key(key, &env.0, "deployment", &mut issues)
                    else {
                        continue;
                    };
                    let location = format!("{}.{}", env, deployment);
                    let settings = match value {
                        Value::Null => Settings::new(),
                        Value::Mapping(table) => convert_settings(table, &location, &mut issues),
                        _ => {
                            issues.push(ValidationIssue::error(
                                IssueKind::Nesting,
                                location,
                                "deployment must map setting keys to values",
                            ));
                            continue;
                        }
                    };
                    doc.insert(env.clone(), DeploymentName::from(deployment), settings);
                }
            }
            _ => issues.push(ValidationIssue::error(
                IssueKind::Nesting,
                env.0.clone(),
                "environment must map deployment names to settings",
            )),
        }
    }
    (doc, issues)
}

fn convert_settings(
    table: &Mapping,
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Settings {
    let mut settings = Settings::new();
    for (key, value) in table {
        let Some(name) = key.as_str() else {
            issues.push(ValidationIssue::error(
                IssueKind::KeyType,
                location,
                format!("setting key {} is not a string", describe(key)),
            ));
            continue;
        };
        let here = format!("{location}.{name}");
        if name.is_empty() {
            issues.push(ValidationIssue::error(
                IssueKind::KeyType,
                location,
                "setting key is empty",
            ));
            continue;
        }
        let converted = match value {
            Value::String(s) => SettingValue::Scalar(s.clone()),
            Value::Number(n) => SettingValue::Scalar(n.to_string()),
            Value::Bool(b) => SettingValue::Scalar(b.to_string()),
            Value::Mapping(inner) => SettingValue::Table(convert_settings(inner, &here, issues)),
            Value::Null => {
                issues.push(ValidationIssue::error(IssueKind::NonScalar, here, "setting has no value"));
                continue;
            }
            Value::Sequence(_) => {
                issues.push(ValidationIssue::error(
                    IssueKind::NonScalar,
                    here,
                    "setting is a list; only scalars and tables are allowed",
                ));
                continue;
            }
            Value::Tagged(_) => {
                issues.push(ValidationIssue::error(
                    IssueKind::NonScalar,
                    here,
                    "tagged values are not supported",
                ));
                continue;
            }
        };
        settings.insert(name.to_owned(), converted);
    }
    settings
}

/// Validate a key that becomes a tree path segment.
fn segment_key(
    key: &Value,
    location: &str,
    kind: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    let Some(name) = key.as_str() else {
        issues.push(ValidationIssue::error(
            IssueKind::KeyType,
            location,
            format!("{kind} name {} is not a string", describe(key)),
        ));
        return None;
    };
    if let Some(reason) = segment_problem(name) {
        issues.push(ValidationIssue::error(
            IssueKind::InvalidName,
            location,
            format!("invalid {kind} name '{name}': {reason}"),
        ));
        return None;
    }
    Some(name.to_owned())
}

fn describe(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Sequence(_) => "(list)".to_string(),
        Value::Mapping(_) => "(mapping)".to_string(),
        Value::Tagged(_) => "(tagged value)".to_string(),
        Value::String(s) => format!("'{s}'"),
    }
}

/// Path used to label documents parsed from memory.
pub fn inline_origin() -> PathBuf {
    PathBuf::from("<inline>")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
prod:
  web:
    db.host: db1
    db.port: 5432
  worker:
    queue:
      name: jobs
      depth: 10
staging:
  web:
    db.host: db-staging
  batch:
    enabled: true
"#;

    fn doc() -> EnvironmentDocument {
        parse(DOC, &inline_origin()).expect("parse")
    }

    fn app() -> AppName {
        AppName::from("myapp")
    }

    #[test]
    fn unique_deployment_resolves_without_env() {
        let resolved = resolve(&doc(), &app(), None, &"worker".into()).expect("resolve");
        assert_eq!(resolved.target().env, EnvName::from("prod"));
        assert_eq!(resolved.lookup("queue.name"), Some("jobs"));
    }

    #[test]
    fn duplicate_deployment_without_env_is_ambiguous() {
        let err = resolve(&doc(), &app(), None, &"web".into()).unwrap_err();
        match err {
            RegistryError::AmbiguousEnvironment { candidates, .. } => {
                assert_eq!(candidates, vec![EnvName::from("prod"), EnvName::from("staging")]);
            }
            other => panic!("expected ambiguity, got {other}"),
        }
    }

    #[test]
    fn explicit_env_disambiguates() {
        let resolved =
            resolve(&doc(), &app(), Some(&"staging".into()), &"web".into()).expect("resolve");
        assert_eq!(resolved.lookup("db.host"), Some("db-staging"));
        assert_eq!(resolved.target().to_string(), "myapp/staging/web");
    }

    #[test]
    fn missing_deployment_is_not_found() {
        let err = resolve(&doc(), &app(), None, &"api".into()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { env: None, .. }));

        let err = resolve(&doc(), &app(), Some(&"prod".into()), &"batch".into()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { env: Some(_), .. }));
        assert!(err.to_string().contains("environment 'prod'"));
    }

    #[test]
    fn lookup_handles_literal_nested_and_mixed_keys() {
        let source = r#"
prod:
  web:
    db.port: 5432
    db:
      host: db1
      pool.size: 8
    cache:
      ttl: 60
"#;
        let doc = parse(source, &inline_origin()).unwrap();
        let resolved = resolve(&doc, &app(), None, &"web".into()).unwrap();
        assert_eq!(resolved.lookup("db.port"), Some("5432"));
        assert_eq!(resolved.lookup("db.host"), Some("db1"));
        assert_eq!(resolved.lookup("db.pool.size"), Some("8"));
        assert_eq!(resolved.lookup("cache.ttl"), Some("60"));
        assert_eq!(resolved.lookup("cache"), None, "tables do not resolve");
        assert_eq!(resolved.lookup("db.user"), None);
    }

    #[test]
    fn scalars_are_rendered_as_text() {
        let resolved = resolve(&doc(), &app(), None, &"batch".into()).unwrap();
        assert_eq!(resolved.lookup("enabled"), Some("true"));
    }

    #[test]
    fn flatten_lists_dotted_paths() {
        let resolved = resolve(&doc(), &app(), None, &"worker".into()).unwrap();
        let flat = resolved.flatten();
        assert_eq!(flat.get("queue.depth").map(String::as_str), Some("10"));
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn list_is_sorted() {
        assert_eq!(list(&doc()), vec![EnvName::from("prod"), EnvName::from("staging")]);
        assert_eq!(
            deployments(&doc(), &"prod".into()),
            Some(vec![DeploymentName::from("web"), DeploymentName::from("worker")])
        );
        assert_eq!(deployments(&doc(), &"qa".into()), None);
    }

    #[test]
    fn validate_reports_duplicates_as_warnings() {
        let issues = validate(&doc());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::DuplicateDeployment);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("prod, staging"));
    }

    #[test]
    fn wrong_nesting_is_malformed() {
        let err = parse("prod:\n  web: just-a-string\n", &inline_origin()).unwrap_err();
        match err {
            RegistryError::Malformed { issues, .. } => {
                assert_eq!(issues[0].kind, IssueKind::Nesting);
                assert_eq!(issues[0].location, "prod.web");
            }
            other => panic!("expected malformed, got {other}"),
        }
    }

    #[test]
    fn list_leaf_is_non_scalar() {
        let err = parse("prod:\n  web:\n    hosts: [a, b]\n", &inline_origin()).unwrap_err();
        match err {
            RegistryError::Malformed { issues, .. } => {
                assert_eq!(issues[0].kind, IssueKind::NonScalar);
                assert_eq!(issues[0].location, "prod.web.hosts");
            }
            other => panic!("expected malformed, got {other}"),
        }
    }

    #[test]
    fn non_string_keys_are_rejected() {
        let issues = validate_source("prod:\n  web:\n    8080: http\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::KeyType);
        assert!(issues[0].is_error());
    }

    #[test]
    fn empty_document_parses_with_warning_only() {
        let doc = parse("", &inline_origin()).expect("empty parses");
        assert!(doc.is_empty());
        let issues = validate_source("");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::EmptyDocument);
    }

    #[test]
    fn validate_source_reports_syntax_errors() {
        let issues = validate_source("prod: [unclosed");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Syntax);
    }
}
