//! ACL registry: which hosts may administer the tree, and the access-control
//! entries attached to every node a run writes.
//!
//! The document is a property file:
//!
//! ```text
//! # host = permissions
//! deploy01.example.com = admin, all
//! app01.example.com    = read
//! *.build.example.com  = read, write
//! retired.example.com  =
//! ```
//!
//! Tokens: `admin`, `read`, `write`, `create`, `delete`, `all` (the four data
//! permissions), `none`, and the legacy booleans `true` (admin + all) and
//! `false` (read only). An empty descriptor grants nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use bitflags::bitflags;
use glob::Pattern;
use serde::Serialize;

use crate::error::{io_err, RegistryError};
use crate::types::{segment_problem, Target};

bitflags! {
    /// Permission bits of one access-control entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Perms: u32 {
        const READ = 1;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
        const DELETE = 1 << 3;
        const ADMIN = 1 << 4;
        const DATA = Self::READ.bits() | Self::WRITE.bits() | Self::CREATE.bits() | Self::DELETE.bits();
    }
}

impl Perms {
    /// Compact letter form, e.g. `rwcda`; `-` when empty.
    pub fn letters(self) -> String {
        let mut out = String::new();
        for (flag, letter) in [
            (Perms::READ, 'r'),
            (Perms::WRITE, 'w'),
            (Perms::CREATE, 'c'),
            (Perms::DELETE, 'd'),
            (Perms::ADMIN, 'a'),
        ] {
            if self.contains(flag) {
                out.push(letter);
            }
        }
        if out.is_empty() {
            out.push('-');
        }
        out
    }
}

impl Serialize for Perms {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.letters())
    }
}

/// Permission descriptor of one host line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HostPermission {
    pub admin: bool,
    pub perms: Perms,
}

impl HostPermission {
    /// Canonical descriptor text, parseable back by [`parse`].
    pub fn describe(&self) -> String {
        let mut tokens = Vec::new();
        if self.admin {
            tokens.push("admin");
        }
        for (flag, name) in [
            (Perms::READ, "read"),
            (Perms::WRITE, "write"),
            (Perms::CREATE, "create"),
            (Perms::DELETE, "delete"),
        ] {
            if self.perms.contains(flag) {
                tokens.push(name);
            }
        }
        if tokens.is_empty() {
            "none".to_string()
        } else {
            tokens.join(",")
        }
    }
}

#[derive(Debug, Clone)]
struct HostRule {
    pattern: Option<Pattern>,
    permission: HostPermission,
}

/// Parsed host-permission document.
#[derive(Debug, Clone, Default)]
pub struct AclDocument {
    hosts: BTreeMap<String, HostRule>,
}

impl AclDocument {
    /// Host keys (lowercased) with their descriptors, in key order.
    pub fn hosts(&self) -> impl Iterator<Item = (&str, &HostPermission)> {
        self.hosts
            .iter()
            .map(|(host, rule)| (host.as_str(), &rule.permission))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// One access-control entry attached to a tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AclEntry {
    pub scheme: String,
    pub id: String,
    pub perms: Perms,
}

impl fmt::Display for AclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scheme, self.id, self.perms.letters())
    }
}

/// The entries applied to every node written under one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlEntrySet {
    target: Target,
    entries: Vec<AclEntry>,
}

impl AccessControlEntrySet {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }
}

/// Scheme used for every entry derived from the host document.
pub const HOST_SCHEME: &str = "host";

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse a host-permission property document. `origin` only labels errors.
pub fn parse(source: &str, origin: &Path) -> Result<AclDocument, RegistryError> {
    let mut hosts: BTreeMap<String, HostRule> = BTreeMap::new();
    let mut first_seen: BTreeMap<String, usize> = BTreeMap::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let fail = |message: String| RegistryError::AclParse {
            path: origin.to_path_buf(),
            line: line_no,
            message,
        };

        let Some(split) = line.find(['=', ':']) else {
            return Err(fail("expected `host = permissions`".to_string()));
        };
        let host = line[..split].trim().to_ascii_lowercase();
        let descriptor = line[split + 1..].trim();

        if let Some(reason) = segment_problem(&host) {
            return Err(fail(format!("invalid host '{host}': {reason}")));
        }
        if let Some(first) = first_seen.get(&host) {
            return Err(fail(format!(
                "duplicate entry for host '{host}' (first defined on line {first})"
            )));
        }
        let pattern = if host.contains(['*', '?', '[']) {
            Some(
                Pattern::new(&host)
                    .map_err(|e| fail(format!("invalid host pattern '{host}': {e}")))?,
            )
        } else {
            None
        };
        let permission = parse_descriptor(descriptor).map_err(fail)?;

        first_seen.insert(host.clone(), line_no);
        hosts.insert(host, HostRule { pattern, permission });
    }

    Ok(AclDocument { hosts })
}

/// Read and parse the host-permission document at `path`.
pub fn load_at(path: &Path) -> Result<AclDocument, RegistryError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let doc = parse(&contents, path)?;
    tracing::debug!("loaded {} host entries from {}", doc.len(), path.display());
    Ok(doc)
}

fn parse_descriptor(descriptor: &str) -> Result<HostPermission, String> {
    let mut permission = HostPermission::default();
    for token in descriptor
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match token.to_ascii_lowercase().as_str() {
            "admin" => {
                permission.admin = true;
                permission.perms |= Perms::ADMIN;
            }
            "read" => permission.perms |= Perms::READ,
            "write" => permission.perms |= Perms::WRITE,
            "create" => permission.perms |= Perms::CREATE,
            "delete" => permission.perms |= Perms::DELETE,
            "all" => permission.perms |= Perms::DATA,
            "none" => {}
            "true" => {
                permission.admin = true;
                permission.perms |= Perms::DATA | Perms::ADMIN;
            }
            "false" => permission.perms |= Perms::READ,
            other => return Err(format!("unknown permission '{other}'")),
        }
    }
    Ok(permission)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Whether `host` may administer the tree.
///
/// True iff the exact entry for `host`, or any pattern matching it, is marked
/// `admin`. Hosts absent from the document never administer.
pub fn can_administer(doc: &AclDocument, host: &str) -> bool {
    let host = host.trim().to_ascii_lowercase();
    doc.hosts.iter().any(|(key, rule)| {
        rule.permission.admin
            && match &rule.pattern {
                Some(pattern) => pattern.matches(&host),
                None => *key == host,
            }
    })
}

/// Entries to attach to every node written under `target`.
///
/// One entry per document host, in key order; computed fresh on every call.
pub fn compute_acl(doc: &AclDocument, target: &Target) -> AccessControlEntrySet {
    let entries = doc
        .hosts
        .iter()
        .map(|(host, rule)| AclEntry {
            scheme: HOST_SCHEME.to_string(),
            id: host.clone(),
            perms: rule.permission.perms,
        })
        .collect();
    AccessControlEntrySet {
        target: target.clone(),
        entries,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::inline_origin;

    fn doc(source: &str) -> AclDocument {
        parse(source, &inline_origin()).expect("parse acl")
    }

    fn target() -> Target {
        Target::new("myapp".into(), "prod".into(), "web".into()).unwrap()
    }

    #[test]
    fn admin_flag_decides_administration() {
        let acl = doc("adminHost = admin\notherHost = read\n");
        assert!(can_administer(&acl, "adminhost"));
        assert!(can_administer(&acl, "ADMINHOST"), "host match is case-insensitive");
        assert!(!can_administer(&acl, "otherHost"));
        assert!(!can_administer(&acl, "strangerHost"));
    }

    #[test]
    fn matching_admin_pattern_grants_admin_over_exact_entry() {
        let acl = doc("*.ops.example.com = admin\nbox.ops.example.com = read\n");
        assert!(can_administer(&acl, "deploy.ops.example.com"));
        assert!(can_administer(&acl, "box.ops.example.com"));
        assert!(can_administer(&acl, "BOX.ops.example.com"));
        assert!(!can_administer(&acl, "deploy.dev.example.com"));
    }

    #[test]
    fn exact_admin_entry_grants_admin_despite_non_admin_pattern() {
        let acl = doc("*.ops.example.com = read\nbox.ops.example.com = admin\n");
        assert!(can_administer(&acl, "box.ops.example.com"));
        assert!(!can_administer(&acl, "deploy.ops.example.com"));
    }

    #[test]
    fn compute_acl_yields_one_entry_per_host() {
        let acl = doc("b = read\na = admin, all\nc =\n");
        let set = compute_acl(&acl, &target());
        let ids: Vec<&str> = set.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(set.entries()[0].perms, Perms::DATA | Perms::ADMIN);
        assert_eq!(set.entries()[1].perms, Perms::READ);
        assert!(set.entries()[2].perms.is_empty(), "empty descriptor grants nothing");
        assert!(set.entries().iter().all(|e| e.scheme == HOST_SCHEME));
        assert_eq!(set.target(), &target());
    }

    #[test]
    fn compute_acl_is_deterministic() {
        let acl = doc("x = read\ny = write\n");
        assert_eq!(compute_acl(&acl, &target()), compute_acl(&acl, &target()));
    }

    #[test]
    fn comments_and_colon_separator_are_accepted() {
        let acl = doc("# hosts\n! legacy comment\n\nhost1: true\n");
        assert_eq!(acl.len(), 1);
        assert!(can_administer(&acl, "host1"));
    }

    #[test]
    fn describe_is_canonical() {
        let acl = doc("h = delete read admin\n");
        let (_, permission) = acl.hosts().next().unwrap();
        assert_eq!(permission.describe(), "admin,read,delete");
        assert_eq!(HostPermission::default().describe(), "none");
    }

    #[test]
    fn letters_render_in_fixed_order() {
        assert_eq!((Perms::ADMIN | Perms::READ).letters(), "ra");
        assert_eq!(Perms::empty().letters(), "-");
    }
}
