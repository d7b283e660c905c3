//! Environment and ACL registry integration tests against on-disk documents.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;

use cfgtree_core::{
    acl::{self, Perms},
    environment::{self, IssueKind, Severity},
    AppName, DeploymentName, EnvName, RegistryError, Target,
};

const ENVIRONMENTS: &str = r#"
prod:
  web:
    db.host: db1
    db.port: "5432"
  api:
    db:
      host: db1
      port: 5432
staging:
  web:
    db.host: db-staging
    db.port: "5432"
qa: {}
"#;

fn app() -> AppName {
    AppName::from("myapp")
}

// ---------------------------------------------------------------------------
// 1. Environment documents on disk
// ---------------------------------------------------------------------------

#[test]
fn load_and_resolve_from_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("environments.yaml");
    file.write_str(ENVIRONMENTS).expect("write");

    let doc = environment::load_at(file.path()).expect("load");
    let resolved = environment::resolve(&doc, &app(), None, &DeploymentName::from("api"))
        .expect("resolve");
    assert_eq!(resolved.target().env, EnvName::from("prod"));
    assert_eq!(resolved.lookup("db.port"), Some("5432"));
}

#[test]
fn load_missing_file_returns_io_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let missing = dir.child("nope.yaml");
    missing.assert(predicate::path::missing());

    let err = environment::load_at(missing.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("environments.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed").expect("write");

    let err = environment::load_at(file.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("environments.yaml"));
}

#[test]
fn load_list_root_is_malformed() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("environments.yaml");
    file.write_str("- prod\n- staging\n").expect("write");

    let err = environment::load_at(file.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Malformed { .. }), "got: {err}");
}

#[test]
fn ambiguity_message_names_candidates() {
    let doc = environment::parse(ENVIRONMENTS, &environment::inline_origin()).expect("parse");
    let err = environment::resolve(&doc, &app(), None, &DeploymentName::from("web")).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("prod, staging"), "got: {msg}");
    assert!(msg.contains("specify the environment"));
}

#[test]
fn validate_source_collects_every_problem() {
    let source = r#"
prod:
  web:
    ports: [80, 443]
    empty:
  "bad/name":
    a: b
staging: 42
"#;
    let issues = environment::validate_source(source);
    let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
    assert!(kinds.contains(&IssueKind::NonScalar));
    assert!(kinds.contains(&IssueKind::InvalidName));
    assert!(kinds.contains(&IssueKind::Nesting));
    assert!(issues.iter().all(|i| i.severity == Severity::Error));
    assert_eq!(issues.len(), 4, "got: {issues:?}");
}

#[test]
fn validate_flags_empty_environment() {
    let doc = environment::parse(ENVIRONMENTS, &environment::inline_origin()).expect("parse");
    let issues = environment::validate(&doc);
    assert!(issues
        .iter()
        .any(|i| i.kind == IssueKind::EmptyEnvironment && i.location == "qa"));
    assert!(issues
        .iter()
        .any(|i| i.kind == IssueKind::DuplicateDeployment && i.location == "web"));
}

// ---------------------------------------------------------------------------
// 2. ACL documents
// ---------------------------------------------------------------------------

#[rstest]
#[case("admin", true, Perms::ADMIN)]
#[case("read", false, Perms::READ)]
#[case("read,write", false, Perms::READ | Perms::WRITE)]
#[case("all", false, Perms::DATA)]
#[case("admin all", true, Perms::DATA | Perms::ADMIN)]
#[case("true", true, Perms::DATA | Perms::ADMIN)]
#[case("false", false, Perms::READ)]
#[case("none", false, Perms::empty())]
#[case("", false, Perms::empty())]
fn descriptor_tokens(#[case] descriptor: &str, #[case] admin: bool, #[case] perms: Perms) {
    let source = format!("host01 = {descriptor}\n");
    let doc = acl::parse(&source, &environment::inline_origin())
        .unwrap_or_else(|e| panic!("[{descriptor}] parse failed: {e}"));
    let (host, permission) = doc.hosts().next().expect("one host");
    assert_eq!(host, "host01");
    assert_eq!(permission.admin, admin, "[{descriptor}] admin flag");
    assert_eq!(permission.perms, perms, "[{descriptor}] perms");
}

#[rstest]
#[case("no separator here", 1, "expected")]
#[case("# c\nhost = fly\n", 2, "unknown permission 'fly'")]
#[case("a = read\nA = write\n", 2, "duplicate entry for host 'a'")]
#[case(" = read\n", 1, "invalid host")]
#[case("bad/host = read\n", 1, "invalid host")]
#[case("[z-a = read\n", 1, "invalid host pattern")]
fn malformed_acl_lines(#[case] source: &str, #[case] line: usize, #[case] fragment: &str) {
    let err = acl::parse(source, &environment::inline_origin()).unwrap_err();
    match &err {
        RegistryError::AclParse { line: got, message, .. } => {
            assert_eq!(*got, line, "line number for {source:?}");
            assert!(message.contains(fragment), "message {message:?} lacks {fragment:?}");
        }
        other => panic!("expected AclParse, got {other}"),
    }
}

#[test]
fn acl_load_from_file_and_gate() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("hosts.properties");
    file.write_str("adminHost = admin\notherHost = read\n").expect("write");

    let doc = acl::load_at(file.path()).expect("load");
    assert!(acl::can_administer(&doc, "adminHost"));
    assert!(!acl::can_administer(&doc, "otherHost"));
    assert!(!acl::can_administer(&doc, "absentHost"));

    let target = Target::new(app(), EnvName::from("prod"), DeploymentName::from("web"))
        .expect("target");
    let set = acl::compute_acl(&doc, &target);
    assert_eq!(set.entries().len(), 2);
}
