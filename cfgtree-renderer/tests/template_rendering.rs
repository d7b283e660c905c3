use std::fs;

use rstest::rstest;
use tempfile::TempDir;

use cfgtree_core::{
    environment::{self, inline_origin},
    ResolvedEnvironment,
};
use cfgtree_renderer::{list_templates, render, render_all, RenderError, Template, TemplateSet};

const ENVIRONMENTS: &str = r#"
prod:
  web:
    db.host: db1
    db.port: "5432"
    http:
      port: 8080
      workers: 4
"#;

fn prod_web() -> ResolvedEnvironment {
    let doc = environment::parse(ENVIRONMENTS, &inline_origin()).expect("parse");
    environment::resolve(&doc, &"myapp".into(), Some(&"prod".into()), &"web".into())
        .expect("resolve")
}

fn template_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write template");
    }
    dir
}

#[test]
fn end_to_end_conn_txt() {
    let dir = template_dir(&[("conn.txt", "${db.host}:${db.port}")]);
    let set = TemplateSet::load(dir.path(), None).expect("load");
    let artifacts = set.render(&prod_web()).expect("render");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].name, "conn.txt");
    assert_eq!(artifacts[0].content, b"db1:5432");
}

#[test]
fn rendering_is_deterministic() {
    let template = Template::new(
        "server.conf",
        "listen ${http.port}\nworkers ${http.workers}\nupstream ${db.host}:${db.port}\n",
    );
    let env = prod_web();
    let first = render(&template, &env).expect("first");
    let second = render(&template, &env).expect("second");
    assert_eq!(first, second);
}

#[rstest]
#[case("")]
#[case("plain text\n")]
#[case("windows\r\nline endings\r\n")]
#[case("dollars $ and {braces} and $5\n")]
#[case("unicode: héllo wörld ✓\n")]
fn literal_templates_render_unchanged(#[case] content: &str) {
    let template = Template::new("literal", content);
    let artifact = render(&template, &prod_web()).expect("render");
    assert_eq!(artifact.content, content.as_bytes());
}

#[test]
fn missing_nested_key_is_named() {
    let source = "prod:\n  web:\n    db:\n      host: x\n";
    let doc = environment::parse(source, &inline_origin()).expect("parse");
    let env = environment::resolve(&doc, &"myapp".into(), None, &"web".into()).expect("resolve");

    let template = Template::new("db.conf", "port=${db.port}");
    let err = render(&template, &env).unwrap_err();
    match &err {
        RenderError::UndefinedKey { key, template } => {
            assert_eq!(key, "db.port");
            assert_eq!(template, "db.conf");
        }
        other => panic!("expected undefined key, got {other}"),
    }
    assert!(err.to_string().contains("db.port"));
}

#[test]
fn batch_fails_fast_on_first_bad_template() {
    let templates = vec![
        Template::new("a.txt", "${db.host}"),
        Template::new("b.txt", "${nope}"),
        Template::new("c.txt", "${also.missing}"),
    ];
    let err = render_all(&templates, &prod_web()).unwrap_err();
    match err {
        RenderError::UndefinedKey { template, .. } => assert_eq!(template, "b.txt"),
        other => panic!("expected undefined key, got {other}"),
    }
}

#[test]
fn named_templates_load_in_requested_order() {
    let dir = template_dir(&[
        ("a.txt", "${db.host}"),
        ("nested/b.txt", "${http.port}"),
    ]);
    assert_eq!(
        list_templates(dir.path()).expect("list"),
        vec!["a.txt".to_string(), "nested/b.txt".to_string()]
    );

    let names = vec!["nested/b.txt".to_string(), "a.txt".to_string()];
    let set = TemplateSet::load(dir.path(), Some(&names)).expect("load");
    let artifacts = set.render(&prod_web()).expect("render");
    assert_eq!(artifacts[0].name, "nested/b.txt");
    assert_eq!(artifacts[0].content, b"8080");
    assert_eq!(artifacts[1].content, b"db1");
}

#[test]
fn unknown_template_name_is_reported() {
    let dir = template_dir(&[("a.txt", "x")]);
    let names = vec!["missing.txt".to_string()];
    let err = TemplateSet::load(dir.path(), Some(&names)).unwrap_err();
    assert!(matches!(err, RenderError::UnknownTemplate { .. }), "got: {err}");
}

#[test]
fn binary_template_is_rejected_by_name() {
    let dir = template_dir(&[("a.txt", "x")]);
    fs::write(dir.path().join("logo.bin"), [b'o', b'k', 0xff, 0xfe]).expect("write binary");
    let err = TemplateSet::load(dir.path(), None).unwrap_err();
    match err {
        RenderError::NotUtf8 { template, offset } => {
            assert_eq!(template, "logo.bin");
            assert_eq!(offset, 2);
        }
        other => panic!("expected NotUtf8, got {other}"),
    }
}

#[test]
fn missing_template_dir_is_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = list_templates(&dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, RenderError::Io { .. }));
}
