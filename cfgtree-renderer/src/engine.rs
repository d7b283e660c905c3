//! Template discovery and rendering against a [`ResolvedEnvironment`].

use std::path::{Component, Path, PathBuf};

use cfgtree_core::ResolvedEnvironment;

use crate::error::{io_err, RenderError};
use crate::template::{RenderedArtifact, Segment, Template};

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(".tmp")
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        if is_skipped(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let meta = std::fs::metadata(&path).map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), RenderError> {
    let invalid = |reason| RenderError::InvalidName {
        name: name.to_owned(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    let path = Path::new(name);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => return Err(invalid("name escapes the template directory")),
            Component::CurDir => return Err(invalid("name contains '.' components")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("name must be relative"))
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Template names under `dir`: relative, `/`-separated, sorted.
///
/// Hidden entries and `*.tmp` files are skipped.
pub fn list_templates(dir: &Path) -> Result<Vec<String>, RenderError> {
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut names: Vec<String> = files
        .iter()
        .map(|path| normalize_template_name(path.strip_prefix(dir).unwrap_or(path.as_path())))
        .collect();
    names.sort();
    Ok(names)
}

/// Read templates from `dir`: the given `names` in order, or every listed one.
///
/// Templates are UTF-8 text; any other content is [`RenderError::NotUtf8`].
pub fn load_templates(dir: &Path, names: Option<&[String]>) -> Result<Vec<Template>, RenderError> {
    let names = match names {
        Some(names) => names.to_vec(),
        None => list_templates(dir)?,
    };
    let mut templates = Vec::with_capacity(names.len());
    for name in names {
        check_name(&name)?;
        let path = dir.join(&name);
        if !path.is_file() {
            return Err(RenderError::UnknownTemplate {
                name,
                dir: dir.to_path_buf(),
            });
        }
        let bytes = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        let content = String::from_utf8(bytes).map_err(|e| RenderError::NotUtf8 {
            offset: e.utf8_error().valid_up_to(),
            template: name.clone(),
        })?;
        templates.push(Template::new(name, content));
    }
    tracing::debug!("loaded {} template(s) from {}", templates.len(), dir.display());
    Ok(templates)
}

/// Render one template. Every placeholder must resolve; nothing is
/// substituted silently.
pub fn render(template: &Template, env: &ResolvedEnvironment) -> Result<RenderedArtifact, RenderError> {
    let mut out = String::with_capacity(template.content().len());
    for segment in template.segments()? {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder(key) => {
                let value = env.lookup(key).ok_or_else(|| RenderError::UndefinedKey {
                    key: key.to_owned(),
                    template: template.name().to_owned(),
                })?;
                out.push_str(value);
            }
        }
    }
    Ok(RenderedArtifact {
        name: template.name().to_owned(),
        content: out.into_bytes(),
    })
}

/// Render every template in order; the first failure aborts the batch.
///
/// A later template with the same name replaces the earlier artifact.
pub fn render_all(
    templates: &[Template],
    env: &ResolvedEnvironment,
) -> Result<Vec<RenderedArtifact>, RenderError> {
    let mut artifacts: Vec<RenderedArtifact> = Vec::with_capacity(templates.len());
    for template in templates {
        let artifact = render(template, env)?;
        match artifacts.iter_mut().find(|a| a.name == artifact.name) {
            Some(existing) => *existing = artifact,
            None => artifacts.push(artifact),
        }
    }
    tracing::debug!("rendered {} artifact(s) for {}", artifacts.len(), env.target());
    Ok(artifacts)
}

// ---------------------------------------------------------------------------
// TemplateSet
// ---------------------------------------------------------------------------

/// Templates loaded from one directory, ready to render against any environment.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    dir: PathBuf,
    templates: Vec<Template>,
}

impl TemplateSet {
    /// Load `names` (or every template) from `dir`.
    pub fn load(dir: &Path, names: Option<&[String]>) -> Result<Self, RenderError> {
        Ok(TemplateSet {
            dir: dir.to_path_buf(),
            templates: load_templates(dir, names)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn render(&self, env: &ResolvedEnvironment) -> Result<Vec<RenderedArtifact>, RenderError> {
        render_all(&self.templates, env)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cfgtree_core::environment::{self, inline_origin};
    use tempfile::TempDir;

    fn env() -> ResolvedEnvironment {
        let doc = environment::parse(
            "prod:\n  web:\n    db.host: db1\n    db.port: \"5432\"\n",
            &inline_origin(),
        )
        .unwrap();
        environment::resolve(&doc, &"myapp".into(), None, &"web".into()).unwrap()
    }

    #[test]
    fn renders_connection_string() {
        let t = Template::new("conn.txt", "${db.host}:${db.port}");
        let artifact = render(&t, &env()).unwrap();
        assert_eq!(artifact.name, "conn.txt");
        assert_eq!(artifact.content, b"db1:5432");
    }

    #[test]
    fn undefined_key_names_key_and_template() {
        let t = Template::new("db.properties", "user=${db.user}\n");
        match render(&t, &env()).unwrap_err() {
            RenderError::UndefinedKey { key, template } => {
                assert_eq!(key, "db.user");
                assert_eq!(template, "db.properties");
            }
            other => panic!("expected undefined key, got {other}"),
        }
    }

    #[test]
    fn list_skips_hidden_and_tmp_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("conf/sub")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("conf/sub/a.xml"), "a").unwrap();
        std::fs::write(dir.path().join(".hidden"), "h").unwrap();
        std::fs::write(dir.path().join("c.txt.tmp"), "t").unwrap();
        std::fs::write(dir.path().join(".git/config"), "g").unwrap();

        let names = list_templates(dir.path()).unwrap();
        assert_eq!(names, vec!["b.txt".to_string(), "conf/sub/a.xml".to_string()]);
    }

    #[test]
    fn load_rejects_escaping_names() {
        let dir = TempDir::new().unwrap();
        let names = vec!["../secret".to_string()];
        let err = load_templates(dir.path(), Some(&names)).unwrap_err();
        assert!(matches!(err, RenderError::InvalidName { .. }));
    }

    #[test]
    fn render_all_later_duplicate_wins() {
        let templates = vec![
            Template::new("a", "first"),
            Template::new("b", "${db.host}"),
            Template::new("a", "second"),
        ];
        let artifacts = render_all(&templates, &env()).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].content, b"second");
        assert_eq!(artifacts[1].content, b"db1");
    }
}
