//! Templates and placeholder scanning.
//!
//! A placeholder is `${key}` or `${key.sub.key}`; surrounding whitespace inside
//! the braces is ignored. `$${` writes a literal `${`. Everything else is
//! copied through byte for byte.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::RenderError;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$\{|\$\{([^}\n]*)\}|\$\{").expect("invalid placeholder pattern")
});

/// A named template. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    content: String,
}

/// One piece of a scanned template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

impl Template {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Template {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Split the content into literal text and placeholder keys.
    pub fn segments(&self) -> Result<Vec<Segment<'_>>, RenderError> {
        let content = self.content.as_str();
        let mut segments = Vec::new();
        let mut cursor = 0;

        for caps in TOKEN.captures_iter(content) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() > cursor {
                segments.push(Segment::Literal(&content[cursor..whole.start()]));
            }
            cursor = whole.end();

            match whole.as_str() {
                "$${" => segments.push(Segment::Literal("${")),
                "${" => {
                    return Err(self.syntax(whole.start(), "unterminated placeholder '${'"));
                }
                _ => {
                    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let key = raw.trim();
                    if let Some(problem) = key_problem(key) {
                        return Err(self.syntax(whole.start(), problem));
                    }
                    segments.push(Segment::Placeholder(key));
                }
            }
        }
        if cursor < content.len() {
            segments.push(Segment::Literal(&content[cursor..]));
        }
        Ok(segments)
    }

    /// Distinct placeholder keys in order of first appearance.
    pub fn placeholders(&self) -> Result<Vec<&str>, RenderError> {
        let mut keys: Vec<&str> = Vec::new();
        for segment in self.segments()? {
            if let Segment::Placeholder(key) = segment {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    fn syntax(&self, offset: usize, message: impl Into<String>) -> RenderError {
        RenderError::Syntax {
            template: self.name.clone(),
            line: self.content[..offset].matches('\n').count() + 1,
            message: message.into(),
        }
    }
}

fn key_problem(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("empty placeholder '${}'".to_string());
    }
    if key.split('.').any(str::is_empty) {
        return Some(format!("placeholder key '{key}' has an empty segment"));
    }
    if key.contains(['$', '{']) {
        return Some(format!("placeholder key '{key}' contains '$' or '{{'"));
    }
    None
}

/// The rendered output of one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub name: String,
    pub content: Vec<u8>,
}
