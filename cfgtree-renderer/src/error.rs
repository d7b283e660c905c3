//! Error types for cfgtree-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from template loading and rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Filesystem error while listing or reading templates.
    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A placeholder names a key the resolved environment does not define.
    #[error("template '{template}' references undefined key '{key}'")]
    UndefinedKey { key: String, template: String },

    /// Placeholder syntax is broken (unterminated `${`, empty key, ...).
    #[error("template '{template}' line {line}: {message}")]
    Syntax {
        template: String,
        line: usize,
        message: String,
    },

    /// A template was requested by name but does not exist.
    #[error("template '{name}' not found in {dir}")]
    UnknownTemplate { name: String, dir: PathBuf },

    /// A requested template name cannot be a relative path under the template dir.
    #[error("invalid template name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Template content must be UTF-8 text.
    #[error("template '{template}' is not valid UTF-8 (first bad byte at offset {offset})")]
    NotUtf8 { template: String, offset: usize },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}
