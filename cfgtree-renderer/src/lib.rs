//! # cfgtree-renderer
//!
//! Expands `${key}` placeholders in a directory of templates against one
//! resolved environment.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use cfgtree_core::ResolvedEnvironment;
//! use cfgtree_renderer::TemplateSet;
//!
//! fn render_dir(env: &ResolvedEnvironment) {
//!     if let Ok(set) = TemplateSet::load(Path::new("templates"), None) {
//!         if let Ok(artifacts) = set.render(env) {
//!             for artifact in artifacts {
//!                 println!("{}: {} bytes", artifact.name, artifact.content.len());
//!             }
//!         }
//!     }
//! }
//! ```

pub mod engine;
pub mod error;
pub mod template;

pub use engine::{list_templates, load_templates, render, render_all, TemplateSet};
pub use error::RenderError;
pub use template::{RenderedArtifact, Segment, Template};
