//! File emitter: writes rendered artifacts under a destination directory.
//!
//! ## Write protocol
//!
//! 1. SHA-256 the rendered content.
//! 2. SHA-256 the existing file, if any → skip if identical.
//! 3. Write to `<path>.cfgtree.tmp`.
//! 4. Rename to the final path (atomic on POSIX).

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use cfgtree_renderer::RenderedArtifact;

use crate::error::{io_err, SyncError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileWriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File already holds the rendered content.
    Unchanged { path: PathBuf },
    /// `--dry-run` mode: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

impl FileWriteResult {
    pub fn path(&self) -> &Path {
        match self {
            FileWriteResult::Written { path }
            | FileWriteResult::Unchanged { path }
            | FileWriteResult::WouldWrite { path } => path,
        }
    }
}

/// Write each artifact to `dest/<name>`, creating `dest` and any
/// sub-directories. Stops at the first failure.
pub fn emit(
    artifacts: &[RenderedArtifact],
    dest: &Path,
    dry_run: bool,
) -> Result<Vec<FileWriteResult>, SyncError> {
    if !dry_run {
        std::fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
    }

    let mut results = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = artifact_path(dest, &artifact.name)?;
        results.push(atomic_write(&path, &artifact.content, dry_run)?);
    }
    Ok(results)
}

fn artifact_path(dest: &Path, name: &str) -> Result<PathBuf, SyncError> {
    let relative = Path::new(name);
    let plain = name
        .split('/')
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !plain {
        return Err(SyncError::InvalidName {
            artifact: name.to_string(),
            reason: "must be a relative path without '.' or '..' segments".to_string(),
        });
    }
    Ok(dest.join(relative))
}

fn digest(content: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(content);
    hex::encode(h.finalize())
}

fn existing_digest(path: &Path) -> Result<Option<String>, SyncError> {
    match std::fs::read(path) {
        Ok(existing) => Ok(Some(digest(&existing))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

fn atomic_write(path: &Path, content: &[u8], dry_run: bool) -> Result<FileWriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.cfgtree.tmp", path.display()));
    atomic_write_with_tmp(path, content, dry_run, &tmp)
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &[u8],
    dry_run: bool,
    tmp: &Path,
) -> Result<FileWriteResult, SyncError> {
    if existing_digest(path)?.as_deref() == Some(digest(content).as_str()) {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(FileWriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(FileWriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(FileWriteResult::Written {
        path: path.to_path_buf(),
    })
}
