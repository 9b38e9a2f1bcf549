// src/fsutil.rs

//! Filesystem walk utilities shared by the merge engine, the packager and
//! the cleanup pass.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Per-entry decision taken by a tree visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeVisit {
    /// Visit this entry.
    Keep,
    /// Skip this entry only.
    SkipEntry,
    /// Skip this entry and, for a directory, everything beneath it.
    SkipSubtree,
}

/// Deterministic (name-sorted) walk over the files of a tree, calling
/// `visit` with the path relative to `base` plus the absolute path for
/// every file the `decide` callback keeps.
pub fn visit_files(
    base: &Path,
    mut decide: impl FnMut(&Path) -> TreeVisit,
    mut visit: impl FnMut(&Path, &Path) -> Result<()>,
) -> Result<()> {
    let mut walker = WalkDir::new(base).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| Error::IoError(format!("Cannot walk {}: {}", base.display(), e)))?;
        let rel = entry
            .path()
            .strip_prefix(base)
            .map_err(|e| Error::IoError(e.to_string()))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        match decide(rel) {
            TreeVisit::SkipSubtree => {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
            }
            TreeVisit::SkipEntry => {}
            TreeVisit::Keep => {
                if entry.file_type().is_file() {
                    visit(rel, entry.path())?;
                }
            }
        }
    }
    Ok(())
}

/// Recursively delete a directory if it exists.
pub fn delete_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path)
        .map_err(|e| Error::IoError(format!("Cannot delete {}: {}", path.display(), e)))
}
