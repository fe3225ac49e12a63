// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped filesystem access inside a workspace sandbox.
//!
//! Every path handed to a [`ScopedFs`] is normalised and, when isolation is
//! enabled, must resolve inside the sandbox root after canonicalisation.
//! Symlinks that point outside the root are caught by re-canonicalising
//! existing paths.

use crate::error::WorkspaceError;
use std::path::{Component, Path, PathBuf};

/// Directory names excluded from clones and walks unless asked for.
pub const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Options for [`ScopedFs::copy_tree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOptions {
    /// Copy VCS metadata directories as well
    pub include_vcs: bool,
}

/// Filesystem handle jailed to one workspace sandbox root.
#[derive(Debug, Clone)]
pub struct ScopedFs {
    root: PathBuf,
    isolation_enabled: bool,
}

impl ScopedFs {
    /// Bind to a sandbox root. The root must exist.
    pub fn new(root: impl Into<PathBuf>, isolation_enabled: bool) -> Result<Self, WorkspaceError> {
        let root = root.into();
        let root = root.canonicalize().map_err(|_| WorkspaceError::SourceNotFound(root))?;
        Ok(Self {
            root,
            isolation_enabled,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn isolation_enabled(&self) -> bool {
        self.isolation_enabled
    }

    /// Resolve a path (relative to the root, or absolute) to an absolute
    /// path inside the sandbox.
    ///
    /// Lexically normalises `.`/`..` first, then re-canonicalises the
    /// nearest existing ancestor so symlink escapes are caught too. Fails
    /// with a permission error when the result leaves the root and isolation
    /// is enabled.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, WorkspaceError> {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let normalized = lexical_normalize(&joined);
        if !self.isolation_enabled {
            return Ok(normalized);
        }

        if !normalized.starts_with(&self.root) {
            return Err(WorkspaceError::PathEscape {
                path: path.to_path_buf(),
            });
        }

        // Symlink check: canonicalise the deepest existing ancestor and make
        // sure it still sits under the root.
        let mut probe = normalized.clone();
        while !probe.exists() {
            match probe.parent() {
                Some(parent) => probe = parent.to_path_buf(),
                None => break,
            }
        }
        if probe.exists() {
            let canonical = probe.canonicalize()?;
            if !canonical.starts_with(&self.root) {
                return Err(WorkspaceError::PathEscape {
                    path: path.to_path_buf(),
                });
            }
        }

        Ok(normalized)
    }

    /// Read a file as UTF-8 text.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<String, WorkspaceError> {
        let resolved = self.resolve(path)?;
        Ok(std::fs::read_to_string(resolved)?)
    }

    /// Write a file, creating parent directories as needed.
    pub fn write(&self, path: impl AsRef<Path>, contents: &str) -> Result<PathBuf, WorkspaceError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&resolved, contents)?;
        Ok(resolved)
    }

    /// Delete a file or an empty directory.
    pub fn delete(&self, path: impl AsRef<Path>) -> Result<(), WorkspaceError> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            std::fs::remove_dir(&resolved)?;
        } else {
            std::fs::remove_file(&resolved)?;
        }
        Ok(())
    }

    /// True when the path exists inside the sandbox.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    /// All regular files under the root, relative and sorted, excluding VCS
    /// metadata.
    pub fn walk(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut files = Vec::new();
        walk_into(&self.root, &self.root, false, &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Recursively copy `src` into `dst`, excluding VCS metadata unless
    /// [`CopyOptions::include_vcs`] is set. Creates `dst` as needed.
    pub fn copy_tree(
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
        options: CopyOptions,
    ) -> Result<u64, WorkspaceError> {
        let src = src.as_ref();
        let dst = dst.as_ref();
        if !src.is_dir() {
            return Err(WorkspaceError::SourceNotFound(src.to_path_buf()));
        }
        std::fs::create_dir_all(dst)?;
        copy_dir(src, dst, options.include_vcs)
    }
}

/// Remove `.` and `..` components without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn is_vcs_dir(name: &std::ffi::OsStr) -> bool {
    VCS_DIRS.iter().any(|d| name == *d)
}

fn walk_into(
    root: &Path,
    dir: &Path,
    include_vcs: bool,
    out: &mut Vec<PathBuf>,
) -> Result<(), WorkspaceError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if !include_vcs && is_vcs_dir(&entry.file_name()) {
                continue;
            }
            walk_into(root, &path, include_vcs, out)?;
        } else if file_type.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

fn copy_dir(src: &Path, dst: &Path, include_vcs: bool) -> Result<u64, WorkspaceError> {
    let mut bytes = 0u64;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());
        if file_type.is_dir() {
            if !include_vcs && is_vcs_dir(&entry.file_name()) {
                continue;
            }
            std::fs::create_dir_all(&target)?;
            bytes += copy_dir(&entry.path(), &target, include_vcs)?;
        } else if file_type.is_file() {
            bytes += std::fs::copy(entry.path(), &target)?;
        }
        // Symlinks are skipped: a link target may live outside the sandbox.
    }
    Ok(bytes)
}

#[cfg(test)]
#[path = "scoped_tests.rs"]
mod tests;
