// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source-tree cloning with content hashing.
//!
//! The clone walks files in sorted order so the resulting sha-256 hash is
//! stable for identical trees; the hash keys the analysis cache.

use crate::error::WorkspaceError;
use crate::scoped::VCS_DIRS;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Result of cloning a source tree into a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneStats {
    pub files_copied: usize,
    pub bytes_copied: u64,
    /// Sha-256 over (relative path, content) pairs in sorted order
    pub content_hash: String,
}

/// Deep-copy `source` into `sandbox`, excluding VCS metadata and enforcing
/// the disk limit. Returns copy statistics including the content hash.
pub fn clone_tree(
    source: &Path,
    sandbox: &Path,
    disk_limit_mb: u64,
) -> Result<CloneStats, WorkspaceError> {
    if !source.is_dir() {
        return Err(WorkspaceError::SourceNotFound(source.to_path_buf()));
    }
    std::fs::create_dir_all(sandbox)?;

    let mut files = Vec::new();
    collect_files(source, source, &mut files)?;
    files.sort();

    let limit_bytes = disk_limit_mb.saturating_mul(1024 * 1024);
    let mut hasher = Sha256::new();
    let mut bytes_copied = 0u64;

    for relative in &files {
        let from = source.join(relative);
        let to = sandbox.join(relative);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = std::fs::read(&from)?;
        bytes_copied += content.len() as u64;
        if limit_bytes > 0 && bytes_copied > limit_bytes {
            return Err(WorkspaceError::SizeLimitExceeded {
                used_mb: bytes_copied / (1024 * 1024) + 1,
                limit_mb: disk_limit_mb,
            });
        }

        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(&content);
        std::fs::write(&to, &content)?;
    }

    let content_hash = format!("{:x}", hasher.finalize());
    tracing::debug!(
        files = files.len(),
        bytes = bytes_copied,
        hash = %&content_hash[..12],
        "cloned source tree"
    );

    Ok(CloneStats {
        files_copied: files.len(),
        bytes_copied,
        content_hash,
    })
}

/// Hash an existing tree the same way [`clone_tree`] does while copying.
pub fn hash_tree(root: &Path) -> Result<String, WorkspaceError> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in &files {
        let content = std::fs::read(root.join(relative))?;
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(&content);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<PathBuf>,
) -> Result<(), WorkspaceError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if VCS_DIRS.iter().any(|d| entry.file_name() == *d) {
                continue;
            }
            collect_files(root, &entry.path(), out)?;
        } else if file_type.is_file() {
            if let Ok(relative) = entry.path().strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "clone_tests.rs"]
mod tests;
