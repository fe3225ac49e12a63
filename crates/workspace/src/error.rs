// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for workspace management

use sbx_core::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by filesystem primitives, cloning, and transactions.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("permission denied: {path} resolves outside the workspace")]
    PathEscape { path: PathBuf },
    #[error("source path not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session already exists: {0}")]
    SessionExists(String),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("transaction invalid: {0}")]
    Validation(String),
    #[error("file already exists: {0}")]
    FileExists(PathBuf),
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("workspace size limit exceeded: {used_mb} MB used, {limit_mb} MB allowed")]
    SizeLimitExceeded { used_mb: u64, limit_mb: u64 },
    #[error("session limit reached: {0} active")]
    SessionLimit(usize),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkspaceError {
    /// Map onto the shared taxonomy for the tool boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkspaceError::PathEscape { .. } => ErrorKind::Permission,
            WorkspaceError::SourceNotFound(_) | WorkspaceError::FileNotFound(_) => {
                ErrorKind::FileNotFound
            }
            WorkspaceError::SessionNotFound(_) | WorkspaceError::TransactionNotFound(_) => {
                ErrorKind::Validation
            }
            WorkspaceError::SessionExists(_) | WorkspaceError::Validation(_) => {
                ErrorKind::Validation
            }
            WorkspaceError::FileExists(_) => ErrorKind::Value,
            WorkspaceError::SizeLimitExceeded { .. } | WorkspaceError::SessionLimit(_) => {
                ErrorKind::ResourceExhausted
            }
            WorkspaceError::Io(err) => ErrorKind::from_io(err),
        }
    }
}
