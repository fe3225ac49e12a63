// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the execution engine

use sbx_core::{ErrorKind, TaskId};
use sbx_workspace::WorkspaceError;
use thiserror::Error;

/// Errors that can occur while executing plans and tasks.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("task {task_id} failed: {message}")]
    TaskFailed { task_id: TaskId, message: String },
    #[error("plan stuck: {remaining} tasks have unsatisfiable dependencies")]
    PlanStuck { remaining: usize },
    #[error("retry budget exhausted for task {task_id} after {attempts} attempts")]
    MaxRetriesExceeded { task_id: TaskId, attempts: usize },
    #[error("invalid plan: {0}")]
    Validation(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Map onto the shared taxonomy for the tool boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Workspace(err) => err.kind(),
            EngineError::TaskFailed { .. } => ErrorKind::Runtime,
            EngineError::PlanStuck { .. } => ErrorKind::Validation,
            EngineError::MaxRetriesExceeded { .. } => ErrorKind::MaxRetriesExceeded,
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Io(err) => ErrorKind::from_io(err),
        }
    }
}
