// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for planning and status tracking

use sbx_core::ErrorKind;
use thiserror::Error;

/// Errors raised by the planner, status manager, and approval workflow.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
    #[error("unknown task: {0}")]
    UnknownTask(String),
    #[error("unknown approval request: {0}")]
    UnknownRequest(String),
    #[error("analysis failed: {0}")]
    Analysis(#[from] sbx_workspace::WorkspaceError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlannerError {
    /// Map onto the shared taxonomy for the tool boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlannerError::InvalidPlan(_)
            | PlannerError::UnknownPlan(_)
            | PlannerError::UnknownTask(_)
            | PlannerError::UnknownRequest(_) => ErrorKind::Validation,
            PlannerError::Analysis(err) => err.kind(),
            PlannerError::Io(err) => ErrorKind::from_io(err),
        }
    }
}
