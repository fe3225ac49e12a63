// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the daemon layer

use sbx_core::ErrorKind;
use thiserror::Error;

/// Errors raised by resource governance, connection management, and tool
/// dispatch.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("resource limit exceeded: {0}")]
    ResourceExhausted(String),
    #[error("rate limited: retry after {retry_after_secs:.1}s")]
    RateLimited { retry_after_secs: f64 },
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("workspace error: {0}")]
    Workspace(#[from] sbx_workspace::WorkspaceError),
    #[error("planner error: {0}")]
    Planner(#[from] sbx_planner::PlannerError),
    #[error("engine error: {0}")]
    Engine(#[from] sbx_engine::EngineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    /// Map onto the shared taxonomy for the tool boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DaemonError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            DaemonError::RateLimited { .. } => ErrorKind::RateLimited,
            DaemonError::ConnectionRefused(_) => ErrorKind::RateLimited,
            DaemonError::UnknownTool(_)
            | DaemonError::InvalidArgument(_)
            | DaemonError::UnknownSession(_) => ErrorKind::Validation,
            DaemonError::Workspace(err) => err.kind(),
            DaemonError::Planner(err) => err.kind(),
            DaemonError::Engine(err) => err.kind(),
            DaemonError::Io(err) => ErrorKind::from_io(err),
        }
    }

    /// Retry-after hint for rate-limit style denials.
    pub fn retry_after_secs(&self) -> Option<f64> {
        match self {
            DaemonError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
