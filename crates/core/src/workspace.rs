// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace identifier, isolation config, and lifecycle status.
//!
//! A workspace is an isolated deep copy of a source tree, exclusively owned
//! by one session. The sandbox path is never a prefix relation of the source
//! path; every scoped file access canonicalises inside it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a workspace instance.
    pub struct WorkspaceId;
}

/// Status of a workspace in its lifecycle.
///
/// Destruction happens exactly once; repeated destroy calls observe
/// `Destroyed` and no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    /// Clone in progress
    #[default]
    Creating,
    /// Ready for task execution
    Active,
    /// Temporarily parked (no executor bound)
    Suspended,
    /// Sandbox directory removal in progress
    CleaningUp,
    /// Sandbox removed; terminal
    Destroyed,
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceStatus::Creating => write!(f, "creating"),
            WorkspaceStatus::Active => write!(f, "active"),
            WorkspaceStatus::Suspended => write!(f, "suspended"),
            WorkspaceStatus::CleaningUp => write!(f, "cleaning_up"),
            WorkspaceStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Resource ceilings applied to a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_mb: u64,
    pub cpu_cores: u32,
    pub disk_mb: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: 512,
            cpu_cores: 1,
            disk_mb: 1024,
        }
    }
}

/// Isolation settings for a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// True when a container backend encloses the sandbox
    pub container_backed: bool,
    pub limits: ResourceLimits,
    /// When false, scoped path checks are skipped (trusted embedding only)
    pub enabled: bool,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            container_backed: false,
            limits: ResourceLimits::default(),
            enabled: true,
        }
    }
}

/// An isolated copy of a source tree owned by one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    /// Original tree, outside the sandbox; never written
    pub source_path: PathBuf,
    /// Exclusive sandbox directory all scoped access resolves inside
    pub sandbox_path: PathBuf,
    pub isolation: IsolationConfig,
    pub status: WorkspaceStatus,
    /// Sha-256 over the cloned tree, used as the analysis cache key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub created_at_ms: u64,
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
