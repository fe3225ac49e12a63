// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side-effect records: file changes and command invocations.
//!
//! Every mutation performed through the sandbox executor is appended to an
//! ordered history so failed tasks can be audited, rolled back, or replayed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Exit code recorded when the executor itself failed to run the command.
pub const EXIT_INTERNAL_FAILURE: i32 = -1;

/// Exit code recorded when a command exceeded its timeout.
pub const EXIT_TIMEOUT: i32 = -2;

/// Kind of filesystem mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Modify,
    Delete,
    Move,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Create => write!(f, "create"),
            ChangeType::Modify => write!(f, "modify"),
            ChangeType::Delete => write!(f, "delete"),
            ChangeType::Move => write!(f, "move"),
        }
    }
}

/// Record of one filesystem mutation inside a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub file_path: PathBuf,
    pub change_type: ChangeType,
    /// Content before the change (absent for creates)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_content: Option<String>,
    /// Content after the change (absent for deletes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_content: Option<String>,
    /// Id of the task or transaction that performed the change, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub at_epoch_ms: u64,
}

impl FileChange {
    pub fn new(file_path: impl Into<PathBuf>, change_type: ChangeType, at_epoch_ms: u64) -> Self {
        Self {
            file_path: file_path.into(),
            change_type,
            before_content: None,
            after_content: None,
            owner: None,
            at_epoch_ms,
        }
    }

    pub fn with_before(mut self, content: impl Into<String>) -> Self {
        self.before_content = Some(content.into());
        self
    }

    pub fn with_after(mut self, content: impl Into<String>) -> Self {
        self.after_content = Some(content.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Record of one command invocation inside a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub command: String,
    pub working_directory: PathBuf,
    pub stdout: String,
    pub stderr: String,
    /// Child exit code; [`EXIT_INTERNAL_FAILURE`] for spawn failures,
    /// [`EXIT_TIMEOUT`] for timeouts
    pub exit_code: i32,
    pub duration_seconds: f64,
    pub at_epoch_ms: u64,
}

impl CommandInfo {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == EXIT_TIMEOUT
    }
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
