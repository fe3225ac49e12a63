// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task, subtask, and plan data model.
//!
//! Plans form a dependency graph, not a tree: tasks and subtasks carry
//! explicit dependency id lists and the status manager keys progress by id,
//! so ownership stays acyclic even when the dependency graph is dense.

use crate::error::ErrorInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a task or subtask.
    ///
    /// Subtask ids are conventionally derived from the parent task id with a
    /// suffix (`<task>_core`, `<task>_testing`), but nothing relies on that
    /// shape; ids are opaque.
    pub struct TaskId;
}

crate::define_id! {
    /// Unique identifier for a task plan.
    pub struct PlanId;
}

/// Execution status of a task or subtask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::NotStarted => write!(f, "not_started"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// A unit of work nested under a task.
///
/// Same shape as a task minus further nesting; dependency ids are scoped to
/// sibling subtasks of the same parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: TaskId,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Subtask {
    pub fn new(id: impl Into<TaskId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::NotStarted,
            dependencies: Vec::new(),
            estimated_duration_min: None,
            actual_duration_min: None,
            error_info: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_dependency(mut self, dep: impl Into<TaskId>) -> Self {
        self.dependencies.push(dep.into());
        self
    }
}

/// A unit of work with status, dependencies, and optional subtasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Ids of sibling tasks that must complete before this one starts
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::NotStarted,
            dependencies: Vec::new(),
            subtasks: Vec::new(),
            estimated_duration_min: None,
            actual_duration_min: None,
            error_info: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_dependency(mut self, dep: impl Into<TaskId>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    PendingApproval,
    Approved,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Draft => write!(f, "draft"),
            PlanStatus::PendingApproval => write!(f, "pending_approval"),
            PlanStatus::Approved => write!(f, "approved"),
            PlanStatus::Executing => write!(f, "executing"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Approval state of a plan, tracked separately from its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    NeedsRevision,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
            ApprovalStatus::NeedsRevision => write!(f, "needs_revision"),
        }
    }
}

/// Snapshot of the codebase a plan was derived from.
///
/// Carried on the plan so the execution engine can resolve the workspace and
/// the planner can re-derive estimates without re-analysing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodebaseContext {
    pub workspace_path: PathBuf,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub lines_of_code: u64,
    #[serde(default)]
    pub summary: String,
}

/// A dependency-ordered collection of tasks derived from a goal description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub id: PlanId,
    pub description: String,
    /// Tasks in declaration order; execution respects dependencies, breaking
    /// ties by this order
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub context: CodebaseContext,
    pub created_at_ms: u64,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl TaskPlan {
    pub fn new(id: impl Into<PlanId>, description: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            tasks: Vec::new(),
            context: CodebaseContext::default(),
            created_at_ms,
            status: PlanStatus::Draft,
            approval_status: ApprovalStatus::Pending,
            metadata: BTreeMap::new(),
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// All task ids in declaration order.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }

    /// True once every task reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
