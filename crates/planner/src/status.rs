// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic task status tracking.
//!
//! Progress for every registered task and subtask lives in one map keyed by
//! id, guarded by a single mutex. Listener notification happens inside the
//! lock, so for any task the observed update order is exactly the call
//! order; listener panics are isolated and logged.

use crate::error::PlannerError;
use sbx_core::{Clock, ErrorInfo, PlanId, Subtask, TaskId, TaskPlan, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Progress default when a task first enters `InProgress`.
const DEFAULT_START_PROGRESS: f64 = 5.0;

/// Live progress for one task or subtask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub task_id: TaskId,
    pub plan_id: PlanId,
    /// Present for subtasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    pub description: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    /// In [0, 100]
    pub progress_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

impl TaskProgress {
    /// Milliseconds spent so far (or total, once ended).
    pub fn elapsed_ms(&self, now_ms: u64) -> Option<u64> {
        let start = self.started_at_ms?;
        let end = self.ended_at_ms.unwrap_or(now_ms);
        Some(end.saturating_sub(start))
    }

    /// Best-effort remaining milliseconds: estimate-based when one exists,
    /// otherwise extrapolated from progress.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        if self.status.is_terminal() {
            return Some(0);
        }
        let elapsed = self.elapsed_ms(now_ms)?;
        if let Some(estimate_min) = self.estimated_duration_min {
            let estimate_ms = estimate_min as u64 * 60_000;
            return Some(estimate_ms.saturating_sub(elapsed));
        }
        if self.progress_percentage > 0.0 {
            let projected = (elapsed as f64 / (self.progress_percentage / 100.0)) as u64;
            return Some(projected.saturating_sub(elapsed));
        }
        None
    }
}

/// One status transition, delivered to listeners in call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub plan_id: PlanId,
    pub task_id: TaskId,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    pub at_epoch_ms: u64,
}

/// Observer for status transitions. Called synchronously under the
/// manager's lock; implementations must not call back into the manager.
pub trait StatusListener: Send + Sync {
    fn on_update(&self, update: &StatusUpdate);
}

/// Aggregated progress of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub plan_id: PlanId,
    pub total_tasks: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub error: usize,
    /// Completed over total, in [0, 100]
    pub completion_percentage: f64,
    /// Best-effort remaining milliseconds across unfinished tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
}

/// Requested mutation for [`StatusManager::modify_task`].
#[derive(Debug, Clone, Default)]
pub struct TaskModification {
    pub description: Option<String>,
    pub estimated_duration_min: Option<u32>,
    pub add_dependencies: Vec<TaskId>,
    pub remove_dependencies: Vec<TaskId>,
}

struct Inner {
    progress: HashMap<TaskId, TaskProgress>,
    /// Top-level task ids per plan, declaration order
    plans: HashMap<PlanId, Vec<TaskId>>,
    history: HashMap<TaskId, Vec<StatusUpdate>>,
    listeners: Vec<(usize, Arc<dyn StatusListener>)>,
    next_listener_id: usize,
    needs_revalidation: HashMap<PlanId, bool>,
}

/// Tracks per-task progress and plan-level aggregation.
pub struct StatusManager<C: Clock> {
    clock: C,
    inner: Mutex<Inner>,
}

impl<C: Clock> StatusManager<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner {
                progress: HashMap::new(),
                plans: HashMap::new(),
                history: HashMap::new(),
                listeners: Vec::new(),
                next_listener_id: 0,
                needs_revalidation: HashMap::new(),
            }),
        }
    }

    /// Register every task and subtask of a plan for tracking.
    pub fn register_plan(&self, plan: &TaskPlan) {
        let mut inner = self.inner.lock();
        let mut task_ids = Vec::with_capacity(plan.tasks.len());
        for task in &plan.tasks {
            task_ids.push(task.id.clone());
            inner.progress.insert(
                task.id.clone(),
                TaskProgress {
                    task_id: task.id.clone(),
                    plan_id: plan.id.clone(),
                    parent_task_id: None,
                    description: task.description.clone(),
                    status: task.status,
                    started_at_ms: None,
                    ended_at_ms: None,
                    progress_percentage: 0.0,
                    estimated_duration_min: task.estimated_duration_min,
                    actual_duration_min: None,
                    error_info: None,
                    dependencies: task.dependencies.clone(),
                },
            );
            for subtask in &task.subtasks {
                inner.progress.insert(
                    subtask.id.clone(),
                    TaskProgress {
                        task_id: subtask.id.clone(),
                        plan_id: plan.id.clone(),
                        parent_task_id: Some(task.id.clone()),
                        description: subtask.description.clone(),
                        status: subtask.status,
                        started_at_ms: None,
                        ended_at_ms: None,
                        progress_percentage: 0.0,
                        estimated_duration_min: subtask.estimated_duration_min,
                        actual_duration_min: None,
                        error_info: None,
                        dependencies: subtask.dependencies.clone(),
                    },
                );
            }
        }
        inner.plans.insert(plan.id.clone(), task_ids);
    }

    /// Apply a status transition and notify listeners.
    pub fn update_task_status(
        &self,
        task_id: &TaskId,
        new_status: TaskStatus,
        message: Option<String>,
        progress: Option<f64>,
        error: Option<ErrorInfo>,
    ) -> Result<StatusUpdate, PlannerError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();

        let entry = inner
            .progress
            .get_mut(task_id)
            .ok_or_else(|| PlannerError::UnknownTask(task_id.to_string()))?;

        let old_status = entry.status;
        entry.status = new_status;

        match new_status {
            TaskStatus::InProgress => {
                if entry.started_at_ms.is_none() {
                    entry.started_at_ms = Some(now);
                }
                entry.progress_percentage = progress
                    .unwrap_or(DEFAULT_START_PROGRESS)
                    .clamp(0.0, 100.0);
            }
            TaskStatus::Completed => {
                entry.ended_at_ms = Some(now);
                entry.progress_percentage = 100.0;
                if let Some(elapsed) = entry.elapsed_ms(now) {
                    entry.actual_duration_min = Some((elapsed as f64 / 60_000.0).ceil() as u32);
                }
            }
            TaskStatus::Error => {
                entry.ended_at_ms = Some(now);
                entry.error_info = error.clone();
                if let Some(progress) = progress {
                    entry.progress_percentage = progress.clamp(0.0, 100.0);
                }
            }
            TaskStatus::NotStarted => {
                entry.started_at_ms = None;
                entry.ended_at_ms = None;
                entry.progress_percentage = 0.0;
            }
        }
        let plan_id = entry.plan_id.clone();

        let update = StatusUpdate {
            plan_id,
            task_id: task_id.clone(),
            old_status,
            new_status,
            message,
            progress,
            at_epoch_ms: now,
        };
        inner
            .history
            .entry(task_id.clone())
            .or_default()
            .push(update.clone());

        // Notify inside the lock: updates for one task are observed in call
        // order. Panicking listeners are isolated.
        for (listener_id, listener) in &inner.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_update(&update)
            }));
            if result.is_err() {
                tracing::warn!(listener = *listener_id, "status listener panicked");
            }
        }

        Ok(update)
    }

    pub fn task_progress(&self, task_id: &TaskId) -> Option<TaskProgress> {
        self.inner.lock().progress.get(task_id).cloned()
    }

    /// Counts by status, completion percentage, and remaining-time estimate
    /// for a plan's top-level tasks.
    pub fn plan_progress(&self, plan_id: &PlanId) -> Result<PlanProgress, PlannerError> {
        let now = self.clock.epoch_ms();
        let inner = self.inner.lock();
        let task_ids = inner
            .plans
            .get(plan_id)
            .ok_or_else(|| PlannerError::UnknownPlan(plan_id.to_string()))?;

        let mut counts = [0usize; 4];
        let mut remaining: Option<u64> = None;
        for task_id in task_ids {
            let Some(progress) = inner.progress.get(task_id) else {
                continue;
            };
            let slot = match progress.status {
                TaskStatus::NotStarted => 0,
                TaskStatus::InProgress => 1,
                TaskStatus::Completed => 2,
                TaskStatus::Error => 3,
            };
            counts[slot] += 1;

            if !progress.status.is_terminal() {
                let task_remaining = progress.remaining_ms(now).or_else(|| {
                    progress
                        .estimated_duration_min
                        .map(|m| m as u64 * 60_000)
                });
                if let Some(ms) = task_remaining {
                    remaining = Some(remaining.unwrap_or(0) + ms);
                }
            }
        }

        let total = task_ids.len();
        let completion = if total == 0 {
            100.0
        } else {
            counts[2] as f64 / total as f64 * 100.0
        };

        Ok(PlanProgress {
            plan_id: plan_id.clone(),
            total_tasks: total,
            not_started: counts[0],
            in_progress: counts[1],
            completed: counts[2],
            error: counts[3],
            completion_percentage: completion,
            remaining_ms: remaining,
        })
    }

    /// Modify a registered task; flags the plan for revalidation.
    pub fn modify_task(
        &self,
        task_id: &TaskId,
        modification: TaskModification,
    ) -> Result<(), PlannerError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .progress
            .get_mut(task_id)
            .ok_or_else(|| PlannerError::UnknownTask(task_id.to_string()))?;

        if let Some(description) = modification.description {
            entry.description = description;
        }
        if let Some(estimate) = modification.estimated_duration_min {
            entry.estimated_duration_min = Some(estimate);
        }
        for dep in modification.add_dependencies {
            if !entry.dependencies.contains(&dep) {
                entry.dependencies.push(dep);
            }
        }
        entry
            .dependencies
            .retain(|d| !modification.remove_dependencies.contains(d));

        let plan_id = entry.plan_id.clone();
        inner.needs_revalidation.insert(plan_id, true);
        Ok(())
    }

    /// True when a task was modified since the plan was registered.
    pub fn needs_revalidation(&self, plan_id: &PlanId) -> bool {
        self.inner
            .lock()
            .needs_revalidation
            .get(plan_id)
            .copied()
            .unwrap_or(false)
    }

    /// Replace a task's subtask progress entries with new subtasks.
    pub fn replan_from_task(
        &self,
        task_id: &TaskId,
        new_subtasks: &[Subtask],
    ) -> Result<(), PlannerError> {
        let mut inner = self.inner.lock();
        let parent = inner
            .progress
            .get(task_id)
            .cloned()
            .ok_or_else(|| PlannerError::UnknownTask(task_id.to_string()))?;

        // Drop progress for the task's previous subtasks
        let stale: Vec<TaskId> = inner
            .progress
            .values()
            .filter(|p| p.parent_task_id.as_ref() == Some(task_id))
            .map(|p| p.task_id.clone())
            .collect();
        for id in &stale {
            inner.progress.remove(id);
            inner.history.remove(id);
        }

        for subtask in new_subtasks {
            inner.progress.insert(
                subtask.id.clone(),
                TaskProgress {
                    task_id: subtask.id.clone(),
                    plan_id: parent.plan_id.clone(),
                    parent_task_id: Some(task_id.clone()),
                    description: subtask.description.clone(),
                    status: subtask.status,
                    started_at_ms: None,
                    ended_at_ms: None,
                    progress_percentage: 0.0,
                    estimated_duration_min: subtask.estimated_duration_min,
                    actual_duration_min: None,
                    error_info: None,
                    dependencies: subtask.dependencies.clone(),
                },
            );
        }
        Ok(())
    }

    /// Updates observed for one task, in call order.
    pub fn status_history(&self, task_id: &TaskId) -> Vec<StatusUpdate> {
        self.inner
            .lock()
            .history
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Tasks currently in progress, optionally filtered by plan.
    pub fn active_tasks(&self, plan_id: Option<&PlanId>) -> Vec<TaskProgress> {
        let inner = self.inner.lock();
        let mut active: Vec<TaskProgress> = inner
            .progress
            .values()
            .filter(|p| p.status == TaskStatus::InProgress)
            .filter(|p| plan_id.map_or(true, |id| &p.plan_id == id))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        active
    }

    /// Register a listener; returns a token for removal.
    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) -> usize {
        let mut inner = self.inner.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&self, token: usize) {
        self.inner.lock().listeners.retain(|(id, _)| *id != token);
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
