// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-driven plan execution.
//!
//! Tasks run sequentially per plan, in a deterministic dependency-respecting
//! order: among eligible tasks the earliest declared wins. The first task
//! failure stops the plan. Failures are handed to the retry engine by the
//! caller; the engine itself records them and surfaces a structured result.

use crate::error::EngineError;
use crate::executor::{PackageManager, SandboxExecutor};
use crate::recovery::{suggest_recovery, RecoveryAction, RecoveryRegistry};
use crate::retry::{AttemptInfo, RetryConfig, RetryContext};
use sbx_core::{
    Clock, CommandInfo, ErrorInfo, ErrorKind, FileChange, PlanId, PlanStatus, Task, TaskId,
    TaskPlan, TaskStatus, EXIT_INTERNAL_FAILURE, EXIT_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Observer notified of task status transitions during execution.
///
/// Implementations must not block and must not panic; the daemon bridges
/// these callbacks into the status manager.
pub trait StatusSink: Send + Sync {
    fn on_status(
        &self,
        plan_id: &PlanId,
        task_id: &TaskId,
        status: TaskStatus,
        error: Option<&ErrorInfo>,
    );
}

/// Outcome of one task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub success: bool,
    pub duration_seconds: f64,
    pub changes_made: Vec<FileChange>,
    pub commands_executed: Vec<CommandInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
    pub output: String,
}

/// Aggregated outcome of a plan execution.
///
/// `total_duration` is the single duration field; callers that expect the
/// legacy `execution_time` name mirror it at the tool boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_id: PlanId,
    pub success: bool,
    pub total_tasks: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    /// Completed over total, in [0, 1]
    pub success_rate: f64,
    /// Wall-clock seconds for the whole plan
    pub total_duration: f64,
    pub task_results: Vec<TaskResult>,
    pub summary: String,
}

/// Directive for continuing after a task failure.
///
/// Only [`PlanDirective::StopPlan`] is constructed today; the variant exists
/// as the seam for richer continuation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDirective {
    StopPlan,
}

/// Executes task plans inside their workspaces.
pub struct ExecutionEngine<C: Clock> {
    clock: C,
    /// Used when a plan's context carries no workspace path
    fallback_root: PathBuf,
    registry: RecoveryRegistry,
    retry_config: RetryConfig,
    /// Default timeout applied to per-plan executors; `None` disables
    command_timeout: Option<std::time::Duration>,
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl<C: Clock> ExecutionEngine<C> {
    pub fn new(clock: C, fallback_root: impl Into<PathBuf>) -> Self {
        Self {
            clock,
            fallback_root: fallback_root.into(),
            registry: RecoveryRegistry::with_defaults(),
            retry_config: RetryConfig::default(),
            command_timeout: Some(crate::executor::DEFAULT_COMMAND_TIMEOUT),
            sinks: Vec::new(),
        }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn add_status_sink(&mut self, sink: Arc<dyn StatusSink>) {
        self.sinks.push(sink);
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    fn notify(
        &self,
        plan_id: &PlanId,
        task_id: &TaskId,
        status: TaskStatus,
        error: Option<&ErrorInfo>,
    ) {
        for sink in &self.sinks {
            sink.on_status(plan_id, task_id, status, error);
        }
    }

    /// Build the executor for a plan's workspace.
    pub fn executor_for_plan(
        &self,
        plan: &TaskPlan,
    ) -> Result<SandboxExecutor<C>, EngineError> {
        let root = if plan.context.workspace_path.as_os_str().is_empty() {
            self.fallback_root.clone()
        } else {
            plan.context.workspace_path.clone()
        };
        SandboxExecutor::new(
            &root,
            true,
            self.clock.clone(),
            crate::executor::ExecutorConfig {
                default_timeout: self.command_timeout,
            },
        )
    }

    /// Execute every task of the plan in dependency order.
    pub async fn execute_plan(
        &self,
        plan: &mut TaskPlan,
    ) -> Result<ExecutionResult, EngineError> {
        let executor = self.executor_for_plan(plan)?;
        executor.validate_environment()?;

        plan.status = PlanStatus::Executing;
        let started = self.clock.now();
        let plan_id = plan.id.clone();
        let mut task_results: Vec<TaskResult> = Vec::new();
        let mut failed = false;

        tracing::info!(plan = %plan_id, tasks = plan.tasks.len(), "plan execution started");

        loop {
            if plan.tasks.iter().all(|t| t.status.is_terminal()) {
                break;
            }

            let Some(index) = next_eligible(plan) else {
                let remaining = plan
                    .tasks
                    .iter()
                    .filter(|t| !t.status.is_terminal())
                    .count();
                plan.status = PlanStatus::Failed;
                tracing::error!(plan = %plan_id, remaining, "plan stuck");
                return Err(EngineError::PlanStuck { remaining });
            };

            let task_id = plan.tasks[index].id.clone();
            plan.tasks[index].status = TaskStatus::InProgress;
            self.notify(&plan_id, &task_id, TaskStatus::InProgress, None);

            executor.clear_history();
            let mut task = plan.tasks[index].clone();
            let result = self.execute_task(&mut task, &executor).await;
            task.actual_duration_min = Some((result.duration_seconds / 60.0).ceil() as u32);

            if result.success {
                task.status = TaskStatus::Completed;
                plan.tasks[index] = task;
                self.notify(&plan_id, &task_id, TaskStatus::Completed, None);
                task_results.push(result);
            } else {
                task.status = TaskStatus::Error;
                task.error_info = result.error_info.clone();
                plan.tasks[index] = task;
                self.notify(
                    &plan_id,
                    &task_id,
                    TaskStatus::Error,
                    result.error_info.as_ref(),
                );
                task_results.push(result);
                failed = true;
                match self.on_task_failure() {
                    PlanDirective::StopPlan => break,
                }
            }
        }

        let total_duration = self.clock.now().duration_since(started).as_secs_f64();
        let total_tasks = plan.tasks.len();
        let tasks_completed = plan
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let tasks_failed = plan
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Error)
            .count();
        let success = !failed && tasks_completed == total_tasks;
        plan.status = if success {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };

        let success_rate = if total_tasks == 0 {
            1.0
        } else {
            tasks_completed as f64 / total_tasks as f64
        };
        let summary = format!(
            "{}/{} tasks completed in {}",
            tasks_completed,
            total_tasks,
            sbx_core::format_elapsed(total_duration as u64)
        );

        tracing::info!(plan = %plan_id, %summary, success, "plan execution finished");

        Ok(ExecutionResult {
            plan_id,
            success,
            total_tasks,
            tasks_completed,
            tasks_failed,
            success_rate,
            total_duration,
            task_results,
            summary,
        })
    }

    /// Continuation policy seam; only stop-on-first-failure today.
    fn on_task_failure(&self) -> PlanDirective {
        PlanDirective::StopPlan
    }

    /// Execute one task (its subtasks in declaration order, or the task
    /// itself), returning a structured result.
    pub async fn execute_task(
        &self,
        task: &mut Task,
        executor: &SandboxExecutor<C>,
    ) -> TaskResult {
        let started = self.clock.now();
        let mut output = String::new();
        let mut error_info = None;

        if task.subtasks.is_empty() {
            if let Err(info) = self.run_action(&task.description, &task.id, executor).await {
                error_info = Some(info);
            } else {
                output = format!("completed: {}", task.description);
            }
        } else {
            for subtask in task.subtasks.iter_mut() {
                subtask.status = TaskStatus::InProgress;
                match self
                    .run_action(&subtask.description, &subtask.id, executor)
                    .await
                {
                    Ok(()) => {
                        subtask.status = TaskStatus::Completed;
                    }
                    Err(info) => {
                        subtask.status = TaskStatus::Error;
                        subtask.error_info = Some(info.clone());
                        error_info = Some(info);
                        break;
                    }
                }
            }
            if error_info.is_none() {
                output = format!("completed {} subtasks", task.subtasks.len());
            }
        }

        TaskResult {
            task_id: task.id.clone(),
            success: error_info.is_none(),
            duration_seconds: self.clock.now().duration_since(started).as_secs_f64(),
            changes_made: executor.file_changes(),
            commands_executed: executor.commands_executed(),
            error_info,
            output,
        }
    }

    /// Derive and run the concrete action for a task description.
    ///
    /// Placeholder dispatch around the command executor; a full system
    /// injects per-task-type executors behind the same contract.
    async fn run_action(
        &self,
        description: &str,
        task_id: &TaskId,
        executor: &SandboxExecutor<C>,
    ) -> Result<(), ErrorInfo> {
        let desc_lower = description.to_lowercase();

        if let Some(command) = extract_command(description) {
            let info = executor.execute(&command, None, None).await;
            if info.success() {
                return Ok(());
            }
            return Err(classify_command_failure(&info));
        }

        if desc_lower.contains("install")
            && (desc_lower.contains("package") || desc_lower.contains("dependencies"))
        {
            let root = executor.workspace_root();
            if root.join("requirements.txt").exists() {
                let info = executor
                    .execute("pip install -r requirements.txt", None, None)
                    .await;
                if !info.success() {
                    return Err(classify_command_failure(&info));
                }
            } else if root.join("package.json").exists() {
                let info = executor.install_package("", PackageManager::Npm).await;
                if !info.success() {
                    return Err(classify_command_failure(&info));
                }
            }
            return Ok(());
        }

        if desc_lower.contains("create") && desc_lower.contains("file") {
            let name = format!("task_{}.out", task_id.short(8));
            return executor.create_file(&name, description).map_err(|err| {
                ErrorInfo::new(err.kind(), err.to_string(), self.clock.epoch_ms())
            });
        }

        if desc_lower.contains("run") || desc_lower.contains("execute") {
            let info = executor
                .execute(&format!("echo {}", shell_quote(description)), None, None)
                .await;
            if info.success() {
                return Ok(());
            }
            return Err(classify_command_failure(&info));
        }

        // Analysis/planning style steps have no executable action
        Ok(())
    }

    /// Build a retry context for a failed task.
    pub fn handle_error(
        &self,
        task: &Task,
        error: ErrorInfo,
        executor: &SandboxExecutor<C>,
    ) -> RetryContext {
        let changes = executor.file_changes();
        let commands = executor.commands_executed();

        let mut info = error
            .with_context("task_id", task.id.as_str())
            .with_context("task_description", task.description.clone())
            .with_context(
                "workspace_path",
                executor.workspace_root().display().to_string(),
            )
            .with_context(
                "recent_file_changes",
                changes.len().min(5).to_string(),
            )
            .with_context("recent_commands", commands.len().min(3).to_string());
        for (slot, change) in changes.iter().rev().take(5).enumerate() {
            info = info.with_context(
                format!("change_{}", slot),
                change.file_path.display().to_string(),
            );
        }
        for (slot, command) in commands.iter().rev().take(3).enumerate() {
            info = info.with_context(format!("command_{}", slot), command.command.clone());
        }

        let suggestions = suggest_recovery(&info, executor.workspace_root(), &changes, &commands);
        let strategies = self.registry.strategies_for(info.kind);

        let mut context = RetryContext::new(task.clone(), info.clone(), self.retry_config.clone());
        context.suggestions = suggestions;
        context.strategies = strategies;
        // The failed original run counts as attempt one
        context.record_attempt(AttemptInfo {
            attempt_number: 1,
            at_epoch_ms: info.at_epoch_ms,
            duration_seconds: 0.0,
            success: false,
            error_info: Some(info),
            changes_made: changes.len(),
            commands_executed: commands.len(),
        });
        context
    }

    /// Retry a failed task with backoff and recovery.
    ///
    /// Fails with [`EngineError::MaxRetriesExceeded`] once the budget is
    /// spent. Every attempt is appended to the context regardless of outcome.
    pub async fn retry_task(
        &self,
        context: &mut RetryContext,
        executor: &SandboxExecutor<C>,
    ) -> Result<TaskResult, EngineError> {
        if !context.can_retry() {
            return Err(EngineError::MaxRetriesExceeded {
                task_id: context.task.id.clone(),
                attempts: context.previous_attempts.len(),
            });
        }

        let delay = context.next_delay();
        tracing::info!(
            task = %context.task.id,
            attempt = context.previous_attempts.len() + 1,
            delay_ms = delay.as_millis() as u64,
            "retrying task"
        );
        tokio::time::sleep(delay).await;

        // Recently touched paths, captured before history is cleared
        let touched: Vec<PathBuf> = executor
            .file_changes()
            .iter()
            .rev()
            .take(5)
            .map(|c| c.file_path.clone())
            .collect();
        self.apply_recovery(context, executor, &touched);

        executor.clear_history();
        let mut task = context.task.clone();
        let started = self.clock.now();
        let result = self.execute_task(&mut task, executor).await;

        context.record_attempt(AttemptInfo {
            attempt_number: context.previous_attempts.len() + 1,
            at_epoch_ms: self.clock.epoch_ms(),
            duration_seconds: self.clock.now().duration_since(started).as_secs_f64(),
            success: result.success,
            error_info: result.error_info.clone(),
            changes_made: result.changes_made.len(),
            commands_executed: result.commands_executed.len(),
        });
        context.task = task;

        Ok(result)
    }

    fn apply_recovery(
        &self,
        context: &RetryContext,
        executor: &SandboxExecutor<C>,
        touched: &[PathBuf],
    ) {
        if let Some(strategy) = context.best_strategy() {
            if let Some(action) = &strategy.action {
                self.run_recovery_action(action, executor, touched);
            }
        }

        // Kind-specific defaults apply regardless of registered strategies
        match context.error_info.kind {
            ErrorKind::Permission => {
                self.run_recovery_action(&RecoveryAction::FixPermissions, executor, touched)
            }
            ErrorKind::Timeout => self.run_recovery_action(
                &RecoveryAction::RaiseTimeout { factor: 2.0 },
                executor,
                touched,
            ),
            _ => {}
        }
    }

    fn run_recovery_action(
        &self,
        action: &RecoveryAction,
        executor: &SandboxExecutor<C>,
        touched: &[PathBuf],
    ) {
        match action {
            RecoveryAction::FixPermissions => {
                make_writable(executor.workspace_root());
                for path in touched {
                    make_writable(path);
                }
            }
            RecoveryAction::RaiseTimeout { factor } => {
                executor.raise_default_timeout(*factor);
            }
            RecoveryAction::ClearHistory => executor.clear_history(),
            RecoveryAction::Custom { name, hook } => {
                let recovered = hook(executor.workspace_root());
                tracing::debug!(action = %name, recovered, "custom recovery ran");
            }
        }
    }
}

/// Earliest declared task whose dependencies are all completed.
fn next_eligible(plan: &TaskPlan) -> Option<usize> {
    plan.tasks.iter().position(|task| {
        task.status == TaskStatus::NotStarted
            && task.dependencies.iter().all(|dep| {
                plan.task(dep)
                    .map(|t| t.status == TaskStatus::Completed)
                    .unwrap_or(false)
            })
    })
}

/// Extract an executable command embedded in parentheses, e.g.
/// `Install dependencies (pip install -r requirements.txt)`.
fn extract_command(description: &str) -> Option<String> {
    const KNOWN_TOOLS: &[&str] = &[
        "pip", "python", "pytest", "flake8", "mypy", "npm", "yarn", "node", "mvn", "gradle",
        "cargo", "rustc", "go", "docker", "make", "bash", "sh", "echo", "git",
    ];
    let open = description.rfind('(')?;
    let close = description[open..].find(')')? + open;
    let candidate = description[open + 1..close].trim();
    let first = candidate.split_whitespace().next()?;
    if KNOWN_TOOLS.contains(&first) {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

/// Classify a failed command into the error taxonomy.
fn classify_command_failure(info: &CommandInfo) -> ErrorInfo {
    let stderr_lower = info.stderr.to_lowercase();
    let kind = if info.exit_code == EXIT_TIMEOUT {
        ErrorKind::Timeout
    } else if stderr_lower.contains("permission denied")
        || stderr_lower.contains("outside the workspace")
    {
        ErrorKind::Permission
    } else if stderr_lower.contains("command not found") || info.exit_code == 127 {
        ErrorKind::CommandNotFound
    } else if stderr_lower.contains("no such file") {
        ErrorKind::FileNotFound
    } else if stderr_lower.contains("syntaxerror") || stderr_lower.contains("syntax error") {
        ErrorKind::Syntax
    } else if info.exit_code == EXIT_INTERNAL_FAILURE {
        ErrorKind::Internal
    } else {
        ErrorKind::Runtime
    };

    let message = if info.stderr.is_empty() {
        format!("command exited with code {}: {}", info.exit_code, info.command)
    } else {
        info.stderr.trim().to_string()
    };
    ErrorInfo::new(kind, message, info.at_epoch_ms)
        .with_context("command", info.command.clone())
        .with_context("exit_code", info.exit_code.to_string())
}

/// Best-effort removal of the read-only bit.
fn make_writable(path: &std::path::Path) {
    if let Ok(metadata) = std::fs::metadata(path) {
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            let _ = std::fs::set_permissions(path, permissions);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
