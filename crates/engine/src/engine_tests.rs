// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use sbx_core::{CodebaseContext, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn plan_in(dir: &TempDir, tasks: Vec<Task>) -> TaskPlan {
    let mut plan = TaskPlan::new("plan-1", "test plan", 0);
    plan.context = CodebaseContext {
        workspace_path: dir.path().to_path_buf(),
        ..CodebaseContext::default()
    };
    plan.tasks = tasks;
    plan
}

fn engine(dir: &TempDir) -> ExecutionEngine<SystemClock> {
    ExecutionEngine::new(SystemClock, dir.path()).with_retry_config(RetryConfig {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
    })
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(TaskId, TaskStatus)>>,
}

impl StatusSink for RecordingSink {
    fn on_status(
        &self,
        _plan_id: &PlanId,
        task_id: &TaskId,
        status: TaskStatus,
        _error: Option<&ErrorInfo>,
    ) {
        self.events.lock().push((task_id.clone(), status));
    }
}

#[tokio::test]
async fn plan_executes_in_dependency_order() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(&dir);
    let sink = Arc::new(RecordingSink::default());
    engine.add_status_sink(sink.clone());

    // Declared out of order: C, B, A with C->[A,B], B->[A]
    let mut plan = plan_in(
        &dir,
        vec![
            Task::new("C", "step c (echo c)")
                .with_dependency("A")
                .with_dependency("B"),
            Task::new("B", "step b (echo b)").with_dependency("A"),
            Task::new("A", "step a (echo a)"),
        ],
    );

    let result = engine.execute_plan(&mut plan).await.unwrap();
    assert!(result.success);
    assert_eq!(result.tasks_completed, 3);

    let starts: Vec<TaskId> = sink
        .events
        .lock()
        .iter()
        .filter(|(_, s)| *s == TaskStatus::InProgress)
        .map(|(id, _)| id.clone())
        .collect();
    assert_eq!(
        starts,
        vec![TaskId::new("A"), TaskId::new("B"), TaskId::new("C")]
    );
}

#[tokio::test]
async fn first_failure_stops_the_plan() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let mut plan = plan_in(
        &dir,
        vec![
            Task::new("ok", "fine (echo fine)"),
            Task::new("bad", "explode (bash -c 'exit 9')"),
            Task::new("never", "unreached (echo later)").with_dependency("bad"),
        ],
    );

    let result = engine.execute_plan(&mut plan).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.tasks_completed, 1);
    assert_eq!(result.tasks_failed, 1);
    assert_eq!(
        plan.task(&TaskId::new("never")).unwrap().status,
        TaskStatus::NotStarted
    );
    assert_eq!(plan.status, PlanStatus::Failed);
}

#[tokio::test]
async fn unsatisfiable_dependencies_mark_the_plan_stuck() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let mut plan = plan_in(
        &dir,
        vec![Task::new("a", "waits forever").with_dependency("ghost")],
    );
    let err = engine.execute_plan(&mut plan).await.unwrap_err();
    assert!(matches!(err, EngineError::PlanStuck { remaining: 1 }));
}

#[tokio::test]
async fn subtasks_run_in_declaration_order() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let mut task = Task::new("t", "multi-step");
    task.subtasks = vec![
        sbx_core::Subtask::new("t_one", "first (echo 1)"),
        sbx_core::Subtask::new("t_two", "second (echo 2)"),
    ];
    let mut plan = plan_in(&dir, vec![task]);

    let result = engine.execute_plan(&mut plan).await.unwrap();
    assert!(result.success);
    let task = plan.task(&TaskId::new("t")).unwrap();
    assert!(task
        .subtasks
        .iter()
        .all(|s| s.status == TaskStatus::Completed));
}

#[tokio::test]
async fn failing_subtask_fails_the_task() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let mut task = Task::new("t", "multi-step");
    task.subtasks = vec![
        sbx_core::Subtask::new("t_one", "boom (bash -c 'exit 1')"),
        sbx_core::Subtask::new("t_two", "never (echo 2)"),
    ];
    let mut plan = plan_in(&dir, vec![task]);

    let result = engine.execute_plan(&mut plan).await.unwrap();
    assert!(!result.success);
    let task = plan.task(&TaskId::new("t")).unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.subtasks[0].status, TaskStatus::Error);
    assert_eq!(task.subtasks[1].status, TaskStatus::NotStarted);
}

#[tokio::test]
async fn embedded_commands_are_extracted_and_run() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let executor = engine
        .executor_for_plan(&plan_in(&dir, vec![]))
        .unwrap();
    let mut task = Task::new("t", "Write a marker (bash -c 'echo made > marker.txt')");
    let result = engine.execute_task(&mut task, &executor).await;
    assert!(result.success);
    assert!(dir.path().join("marker.txt").exists());
    assert_eq!(result.commands_executed.len(), 1);
}

#[tokio::test]
async fn handle_error_builds_context_and_strategies() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let executor = engine.executor_for_plan(&plan_in(&dir, vec![])).unwrap();
    executor.create_file("touched.txt", "x").unwrap();
    executor.execute("echo probe", None, None).await;

    let task = Task::new("t-9", "failing step");
    let context = engine.handle_error(
        &task,
        ErrorInfo::new(ErrorKind::Permission, "denied", 0),
        &executor,
    );

    assert_eq!(
        context.error_info.context.get("task_id").map(String::as_str),
        Some("t-9")
    );
    assert!(context.error_info.context.contains_key("workspace_path"));
    assert!(context.error_info.context.contains_key("change_0"));
    assert!(context.error_info.context.contains_key("command_0"));
    assert!(!context.strategies.is_empty());
    assert!(!context.suggestions.is_empty());
    // The original failed run is attempt one
    assert_eq!(context.previous_attempts.len(), 1);
    assert!(!context.previous_attempts[0].success);
    assert!(context.can_retry());
}

#[tokio::test]
async fn retry_reruns_and_records_attempts() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let executor = engine.executor_for_plan(&plan_in(&dir, vec![])).unwrap();

    let task = Task::new("t", "recoverable (echo retried)");
    let mut context = engine.handle_error(
        &task,
        ErrorInfo::new(ErrorKind::Runtime, "first failure", 0),
        &executor,
    );
    assert_eq!(context.previous_attempts.len(), 1);

    let result = engine.retry_task(&mut context, &executor).await.unwrap();
    assert!(result.success);
    assert_eq!(context.previous_attempts.len(), 2);
    assert_eq!(context.previous_attempts[1].attempt_number, 2);
    assert!(context.previous_attempts[1].success);
}

#[tokio::test]
async fn retry_budget_exhaustion_yields_max_retries_error() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let executor = engine.executor_for_plan(&plan_in(&dir, vec![])).unwrap();

    let task = Task::new("t", "always fails (bash -c 'exit 1')");
    let mut context = engine.handle_error(
        &task,
        ErrorInfo::new(ErrorKind::Runtime, "boom", 0),
        &executor,
    );

    // Original attempt plus one retry exhausts max_retries = 2
    let result = engine.retry_task(&mut context, &executor).await.unwrap();
    assert!(!result.success);
    let err = engine.retry_task(&mut context, &executor).await.unwrap_err();
    assert!(matches!(err, EngineError::MaxRetriesExceeded { .. }));
    assert_eq!(err.kind(), ErrorKind::MaxRetriesExceeded);
}

#[tokio::test]
async fn timeout_error_raises_executor_timeout_on_retry() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let executor = engine.executor_for_plan(&plan_in(&dir, vec![])).unwrap();
    let before = executor.default_timeout().unwrap();

    let task = Task::new("t", "slow step (echo done)");
    let mut context = engine.handle_error(
        &task,
        ErrorInfo::new(ErrorKind::Timeout, "Command timed out", 0),
        &executor,
    );
    engine.retry_task(&mut context, &executor).await.unwrap();

    assert_eq!(executor.default_timeout().unwrap(), before * 2);
}

#[tokio::test]
async fn empty_plan_succeeds_with_full_rate() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let mut plan = plan_in(&dir, vec![]);
    let result = engine.execute_plan(&mut plan).await.unwrap();
    assert!(result.success);
    assert_eq!(result.success_rate, 1.0);
    assert_eq!(plan.status, PlanStatus::Completed);
}

#[test]
fn classification_maps_exit_codes() {
    let info = sbx_core::CommandInfo {
        command: "x".to_string(),
        working_directory: "/w".into(),
        stdout: String::new(),
        stderr: "Command timed out".to_string(),
        exit_code: sbx_core::EXIT_TIMEOUT,
        duration_seconds: 1.0,
        at_epoch_ms: 0,
    };
    assert_eq!(classify_command_failure(&info).kind, ErrorKind::Timeout);

    let info = sbx_core::CommandInfo {
        stderr: "bash: frobnicate: command not found".to_string(),
        exit_code: 127,
        ..info
    };
    assert_eq!(
        classify_command_failure(&info).kind,
        ErrorKind::CommandNotFound
    );
}
