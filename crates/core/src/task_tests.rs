// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_plan() -> TaskPlan {
    let mut plan = TaskPlan::new("plan-1", "Add caching", 1_000);
    plan.tasks.push(Task::new("a", "Analyze"));
    plan.tasks
        .push(Task::new("b", "Implement").with_dependency("a"));
    plan
}

#[yare::parameterized(
    not_started = { TaskStatus::NotStarted, "not_started", false },
    in_progress = { TaskStatus::InProgress, "in_progress", false },
    completed   = { TaskStatus::Completed, "completed", true },
    error       = { TaskStatus::Error, "error", true },
)]
fn task_status_display_and_terminal(status: TaskStatus, expected: &str, terminal: bool) {
    assert_eq!(status.to_string(), expected);
    assert_eq!(status.is_terminal(), terminal);
}

#[test]
fn plan_status_display() {
    assert_eq!(PlanStatus::PendingApproval.to_string(), "pending_approval");
    assert_eq!(PlanStatus::Executing.to_string(), "executing");
}

#[test]
fn approval_status_display() {
    assert_eq!(ApprovalStatus::NeedsRevision.to_string(), "needs_revision");
}

#[test]
fn task_builder_sets_dependencies_and_metadata() {
    let task = Task::new("t", "Do work")
        .with_dependency("other")
        .with_metadata("language", "python");
    assert_eq!(task.dependencies, vec![TaskId::new("other")]);
    assert_eq!(
        task.metadata.get("language").map(String::as_str),
        Some("python")
    );
    assert_eq!(task.status, TaskStatus::NotStarted);
}

#[test]
fn subtask_dependency_chain() {
    let sub = Subtask::new("t_core", "Implement core").with_dependency("t_setup");
    assert_eq!(sub.dependencies, vec![TaskId::new("t_setup")]);
}

#[test]
fn plan_task_lookup() {
    let plan = sample_plan();
    assert!(plan.task(&TaskId::new("a")).is_some());
    assert!(plan.task(&TaskId::new("zzz")).is_none());
}

#[test]
fn plan_task_ids_preserve_declaration_order() {
    let plan = sample_plan();
    assert_eq!(plan.task_ids(), vec![TaskId::new("a"), TaskId::new("b")]);
}

#[test]
fn plan_is_complete_only_when_all_terminal() {
    let mut plan = sample_plan();
    assert!(!plan.is_complete());
    for task in &mut plan.tasks {
        task.status = TaskStatus::Completed;
    }
    assert!(plan.is_complete());
}

#[test]
fn plan_defaults_are_draft_and_pending() {
    let plan = sample_plan();
    assert_eq!(plan.status, PlanStatus::Draft);
    assert_eq!(plan.approval_status, ApprovalStatus::Pending);
}

#[test]
fn plan_serde_roundtrip() {
    let mut plan = sample_plan();
    plan.context.languages.push("python".to_string());
    let json = serde_json::to_string(&plan).unwrap();
    let back: TaskPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(back, plan);
}

#[test]
fn task_status_serde_is_snake_case() {
    assert_eq!(
        serde_json::to_string(&TaskStatus::InProgress).unwrap(),
        "\"in_progress\""
    );
}
