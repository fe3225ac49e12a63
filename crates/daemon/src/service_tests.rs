// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::{SequentialIdGen, SystemClock};
use tempfile::TempDir;

fn source_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.py"), "print('hi')\n").unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "flask\n").unwrap();
    std::fs::create_dir_all(dir.path().join("tests")).unwrap();
    std::fs::write(dir.path().join("tests/test_main.py"), "def test(): pass\n").unwrap();
    dir
}

fn service(root: &TempDir) -> SandboxService<SystemClock, SequentialIdGen> {
    SandboxService::new(
        Limits::default(),
        root.path(),
        SystemClock,
        SequentialIdGen::new("s"),
    )
}

#[tokio::test]
async fn create_and_destroy_workspace() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);

    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();
    assert!(session.workspace.sandbox_path.join("main.py").exists());

    assert!(service.destroy_workspace(session.id.as_str()).await.unwrap());
    assert!(!session.workspace.sandbox_path.exists());
    // Idempotent
    assert!(!service.destroy_workspace(session.id.as_str()).await.unwrap());
}

#[test]
fn session_cap_applies_at_creation() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = SandboxService::new(
        Limits {
            max_sessions: 1,
            ..Limits::default()
        },
        root.path(),
        SystemClock,
        SequentialIdGen::new("s"),
    );
    service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();
    let err = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap_err();
    assert!(matches!(err, DaemonError::ResourceExhausted(_)));
}

#[test]
fn analysis_is_cached_by_content_hash() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();

    let first = service.analyze_codebase(session.id.as_str()).unwrap();
    assert!(first.has_language("python"));
    assert_eq!(first.files_count(), 3);

    let before = service.cache().stats();
    let analysis_hits_before = before.iter().find(|s| s.name == "analysis").unwrap().hits;
    let second = service.analyze_codebase(session.id.as_str()).unwrap();
    assert_eq!(second, first);
    let after = service.cache().stats();
    let analysis_hits_after = after.iter().find(|s| s.name == "analysis").unwrap().hits;
    assert_eq!(analysis_hits_after, analysis_hits_before + 1);
}

#[test]
fn plan_creation_registers_with_status_manager() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();

    let plan = service
        .create_task_plan(session.id.as_str(), "Install dependencies")
        .unwrap();
    assert!(!plan.tasks.is_empty());
    assert!(plan
        .tasks
        .iter()
        .any(|t| t.description.contains("pip install -r requirements.txt")));
    assert!(service
        .status_manager()
        .task_progress(&plan.tasks[0].id)
        .is_some());
}

#[tokio::test]
async fn execute_plan_updates_progress_and_history() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();

    // Echo-only plan so execution succeeds without tooling
    let plan = service
        .create_task_plan(session.id.as_str(), "Run the smoke checks (echo ok)")
        .unwrap();
    let result = service.execute_task_plan(plan.id.as_str()).await.unwrap();
    assert!(result.success);
    assert!(result.total_duration >= 0.0);

    let progress = service
        .status_manager()
        .plan_progress(&plan.id)
        .unwrap();
    assert_eq!(progress.completed, progress.total_tasks);

    let history = service.execution_history(session.id.as_str()).unwrap();
    assert!(history
        .iter()
        .any(|record| record.action_type == "execute_task_plan" && record.success));

    let stored = service.planner().plan(&plan.id).unwrap();
    assert_eq!(stored.status, sbx_core::PlanStatus::Completed);
}

#[test]
fn approval_round_trip_mirrors_plan_status() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();
    let plan = service
        .create_task_plan(session.id.as_str(), "Implement the widget")
        .unwrap();

    let request_id = service.submit_plan_for_approval(plan.id.as_str()).unwrap();
    assert_eq!(
        service.planner().plan(&plan.id).unwrap().status,
        sbx_core::PlanStatus::PendingApproval
    );

    service
        .respond_to_approval(
            request_id.as_str(),
            sbx_planner::ApprovalResponse {
                status: sbx_core::ApprovalStatus::Approved,
                feedback: None,
                modifications: vec![],
            },
        )
        .unwrap();
    assert_eq!(
        service.planner().plan(&plan.id).unwrap().status,
        sbx_core::PlanStatus::Approved
    );
}

#[test]
fn revision_modifications_land_in_plan_metadata() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();
    let plan = service
        .create_task_plan(session.id.as_str(), "Implement the widget")
        .unwrap();
    let request_id = service.submit_plan_for_approval(plan.id.as_str()).unwrap();

    service
        .respond_to_approval(
            request_id.as_str(),
            sbx_planner::ApprovalResponse {
                status: sbx_core::ApprovalStatus::NeedsRevision,
                feedback: Some("split it".to_string()),
                modifications: vec!["Add task for deployment".to_string()],
            },
        )
        .unwrap();

    let stored = service.planner().plan(&plan.id).unwrap();
    assert!(stored.metadata.contains_key("pending_task_addition"));
}

#[test]
fn update_task_status_touches_plan_and_progress() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();
    let plan = service
        .create_task_plan(session.id.as_str(), "Implement the widget")
        .unwrap();
    let task_id = plan.tasks[0].id.clone();

    service
        .update_task_status(plan.id.as_str(), task_id.as_str(), TaskStatus::InProgress)
        .unwrap();

    let stored = service.planner().plan(&plan.id).unwrap();
    assert_eq!(stored.tasks[0].status, TaskStatus::InProgress);
    let progress = service.status_manager().task_progress(&task_id).unwrap();
    assert_eq!(progress.status, TaskStatus::InProgress);
}

#[test]
fn similar_plans_ranks_other_templates() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();
    let first = service
        .create_task_plan(session.id.as_str(), "Implement the widget")
        .unwrap();
    let second = service
        .create_task_plan(session.id.as_str(), "Implement the gadget")
        .unwrap();

    let similar = service.similar_plans(first.id.as_str(), 5).unwrap();
    assert!(similar.iter().any(|(name, _)| name == second.id.as_str()));
    // Never returns the query plan itself
    assert!(similar.iter().all(|(name, _)| name != first.id.as_str()));
}

#[test]
fn history_requires_known_session() {
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let err = service.execution_history("ghost").unwrap_err();
    assert!(matches!(err, DaemonError::UnknownSession(_)));
}

#[test]
fn cleanup_pass_removes_orphaned_dirs() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();
    std::fs::create_dir_all(root.path().join("stale-session")).unwrap();

    service.cleanup_pass();
    assert!(!root.path().join("stale-session").exists());
    assert!(root.path().join("s-1").exists());
}

#[tokio::test]
async fn emergency_shutdown_destroys_everything() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();

    let (sessions, _processes) = service.emergency_shutdown().await;
    assert_eq!(sessions, 1);
    assert_eq!(service.workspaces().session_count(), 0);
    assert_eq!(service.cache().memory_used_bytes(), 0);
}

#[tokio::test]
async fn destroying_workspace_invalidates_its_caches() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let session = service
        .create_workspace(src.path().to_str().unwrap(), None)
        .unwrap();
    let hash = session.workspace.content_hash.clone().unwrap();
    service.analyze_codebase(session.id.as_str()).unwrap();

    service.destroy_workspace(session.id.as_str()).await.unwrap();
    let now = service.cache().now_ms();
    assert!(service.cache().analysis().get(&hash, now).is_none());
}
