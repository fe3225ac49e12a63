// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::env::Limits;
use crate::service::SandboxService;
use sbx_core::{SequentialIdGen, SystemClock};
use serde_json::json;
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

fn request(tool: &str, args: serde_json::Value) -> ToolRequest {
    ToolRequest {
        connection_id: "test-conn".to_string(),
        tool: tool.to_string(),
        args,
    }
}

#[tokio::test]
async fn workspace_tools_round_trip() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);

    let created = dispatch(
        &service,
        request(
            "create_workspace",
            json!({"source_path": src.path().to_str().unwrap()}),
        ),
    )
    .await;
    assert_eq!(created["success"], json!(true));
    let workspace_id = created["workspace_id"].as_str().unwrap().to_string();
    assert!(created["isolation_enabled"].as_bool().unwrap());

    let analyzed = dispatch(
        &service,
        request("analyze_codebase", json!({"workspace_id": workspace_id})),
    )
    .await;
    assert_eq!(analyzed["success"], json!(true));
    assert!(analyzed["languages"]
        .as_array()
        .unwrap()
        .contains(&json!("python")));
    assert_eq!(analyzed["files_count"], json!(3));

    let destroyed = dispatch(
        &service,
        request("destroy_workspace", json!({"workspace_id": workspace_id})),
    )
    .await;
    assert_eq!(destroyed["success"], json!(true));
    assert_eq!(destroyed["destroyed"], json!(true));
}

#[tokio::test]
async fn plan_tools_round_trip() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);

    let created = dispatch(
        &service,
        request(
            "create_workspace",
            json!({"source_path": src.path().to_str().unwrap()}),
        ),
    )
    .await;
    let workspace_id = created["workspace_id"].as_str().unwrap().to_string();

    let planned = dispatch(
        &service,
        request(
            "create_task_plan",
            json!({"workspace_id": workspace_id, "description": "Install dependencies"}),
        ),
    )
    .await;
    assert_eq!(planned["success"], json!(true));
    let plan_id = planned["plan_id"].as_str().unwrap().to_string();
    assert!(planned["tasks_count"].as_u64().unwrap() >= 1);
    let tasks = planned["tasks"].as_array().unwrap();
    assert!(tasks.iter().any(|t| t["description"]
        .as_str()
        .unwrap()
        .contains("pip install -r requirements.txt")));

    let submitted = dispatch(
        &service,
        request("submit_plan_for_approval", json!({"plan_id": plan_id})),
    )
    .await;
    let request_id = submitted["request_id"].as_str().unwrap().to_string();

    let approved = dispatch(
        &service,
        request("approve_plan", json!({"request_id": request_id})),
    )
    .await;
    assert_eq!(approved["success"], json!(true));

    let status_updated = dispatch(
        &service,
        request(
            "update_task_status",
            json!({
                "plan_id": plan_id,
                "task_id": tasks[0]["id"],
                "status": "in_progress",
            }),
        ),
    )
    .await;
    assert_eq!(status_updated["success"], json!(true));

    let history = dispatch(
        &service,
        request("get_execution_history", json!({"workspace_id": workspace_id})),
    )
    .await;
    assert!(history["total_actions"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn execute_tool_reports_durations() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);

    let created = dispatch(
        &service,
        request(
            "create_workspace",
            json!({"source_path": src.path().to_str().unwrap()}),
        ),
    )
    .await;
    let workspace_id = created["workspace_id"].as_str().unwrap().to_string();
    let planned = dispatch(
        &service,
        request(
            "create_task_plan",
            json!({"workspace_id": workspace_id, "description": "Run the smoke step (echo ok)"}),
        ),
    )
    .await;
    let plan_id = planned["plan_id"].as_str().unwrap().to_string();

    let executed = dispatch(
        &service,
        request("execute_task_plan", json!({"plan_id": plan_id})),
    )
    .await;
    assert_eq!(executed["success"], json!(true));
    assert_eq!(executed["tasks_failed"], json!(0));
    // total_duration is authoritative; execution_time mirrors it
    assert_eq!(executed["execution_time"], executed["total_duration"]);
}

#[test]
fn tool_names_cover_the_public_surface() {
    for tool in [
        "create_workspace",
        "destroy_workspace",
        "analyze_codebase",
        "create_task_plan",
        "execute_task_plan",
        "emergency_cleanup",
    ] {
        assert!(TOOL_NAMES.contains(&tool), "missing tool {tool}");
    }
}

#[tokio::test]
async fn errors_are_structured_not_raised() {
    let root = TempDir::new().unwrap();
    let service = service(&root);

    let unknown_tool = dispatch(&service, request("frobnicate", json!({}))).await;
    assert_eq!(unknown_tool["success"], json!(false));
    assert_eq!(unknown_tool["error"]["kind"], json!("validation"));

    let missing_arg = dispatch(&service, request("analyze_codebase", json!({}))).await;
    assert_eq!(missing_arg["success"], json!(false));
    assert!(missing_arg["message"]
        .as_str()
        .unwrap()
        .contains("workspace_id"));

    let bad_session = dispatch(
        &service,
        request("analyze_codebase", json!({"workspace_id": "ghost"})),
    )
    .await;
    assert_eq!(bad_session["success"], json!(false));
    assert_eq!(bad_session["error"]["kind"], json!("validation"));
}

#[tokio::test]
async fn rate_limit_denial_short_circuits() {
    let root = TempDir::new().unwrap();
    let service = service(&root);
    dispatch(
        &service,
        request("configure_rate_limits", json!({"max_requests_per_minute": 2})),
    )
    .await;

    let first = dispatch(&service, request("get_resource_stats", json!({}))).await;
    assert_eq!(first["success"], json!(true));
    let denied = dispatch(&service, request("get_resource_stats", json!({}))).await;
    assert_eq!(denied["success"], json!(false));
    assert_eq!(denied["error"]["kind"], json!("rate_limited"));
    assert!(denied["retry_after"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn stats_tools_return_structured_bodies() {
    let root = TempDir::new().unwrap();
    let service = service(&root);

    let resources = dispatch(&service, request("get_resource_stats", json!({}))).await;
    assert_eq!(resources["success"], json!(true));
    assert_eq!(
        resources["resources"]["max_sessions"],
        json!(Limits::default().max_sessions)
    );
    assert_eq!(resources["cache"]["status"], json!("healthy"));

    let connections = dispatch(&service, request("get_connection_stats", json!({}))).await;
    assert_eq!(connections["success"], json!(true));
    assert!(connections["total_requests"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn configure_connection_limits_applies() {
    let root = TempDir::new().unwrap();
    let service = service(&root);
    let configured = dispatch(
        &service,
        request(
            "configure_connection_limits",
            json!({"max_concurrent_connections": 7, "max_connections_per_ip": 2}),
        ),
    )
    .await;
    assert_eq!(configured["success"], json!(true));
    assert_eq!(
        configured["connection_limits"]["max_concurrent_connections"],
        json!(7)
    );
    assert_eq!(
        service.connections().stats().connection_limits.max_concurrent_connections,
        7
    );
}

#[tokio::test]
async fn emergency_cleanup_tool_reports_counts() {
    let src = source_tree();
    let root = TempDir::new().unwrap();
    let service = service(&root);
    dispatch(
        &service,
        request(
            "create_workspace",
            json!({"source_path": src.path().to_str().unwrap()}),
        ),
    )
    .await;

    let cleaned = dispatch(&service, request("emergency_cleanup", json!({}))).await;
    assert_eq!(cleaned["success"], json!(true));
    assert_eq!(cleaned["sessions_destroyed"], json!(1));
}
