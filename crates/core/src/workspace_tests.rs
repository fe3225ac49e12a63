// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    creating    = { WorkspaceStatus::Creating, "creating" },
    active      = { WorkspaceStatus::Active, "active" },
    suspended   = { WorkspaceStatus::Suspended, "suspended" },
    cleaning_up = { WorkspaceStatus::CleaningUp, "cleaning_up" },
    destroyed   = { WorkspaceStatus::Destroyed, "destroyed" },
)]
fn status_display(status: WorkspaceStatus, expected: &str) {
    assert_eq!(status.to_string(), expected);
}

#[test]
fn isolation_defaults_enabled_without_container() {
    let isolation = IsolationConfig::default();
    assert!(isolation.enabled);
    assert!(!isolation.container_backed);
    assert_eq!(isolation.limits.memory_mb, 512);
}

#[test]
fn workspace_serde_roundtrip() {
    let workspace = Workspace {
        id: WorkspaceId::new("ws-1"),
        source_path: "/src/project".into(),
        sandbox_path: "/sandbox/ws-1/workspace".into(),
        isolation: IsolationConfig::default(),
        status: WorkspaceStatus::Active,
        content_hash: Some("deadbeef".to_string()),
        created_at_ms: 1_000,
    };
    let json = serde_json::to_string(&workspace).unwrap();
    let back: Workspace = serde_json::from_str(&json).unwrap();
    assert_eq!(back, workspace);
}
