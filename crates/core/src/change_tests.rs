// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn file_change_builder() {
    let change = FileChange::new("/ws/a.txt", ChangeType::Modify, 99)
        .with_before("old")
        .with_after("new")
        .with_owner("tx-1");
    assert_eq!(change.change_type, ChangeType::Modify);
    assert_eq!(change.before_content.as_deref(), Some("old"));
    assert_eq!(change.after_content.as_deref(), Some("new"));
    assert_eq!(change.owner.as_deref(), Some("tx-1"));
}

#[test]
fn change_type_display() {
    assert_eq!(ChangeType::Create.to_string(), "create");
    assert_eq!(ChangeType::Move.to_string(), "move");
}

#[test]
fn command_info_success_and_sentinels() {
    let ok = CommandInfo {
        command: "true".to_string(),
        working_directory: "/ws".into(),
        stdout: String::new(),
        stderr: String::new(),
        exit_code: 0,
        duration_seconds: 0.01,
        at_epoch_ms: 1,
    };
    assert!(ok.success());
    assert!(!ok.timed_out());

    let timed_out = CommandInfo {
        exit_code: EXIT_TIMEOUT,
        stderr: "Command timed out".to_string(),
        ..ok.clone()
    };
    assert!(timed_out.timed_out());
    assert!(!timed_out.success());

    let internal = CommandInfo {
        exit_code: EXIT_INTERNAL_FAILURE,
        ..ok
    };
    assert!(!internal.success());
    assert!(!internal.timed_out());
}

#[test]
fn file_change_serde_omits_absent_content() {
    let change = FileChange::new("/ws/b.txt", ChangeType::Delete, 5).with_before("gone");
    let json = serde_json::to_string(&change).unwrap();
    assert!(json.contains("before_content"));
    assert!(!json.contains("after_content"));
}
