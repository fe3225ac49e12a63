// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::SystemClock;
use tempfile::TempDir;

fn executor(dir: &TempDir) -> SandboxExecutor<SystemClock> {
    SandboxExecutor::new(dir.path(), true, SystemClock, ExecutorConfig::default()).unwrap()
}

#[tokio::test]
async fn execute_captures_stdout_and_exit_code() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    let info = executor.execute("echo hello", None, None).await;
    assert_eq!(info.exit_code, 0);
    assert_eq!(info.stdout.trim(), "hello");
    assert!(info.success());
}

#[tokio::test]
async fn execute_captures_stderr_and_failure() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    let info = executor.execute("echo oops >&2; exit 3", None, None).await;
    assert_eq!(info.exit_code, 3);
    assert_eq!(info.stderr.trim(), "oops");
    assert!(!info.success());
}

#[tokio::test]
async fn execute_times_out_with_sentinel() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    let info = executor.execute("sleep 5", None, Some(1)).await;
    assert_eq!(info.exit_code, sbx_core::EXIT_TIMEOUT);
    assert_eq!(info.stderr, "Command timed out");
    assert!(info.timed_out());
}

#[tokio::test]
async fn zero_timeout_disables_the_limit() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    let info = executor.execute("echo fast", None, Some(0)).await;
    assert_eq!(info.exit_code, 0);
}

#[tokio::test]
async fn working_dir_outside_workspace_is_rejected() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    let info = executor
        .execute("echo x", Some(std::path::Path::new("/etc")), None)
        .await;
    assert_eq!(info.exit_code, sbx_core::EXIT_INTERNAL_FAILURE);
    assert!(info.stderr.contains("outside the workspace"));
}

#[tokio::test]
async fn working_dir_inside_workspace_is_used() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    let executor = executor(&dir);
    let info = executor
        .execute("pwd", Some(std::path::Path::new("sub")), None)
        .await;
    assert!(info.stdout.trim().ends_with("sub"));
}

#[tokio::test]
async fn commands_are_recorded_in_order() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    executor.execute("echo one", None, None).await;
    executor.execute("echo two", None, None).await;
    let history = executor.commands_executed();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].command, "echo one");
    assert_eq!(history[1].command, "echo two");
}

#[test]
fn file_operations_record_changes() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);

    executor.create_file("a.txt", "v1").unwrap();
    executor.modify_file("a.txt", "v2").unwrap();
    executor.delete_file("a.txt").unwrap();

    let changes = executor.file_changes();
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[0].change_type, sbx_core::ChangeType::Create);
    assert_eq!(changes[0].after_content.as_deref(), Some("v1"));
    assert_eq!(changes[1].change_type, sbx_core::ChangeType::Modify);
    assert_eq!(changes[1].before_content.as_deref(), Some("v1"));
    assert_eq!(changes[2].change_type, sbx_core::ChangeType::Delete);
    assert_eq!(changes[2].before_content.as_deref(), Some("v2"));
}

#[test]
fn create_rejects_existing_file() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    executor.create_file("a.txt", "v1").unwrap();
    assert!(executor.create_file("a.txt", "again").is_err());
}

#[test]
fn modify_rejects_missing_file() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    assert!(executor.modify_file("ghost.txt", "x").is_err());
}

#[test]
fn clear_history_empties_both_logs() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    executor.create_file("a.txt", "v1").unwrap();
    executor.clear_history();
    assert!(executor.file_changes().is_empty());
    assert!(executor.commands_executed().is_empty());
}

#[yare::parameterized(
    npm_marker = { "package.json", PackageManager::Npm },
    pip_requirements = { "requirements.txt", PackageManager::Pip },
    pip_pyproject = { "pyproject.toml", PackageManager::Pip },
)]
fn auto_detects_package_manager(marker: &str, expected: PackageManager) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(marker), "{}").unwrap();
    let executor = executor(&dir);
    assert_eq!(executor.detect_package_manager(), expected);
}

#[test]
fn auto_defaults_to_pip_without_markers() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    assert_eq!(executor.detect_package_manager(), PackageManager::Pip);
}

#[test]
fn raise_default_timeout_multiplies() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    executor.raise_default_timeout(2.0);
    assert_eq!(
        executor.default_timeout(),
        Some(Duration::from_secs(600))
    );
}

#[test]
fn validate_environment_accepts_writable_workspace() {
    let dir = TempDir::new().unwrap();
    let executor = executor(&dir);
    assert!(executor.validate_environment().is_ok());
}
