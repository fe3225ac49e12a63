// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn source_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.py"), "print('hi')\n").unwrap();
    std::fs::create_dir_all(dir.path().join("tests")).unwrap();
    std::fs::write(dir.path().join("tests/test_main.py"), "def test(): pass\n").unwrap();
    std::fs::create_dir_all(dir.path().join(".git")).unwrap();
    std::fs::write(dir.path().join(".git/config"), "[core]").unwrap();
    dir
}

#[test]
fn clone_copies_files_and_skips_vcs() {
    let src = source_tree();
    let dst = TempDir::new().unwrap();
    let sandbox = dst.path().join("workspace");
    let stats = clone_tree(src.path(), &sandbox, 0).unwrap();
    assert_eq!(stats.files_copied, 2);
    assert!(sandbox.join("main.py").exists());
    assert!(sandbox.join("tests/test_main.py").exists());
    assert!(!sandbox.join(".git").exists());
}

#[test]
fn clone_fails_for_missing_source() {
    let dst = TempDir::new().unwrap();
    let err = clone_tree(
        std::path::Path::new("/nonexistent/source"),
        &dst.path().join("ws"),
        0,
    )
    .unwrap_err();
    assert!(matches!(err, WorkspaceError::SourceNotFound(_)));
}

#[test]
fn identical_trees_hash_identically() {
    let src = source_tree();
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let stats_a = clone_tree(src.path(), &a.path().join("ws"), 0).unwrap();
    let stats_b = clone_tree(src.path(), &b.path().join("ws"), 0).unwrap();
    assert_eq!(stats_a.content_hash, stats_b.content_hash);
}

#[test]
fn content_change_changes_hash() {
    let src = source_tree();
    let a = TempDir::new().unwrap();
    let first = clone_tree(src.path(), &a.path().join("ws1"), 0).unwrap();
    std::fs::write(src.path().join("main.py"), "print('changed')\n").unwrap();
    let second = clone_tree(src.path(), &a.path().join("ws2"), 0).unwrap();
    assert_ne!(first.content_hash, second.content_hash);
}

#[test]
fn hash_tree_matches_clone_hash() {
    let src = source_tree();
    let dst = TempDir::new().unwrap();
    let sandbox = dst.path().join("ws");
    let stats = clone_tree(src.path(), &sandbox, 0).unwrap();
    assert_eq!(hash_tree(&sandbox).unwrap(), stats.content_hash);
}

#[test]
fn disk_limit_is_enforced() {
    let src = TempDir::new().unwrap();
    std::fs::write(src.path().join("big.bin"), vec![0u8; 2 * 1024 * 1024]).unwrap();
    let dst = TempDir::new().unwrap();
    let err = clone_tree(src.path(), &dst.path().join("ws"), 1).unwrap_err();
    assert!(matches!(err, WorkspaceError::SizeLimitExceeded { .. }));
}
