// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::{FakeClock, IsolationConfig, WorkspaceId, WorkspaceStatus};
use tempfile::TempDir;

fn workspace_for(dir: &TempDir) -> Workspace {
    Workspace {
        id: WorkspaceId::new("ws"),
        source_path: "/src".into(),
        sandbox_path: dir.path().to_path_buf(),
        isolation: IsolationConfig::default(),
        status: WorkspaceStatus::Active,
        content_hash: None,
        created_at_ms: 0,
    }
}

fn analyze(dir: &TempDir) -> Analysis {
    StaticAnalyzer::new(FakeClock::default())
        .analyze(&workspace_for(dir))
        .unwrap()
}

#[test]
fn detects_python_project() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.py"), "print('hi')\n").unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "flask>=2.0\nrequests\n").unwrap();
    std::fs::create_dir_all(dir.path().join("tests")).unwrap();
    std::fs::write(dir.path().join("tests/test_main.py"), "def test(): pass\n").unwrap();

    let analysis = analyze(&dir);
    assert_eq!(analysis.languages, vec!["python"]);
    assert!(analysis.has_framework("flask"));
    assert_eq!(analysis.files_count(), 3);
    assert!(analysis.entry_points.contains(&"main.py".into()));
    assert_eq!(analysis.test_directories, vec![std::path::PathBuf::from("tests")]);
    assert!(analysis.dependencies.list.contains(&"flask".to_string()));
    assert!(analysis.dependencies.list.contains(&"requests".to_string()));
    assert!(analysis.metrics.lines_of_code > 0);
}

#[test]
fn detects_javascript_with_react() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("index.js"), "console.log('hi');\n").unwrap();
    std::fs::write(
        dir.path().join("package.json"),
        r#"{"dependencies": {"react": "^18.0.0", "express": "^4.0.0"}}"#,
    )
    .unwrap();

    let analysis = analyze(&dir);
    assert_eq!(analysis.languages, vec!["javascript"]);
    assert!(analysis.has_framework("react"));
    assert!(analysis.has_framework("express"));
}

#[test]
fn ranks_languages_by_file_count() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "y = 2\n").unwrap();
    std::fs::write(dir.path().join("c.js"), "let z = 3;\n").unwrap();

    let analysis = analyze(&dir);
    assert_eq!(analysis.languages, vec!["python", "javascript"]);
}

#[test]
fn detects_docker_and_patterns() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM python:3\n").unwrap();
    std::fs::write(dir.path().join("app.py"), "app = None\n").unwrap();

    let analysis = analyze(&dir);
    assert!(analysis.has_framework("docker"));
    assert!(analysis.patterns.contains(&"containerized".to_string()));
    assert!(analysis.config_files.contains(&"Dockerfile".into()));
}

#[test]
fn empty_workspace_yields_empty_analysis() {
    let dir = TempDir::new().unwrap();
    let analysis = analyze(&dir);
    assert!(analysis.languages.is_empty());
    assert_eq!(analysis.metrics.lines_of_code, 0);
    assert!(!analysis.has_tests());
}

#[test]
fn summary_mentions_languages() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
    let analysis = analyze(&dir);
    assert!(analysis.summary.contains("go"));
}
