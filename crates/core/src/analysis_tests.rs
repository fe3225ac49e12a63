// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample() -> Analysis {
    Analysis {
        languages: vec!["python".to_string(), "javascript".to_string()],
        frameworks: vec!["django".to_string()],
        file_tree: vec!["main.py".into(), "app/views.py".into()],
        test_directories: vec!["tests".into()],
        at_epoch_ms: 1,
        ..Analysis::default()
    }
}

#[test]
fn files_count_matches_tree() {
    assert_eq!(sample().files_count(), 2);
}

#[test]
fn language_and_framework_lookup() {
    let analysis = sample();
    assert!(analysis.has_language("python"));
    assert!(!analysis.has_language("rust"));
    assert!(analysis.has_framework("django"));
    assert!(!analysis.has_framework("react"));
}

#[test]
fn has_tests_follows_test_directories() {
    assert!(sample().has_tests());
    assert!(!Analysis::default().has_tests());
}

#[test]
fn serde_roundtrip() {
    let analysis = sample();
    let json = serde_json::to_string(&analysis).unwrap();
    let back: Analysis = serde_json::from_str(&json).unwrap();
    assert_eq!(back, analysis);
}
