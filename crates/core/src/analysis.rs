// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codebase analysis snapshot model.
//!
//! Produced by an analyser (the static walker in `sbx-planner`, or a richer
//! external collaborator) and consumed read-only by the planner and the
//! analysis cache.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Dependency information extracted from manifest files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyInfo {
    /// Declared dependency names
    #[serde(default)]
    pub list: Vec<String>,
    /// Manifest files the dependencies were read from
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub outdated: Vec<String>,
}

/// Aggregate code metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub lines_of_code: u64,
    #[serde(default)]
    pub cyclomatic_complexity: f64,
    #[serde(default)]
    pub maintainability_index: f64,
    #[serde(default)]
    pub test_coverage: f64,
    #[serde(default)]
    pub duplication_ratio: f64,
}

/// Structure/dependency/metrics snapshot of a workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Detected languages, most prevalent first
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    /// Files relative to the sandbox root, sorted
    #[serde(default)]
    pub file_tree: Vec<PathBuf>,
    #[serde(default)]
    pub entry_points: Vec<PathBuf>,
    #[serde(default)]
    pub test_directories: Vec<PathBuf>,
    #[serde(default)]
    pub config_files: Vec<PathBuf>,
    #[serde(default)]
    pub dependencies: DependencyInfo,
    /// Detected architectural patterns (e.g. "monorepo", "tests-alongside")
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub metrics: CodeMetrics,
    #[serde(default)]
    pub summary: String,
    pub at_epoch_ms: u64,
}

impl Analysis {
    pub fn files_count(&self) -> usize {
        self.file_tree.len()
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }

    pub fn has_framework(&self, framework: &str) -> bool {
        self.frameworks.iter().any(|f| f == framework)
    }

    /// True when any test directory or test-named file was found.
    pub fn has_tests(&self) -> bool {
        !self.test_directories.is_empty()
    }
}

#[cfg(test)]
#[path = "analysis_tests.rs"]
mod tests;
