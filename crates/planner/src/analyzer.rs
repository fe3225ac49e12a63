// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codebase analysis.
//!
//! [`CodebaseAnalyzer`] is the seam for richer external analysers; the
//! bundled [`StaticAnalyzer`] walks the sandbox tree and derives languages,
//! frameworks, dependencies, and metrics from file extensions and manifest
//! contents. That is enough for the planner's language-aware decomposition.

use crate::error::PlannerError;
use sbx_core::{Analysis, Clock, CodeMetrics, DependencyInfo, Workspace};
use sbx_workspace::ScopedFs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Produces a structure/dependency/metrics snapshot of a workspace.
pub trait CodebaseAnalyzer: Send + Sync {
    fn analyze(&self, workspace: &Workspace) -> Result<Analysis, PlannerError>;
}

/// Filesystem-walking analyser.
pub struct StaticAnalyzer<C: Clock> {
    clock: C,
}

impl<C: Clock> StaticAnalyzer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> CodebaseAnalyzer for StaticAnalyzer<C> {
    fn analyze(&self, workspace: &Workspace) -> Result<Analysis, PlannerError> {
        let fs = ScopedFs::new(&workspace.sandbox_path, workspace.isolation.enabled)?;
        let files = fs.walk()?;

        let mut language_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut lines_of_code = 0u64;
        let mut entry_points = Vec::new();
        let mut test_directories = Vec::new();
        let mut config_files = Vec::new();

        for relative in &files {
            if let Some(language) = language_for(relative) {
                *language_counts.entry(language).or_insert(0) += 1;
                if let Ok(content) = fs.read(relative) {
                    lines_of_code += content.lines().count() as u64;
                }
            }
            if is_entry_point(relative) {
                entry_points.push(relative.clone());
            }
            if is_config_file(relative) {
                config_files.push(relative.clone());
            }
            if let Some(dir) = test_directory_of(relative) {
                if !test_directories.contains(&dir) {
                    test_directories.push(dir);
                }
            }
        }

        // Most prevalent language first
        let mut ranked: Vec<(&str, usize)> =
            language_counts.iter().map(|(l, c)| (*l, *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        let languages: Vec<String> = ranked.iter().map(|(l, _)| l.to_string()).collect();

        let dependencies = read_dependencies(&fs, &files);
        let frameworks = detect_frameworks(&fs, &files, &dependencies);
        let patterns = detect_patterns(&files, &test_directories, &frameworks);

        let metrics = CodeMetrics {
            lines_of_code,
            // Rough proxies; a full analyser is an external collaborator
            cyclomatic_complexity: (lines_of_code as f64 / 100.0).min(100.0),
            maintainability_index: (100.0 - (lines_of_code as f64).log10() * 10.0).clamp(0.0, 100.0),
            test_coverage: 0.0,
            duplication_ratio: 0.0,
        };

        let summary = format!(
            "{} files, {} lines; languages: {}; frameworks: {}",
            files.len(),
            lines_of_code,
            if languages.is_empty() {
                "none".to_string()
            } else {
                languages.join(", ")
            },
            if frameworks.is_empty() {
                "none".to_string()
            } else {
                frameworks.join(", ")
            },
        );

        tracing::debug!(
            workspace = %workspace.sandbox_path.display(),
            files = files.len(),
            loc = lines_of_code,
            "analysis complete"
        );

        Ok(Analysis {
            languages,
            frameworks,
            file_tree: files,
            entry_points,
            test_directories,
            config_files,
            dependencies,
            patterns,
            metrics,
            summary,
            at_epoch_ms: self.clock.epoch_ms(),
        })
    }
}

fn language_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "py" => Some("python"),
        "js" | "jsx" | "ts" | "tsx" | "mjs" => Some("javascript"),
        "java" => Some("java"),
        "rs" => Some("rust"),
        "go" => Some("go"),
        "rb" => Some("ruby"),
        "cpp" | "cc" | "cxx" | "hpp" => Some("c++"),
        "c" | "h" => Some("c"),
        "scala" => Some("scala"),
        "hs" => Some("haskell"),
        _ => None,
    }
}

fn is_entry_point(path: &Path) -> bool {
    const ENTRY_NAMES: &[&str] = &[
        "main.py", "app.py", "__main__.py", "index.js", "main.js", "server.js", "main.go",
    ];
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    ENTRY_NAMES.contains(&name) || path.ends_with("src/main.rs") || path.ends_with("src/main.js")
}

fn is_config_file(path: &Path) -> bool {
    const CONFIG_NAMES: &[&str] = &[
        "requirements.txt",
        "pyproject.toml",
        "setup.py",
        "package.json",
        "Cargo.toml",
        "go.mod",
        "pom.xml",
        "build.gradle",
        "Dockerfile",
        "docker-compose.yml",
        "Makefile",
    ];
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| CONFIG_NAMES.contains(&n))
        .unwrap_or(false)
}

fn test_directory_of(path: &Path) -> Option<PathBuf> {
    const TEST_DIRS: &[&str] = &["tests", "test", "spec", "__tests__"];
    for ancestor in path.ancestors().skip(1) {
        let Some(name) = ancestor.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if TEST_DIRS.contains(&name) {
            return Some(ancestor.to_path_buf());
        }
    }
    None
}

fn read_dependencies(fs: &ScopedFs, files: &[PathBuf]) -> DependencyInfo {
    let mut info = DependencyInfo::default();

    for file in files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match name {
            "requirements.txt" => {
                if let Ok(content) = fs.read(file) {
                    for line in content.lines() {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        let dep = line
                            .split(['=', '>', '<', '~', '!', ';', ' '])
                            .next()
                            .unwrap_or(line);
                        if !dep.is_empty() {
                            info.list.push(dep.to_string());
                        }
                    }
                    info.files.push(file.clone());
                }
            }
            "package.json" => {
                if let Ok(content) = fs.read(file) {
                    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) {
                        for section in ["dependencies", "devDependencies"] {
                            if let Some(deps) = json.get(section).and_then(|d| d.as_object()) {
                                info.list.extend(deps.keys().cloned());
                            }
                        }
                    }
                    info.files.push(file.clone());
                }
            }
            "go.mod" => {
                if let Ok(content) = fs.read(file) {
                    for line in content.lines() {
                        let line = line.trim();
                        if let Some(rest) = line.strip_prefix("require ") {
                            if let Some(module) = rest.split_whitespace().next() {
                                info.list.push(module.to_string());
                            }
                        }
                    }
                    info.files.push(file.clone());
                }
            }
            _ => {}
        }
    }

    info.list.sort();
    info.list.dedup();
    info
}

fn detect_frameworks(fs: &ScopedFs, files: &[PathBuf], deps: &DependencyInfo) -> Vec<String> {
    let mut frameworks = Vec::new();
    let has_file = |name: &str| {
        files
            .iter()
            .any(|f| f.file_name().and_then(|n| n.to_str()) == Some(name))
    };
    let has_dep = |name: &str| deps.list.iter().any(|d| d.eq_ignore_ascii_case(name));

    if has_file("manage.py") || has_dep("django") {
        frameworks.push("django".to_string());
    }
    if has_dep("flask") {
        frameworks.push("flask".to_string());
    }
    for js_framework in ["react", "vue", "angular", "express"] {
        if has_dep(js_framework)
            || deps
                .list
                .iter()
                .any(|d| d.starts_with(&format!("@{}/", js_framework)))
        {
            frameworks.push(js_framework.to_string());
        }
    }
    if has_file("pom.xml") || has_file("build.gradle") {
        let spring = files
            .iter()
            .filter(|f| f.file_name().and_then(|n| n.to_str()) == Some("pom.xml"))
            .any(|f| {
                fs.read(f)
                    .map(|content| content.contains("springframework"))
                    .unwrap_or(false)
            });
        if spring {
            frameworks.push("spring".to_string());
        }
    }
    if has_file("Dockerfile") || has_file("docker-compose.yml") {
        frameworks.push("docker".to_string());
    }

    frameworks
}

fn detect_patterns(
    files: &[PathBuf],
    test_directories: &[PathBuf],
    frameworks: &[String],
) -> Vec<String> {
    let mut patterns = Vec::new();
    if !test_directories.is_empty() {
        patterns.push("tested".to_string());
    }
    let manifest_count = files
        .iter()
        .filter(|f| {
            matches!(
                f.file_name().and_then(|n| n.to_str()),
                Some("package.json") | Some("Cargo.toml") | Some("pyproject.toml") | Some("go.mod")
            )
        })
        .count();
    if manifest_count > 1 {
        patterns.push("monorepo".to_string());
    }
    if frameworks.iter().any(|f| f == "docker") {
        patterns.push("containerized".to_string());
    }
    patterns
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod tests;
