// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::template::PlanCharacteristics;
use sbx_core::{Analysis, FakeClock, Task, TaskPlan};
use serde_json::json;
use std::time::Duration;

fn manager() -> CacheManager<FakeClock> {
    CacheManager::new(FakeClock::default(), CacheConfig::default())
}

fn sample_analysis() -> Analysis {
    Analysis {
        languages: vec!["python".to_string()],
        ..Analysis::default()
    }
}

fn plan_for(workspace: &str) -> TaskPlan {
    let mut plan = TaskPlan::new("p", "plan", 0);
    plan.context.workspace_path = workspace.into();
    plan.tasks.push(Task::new("t", "step"));
    plan
}

#[test]
fn partitions_are_reachable_and_typed() {
    let manager = manager();
    let now = manager.now_ms();
    manager
        .analysis()
        .put("hash", sample_analysis(), "/ws", None, now);
    manager.templates().put("tpl", plan_for("/ws"), None, now);
    manager
        .execution()
        .put("lint", &json!({"file_path": "a.py"}), json!(0), None, now);

    assert!(manager.analysis().get("hash", now).is_some());
    assert!(manager.templates().get("tpl", now).is_some());
    assert!(manager
        .execution()
        .get("lint", &json!({"file_path": "a.py"}), now)
        .is_some());
    assert_eq!(manager.stats().len(), 3);
}

#[test]
fn cleanup_expired_reports_per_partition() {
    let clock = FakeClock::default();
    let manager = CacheManager::new(clock.clone(), CacheConfig::default());
    let now = manager.now_ms();
    manager.analysis().put(
        "hash",
        sample_analysis(),
        "/ws",
        Some(Duration::from_secs(1)),
        now,
    );
    manager
        .execution()
        .put("op", &json!({}), json!(1), Some(Duration::from_secs(1)), now);

    clock.advance(Duration::from_secs(5));
    let report = manager.cleanup_expired();
    assert_eq!(report.analysis, 1);
    assert_eq!(report.execution, 1);
    assert_eq!(report.templates, 0);
    assert_eq!(report.total(), 2);
}

#[test]
fn workspace_invalidation_fans_out() {
    let manager = manager();
    let now = manager.now_ms();
    manager
        .analysis()
        .put("hash", sample_analysis(), "/sandbox/s1/workspace", None, now);
    manager
        .templates()
        .put("tpl", plan_for("/sandbox/s1/workspace"), None, now);
    manager.execution().put(
        "lint",
        &json!({"file_path": "/sandbox/s1/workspace/a.py"}),
        json!(1),
        None,
        now,
    );

    let removed = manager.invalidate_workspace_caches(std::path::Path::new("/sandbox/s1"));
    assert_eq!(removed, 3);
    assert!(manager.analysis().get("hash", now).is_none());
}

#[test]
fn memory_budget_evicts_coldest_entries() {
    let config = CacheConfig {
        max_memory_mb: 1,
        ..CacheConfig::default()
    };
    let manager = CacheManager::new(FakeClock::default(), config);
    let now = manager.now_ms();

    // ~300 KB each; the fourth pushes past 1 MB
    let big = "x".repeat(300 * 1024);
    for n in 0..4u64 {
        manager.execution().put(
            "op",
            &json!({"n": n, "blob": big}),
            json!({"blob": big}),
            None,
            now + n,
        );
    }
    let evicted = manager.enforce_memory_budget();
    assert!(evicted >= 1);
    assert!(manager.memory_used_bytes() <= 1024 * 1024);
}

#[test]
fn health_reports_memory_pressure() {
    let config = CacheConfig {
        max_memory_mb: 1,
        ..CacheConfig::default()
    };
    let manager = CacheManager::new(FakeClock::default(), config);
    let now = manager.now_ms();
    let big = "x".repeat(980 * 1024);
    manager
        .execution()
        .put("op", &json!({"blob": big}), json!({"blob": big}), None, now);

    let health = manager.health();
    assert_eq!(health.status, HealthStatus::Warning);
    assert!(health.memory_percent > 90.0);
    assert!(!health.issues.is_empty());
}

#[test]
fn health_is_healthy_when_idle() {
    let manager = manager();
    let health = manager.health();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert!(health.issues.is_empty());
}

#[test]
fn hit_rate_aggregates_across_partitions() {
    let manager = manager();
    let now = manager.now_ms();
    manager
        .analysis()
        .put("hash", sample_analysis(), "/ws", None, now);
    manager.analysis().get("hash", now);
    manager.analysis().get("missing", now);

    let health = manager.health();
    assert_eq!(health.hit_rate, 0.5);
}

#[test]
fn clear_all_empties_every_partition() {
    let manager = manager();
    let now = manager.now_ms();
    manager
        .analysis()
        .put("hash", sample_analysis(), "/ws", None, now);
    manager.templates().put("tpl", plan_for("/ws"), None, now);
    manager.clear_all();
    assert_eq!(manager.memory_used_bytes(), 0);
    assert!(manager.stats().iter().all(|s| s.entries == 0));
}

#[test]
fn similar_template_lookup_works_through_manager() {
    let manager = manager();
    let now = manager.now_ms();
    manager.templates().put("tpl", plan_for("/ws"), None, now);
    let results = manager
        .templates()
        .find_similar(&PlanCharacteristics::of_plan(&plan_for("/ws")), 5);
    assert_eq!(results.len(), 1);
}
