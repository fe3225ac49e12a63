// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan-template cache partition.
//!
//! Stores reusable task plans by template name with usage statistics, and
//! answers similarity queries with a weighted Jaccard match over plan
//! characteristics.

use crate::partition::{CachePartition, PartitionStats};
use crate::store::{EvictionCandidate, Store, StoreConfig};
use sbx_core::TaskPlan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;

/// Usage statistics carried by each cached template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub success_count: u64,
    pub total_count: u64,
    pub last_used_ms: u64,
}

impl UsageStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_count as f64
        }
    }
}

/// Characteristics a plan is matched on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanCharacteristics {
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub patterns: Vec<String>,
    pub task_count: usize,
    pub has_tests: bool,
    pub complexity_level: String,
    /// Coarse bucket: "small", "medium", "large"
    pub project_size: String,
}

impl PlanCharacteristics {
    /// Derive characteristics from a plan's context and metadata.
    pub fn of_plan(plan: &TaskPlan) -> Self {
        let loc = plan.context.lines_of_code;
        Self {
            languages: plan.context.languages.clone(),
            frameworks: plan.context.frameworks.clone(),
            patterns: Vec::new(),
            task_count: plan.tasks.len(),
            has_tests: plan
                .tasks
                .iter()
                .any(|t| t.description.to_lowercase().contains("test")),
            complexity_level: plan
                .metadata
                .get("complexity")
                .cloned()
                .unwrap_or_default(),
            project_size: if loc > 50_000 {
                "large".to_string()
            } else if loc > 10_000 {
                "medium".to_string()
            } else {
                "small".to_string()
            },
        }
    }

    /// Weighted similarity in [0, 1].
    pub fn similarity(&self, other: &Self) -> f64 {
        let mut score = 0.0;
        score += 0.25 * jaccard(&self.languages, &other.languages);
        score += 0.20 * jaccard(&self.frameworks, &other.frameworks);
        score += 0.15 * jaccard(&self.patterns, &other.patterns);
        score += 0.10 * count_similarity(self.task_count, other.task_count);
        score += 0.10 * if self.has_tests == other.has_tests { 1.0 } else { 0.0 };
        score += 0.10
            * if !self.complexity_level.is_empty() && self.complexity_level == other.complexity_level
            {
                1.0
            } else {
                0.0
            };
        score += 0.10 * if self.project_size == other.project_size { 1.0 } else { 0.0 };
        score
    }
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let sa: BTreeSet<&String> = a.iter().collect();
    let sb: BTreeSet<&String> = b.iter().collect();
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn count_similarity(a: usize, b: usize) -> f64 {
    let max = a.max(b);
    if max == 0 {
        return 1.0;
    }
    a.min(b) as f64 / max as f64
}

#[derive(Debug, Clone)]
struct CachedTemplate {
    plan: TaskPlan,
    characteristics: PlanCharacteristics,
    stats: UsageStats,
}

/// Reusable plan templates with usage tracking.
pub struct TemplateCache {
    store: Mutex<Store<CachedTemplate>>,
}

impl TemplateCache {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            store: Mutex::new(Store::new(config)),
        }
    }

    pub fn get(&self, name: &str, now_ms: u64) -> Option<TaskPlan> {
        self.store.lock().get(name, now_ms).map(|t| t.plan)
    }

    pub fn put(&self, name: impl Into<String>, plan: TaskPlan, ttl: Option<Duration>, now_ms: u64) {
        let size = serde_json::to_string(&plan).map(|s| s.len()).unwrap_or(0);
        let characteristics = PlanCharacteristics::of_plan(&plan);
        self.store.lock().put(
            name,
            CachedTemplate {
                plan,
                characteristics,
                stats: UsageStats::default(),
            },
            size,
            ttl,
            now_ms,
        );
    }

    /// Record a template use and its outcome.
    pub fn record_use(&self, name: &str, success: bool, now_ms: u64) -> bool {
        let mut store = self.store.lock();
        let updated = match store.get(name, now_ms) {
            Some(mut cached) => {
                cached.stats.total_count += 1;
                if success {
                    cached.stats.success_count += 1;
                }
                cached.stats.last_used_ms = now_ms;
                Some(cached)
            }
            None => None,
        };
        match updated {
            Some(cached) => {
                let size = serde_json::to_string(&cached.plan).map(|s| s.len()).unwrap_or(0);
                store.put(name, cached, size, None, now_ms);
                true
            }
            None => false,
        }
    }

    pub fn usage_stats(&self, name: &str) -> Option<UsageStats> {
        self.store
            .lock()
            .entry(name)
            .map(|entry| entry.value.stats.clone())
    }

    /// Templates most similar to the given characteristics, best first.
    pub fn find_similar(
        &self,
        characteristics: &PlanCharacteristics,
        max_results: usize,
    ) -> Vec<(String, TaskPlan, f64)> {
        let store = self.store.lock();
        let mut scored: Vec<(String, TaskPlan, f64)> = store
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    entry.value.plan.clone(),
                    characteristics.similarity(&entry.value.characteristics),
                )
            })
            .collect();
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_results);
        scored
    }
}

impl CachePartition for TemplateCache {
    fn name(&self) -> &'static str {
        "templates"
    }

    fn stats(&self) -> PartitionStats {
        let store = self.store.lock();
        let (hits, misses) = store.counters();
        PartitionStats {
            name: "templates".to_string(),
            entries: store.len(),
            bytes: store.total_bytes(),
            hits,
            misses,
        }
    }

    fn total_bytes(&self) -> usize {
        self.store.lock().total_bytes()
    }

    fn cleanup_expired(&self, now_ms: u64) -> usize {
        self.store.lock().cleanup_expired(now_ms)
    }

    fn eviction_candidate(&self) -> Option<EvictionCandidate> {
        self.store.lock().eviction_candidate()
    }

    fn evict(&self, key: &str) -> bool {
        self.store.lock().remove(key)
    }

    fn invalidate_workspace(&self, workspace_path: &Path) -> usize {
        // Templates are workspace-agnostic; entries derived from a workspace
        // reference its path in the plan context.
        self.store
            .lock()
            .invalidate_where(|_, entry| entry.value.plan.context.workspace_path == workspace_path)
    }

    fn clear(&self) {
        self.store.lock().invalidate_where(|_, _| true);
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
