// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified cache manager.
//!
//! Holds the three typed partitions, enforces the global memory bound with
//! lowest-hit-count-then-oldest eviction across all of them, fans out
//! workspace invalidation, and reports cache health.

use crate::analysis::AnalysisCache;
use crate::execution::ExecutionCache;
use crate::partition::{CachePartition, PartitionStats};
use crate::store::StoreConfig;
use crate::template::TemplateCache;
use sbx_core::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Manager-wide configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Global memory budget across all partitions
    pub max_memory_mb: u64,
    pub analysis: StoreConfig,
    pub templates: StoreConfig,
    pub execution: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 512,
            analysis: StoreConfig::default(),
            templates: StoreConfig::default(),
            execution: StoreConfig::default(),
        }
    }
}

/// Overall cache health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Info,
    Warning,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Info => write!(f, "info"),
            HealthStatus::Warning => write!(f, "warning"),
        }
    }
}

/// Health report across partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    pub memory_used_bytes: usize,
    /// Used over budget, in [0, 100]
    pub memory_percent: f64,
    /// Hits over lookups across partitions, in [0, 1]
    pub hit_rate: f64,
    pub issues: Vec<String>,
}

/// Expiry sweep counts per partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub analysis: usize,
    pub templates: usize,
    pub execution: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.analysis + self.templates + self.execution
    }
}

/// Owns the cache partitions and applies shared policy.
pub struct CacheManager<C: Clock> {
    clock: C,
    config: CacheConfig,
    analysis: Arc<AnalysisCache>,
    templates: Arc<TemplateCache>,
    execution: Arc<ExecutionCache>,
}

impl<C: Clock> CacheManager<C> {
    pub fn new(clock: C, config: CacheConfig) -> Self {
        Self {
            analysis: Arc::new(AnalysisCache::new(config.analysis.clone())),
            templates: Arc::new(TemplateCache::new(config.templates.clone())),
            execution: Arc::new(ExecutionCache::new(config.execution.clone())),
            clock,
            config,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    pub fn analysis(&self) -> &AnalysisCache {
        &self.analysis
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn execution(&self) -> &ExecutionCache {
        &self.execution
    }

    fn partitions(&self) -> [&dyn CachePartition; 3] {
        [
            self.analysis.as_ref(),
            self.templates.as_ref(),
            self.execution.as_ref(),
        ]
    }

    /// Total estimated bytes across partitions.
    pub fn memory_used_bytes(&self) -> usize {
        self.partitions().iter().map(|p| p.total_bytes()).sum()
    }

    /// Evict globally until memory fits the budget: lowest hit count first,
    /// ties broken by oldest insertion. Called cooperatively after puts.
    pub fn enforce_memory_budget(&self) -> usize {
        let budget = self.config.max_memory_mb as usize * 1024 * 1024;
        if budget == 0 {
            return 0;
        }
        let mut evicted = 0;
        while self.memory_used_bytes() > budget {
            let victim = self
                .partitions()
                .iter()
                .filter_map(|p| p.eviction_candidate().map(|c| (p.name(), c)))
                .min_by(|(_, a), (_, b)| {
                    a.hit_count
                        .cmp(&b.hit_count)
                        .then(a.inserted_at_ms.cmp(&b.inserted_at_ms))
                });
            let Some((partition_name, candidate)) = victim else {
                break;
            };
            for partition in self.partitions() {
                if partition.name() == partition_name {
                    partition.evict(&candidate.key);
                }
            }
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted, "memory budget enforced");
        }
        evicted
    }

    /// Sweep expired entries across partitions.
    pub fn cleanup_expired(&self) -> CleanupReport {
        let now = self.clock.epoch_ms();
        let report = CleanupReport {
            analysis: self.analysis.cleanup_expired(now),
            templates: self.templates.cleanup_expired(now),
            execution: self.execution.cleanup_expired(now),
        };
        if report.total() > 0 {
            tracing::debug!(
                analysis = report.analysis,
                templates = report.templates,
                execution = report.execution,
                "expired cache entries swept"
            );
        }
        report
    }

    /// Fan workspace invalidation out across every partition.
    pub fn invalidate_workspace_caches(&self, workspace_path: &Path) -> usize {
        let removed: usize = self
            .partitions()
            .iter()
            .map(|p| p.invalidate_workspace(workspace_path))
            .sum();
        tracing::info!(
            workspace = %workspace_path.display(),
            removed,
            "workspace caches invalidated"
        );
        removed
    }

    /// Drop everything. Used by emergency cleanup.
    pub fn clear_all(&self) {
        for partition in self.partitions() {
            partition.clear();
        }
    }

    pub fn stats(&self) -> Vec<PartitionStats> {
        self.partitions().iter().map(|p| p.stats()).collect()
    }

    /// Health report: memory pressure and hit rate with an issue list.
    pub fn health(&self) -> CacheHealth {
        let used = self.memory_used_bytes();
        let budget = self.config.max_memory_mb as usize * 1024 * 1024;
        let percent = if budget == 0 {
            0.0
        } else {
            used as f64 / budget as f64 * 100.0
        };

        let stats = self.stats();
        let (hits, lookups) = stats
            .iter()
            .fold((0u64, 0u64), |(h, t), s| (h + s.hits, t + s.hits + s.misses));
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        let mut issues = Vec::new();
        if percent > 90.0 {
            issues.push(format!("memory usage at {:.0}% of budget", percent));
        }
        if lookups > 100 && hit_rate < 0.2 {
            issues.push(format!("hit rate low: {:.0}%", hit_rate * 100.0));
        }

        let status = if percent > 90.0 {
            HealthStatus::Warning
        } else if !issues.is_empty() || percent > 75.0 {
            HealthStatus::Info
        } else {
            HealthStatus::Healthy
        };

        CacheHealth {
            status,
            memory_used_bytes: used,
            memory_percent: percent,
            hit_rate,
            issues,
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
