// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Analysis cache partition.
//!
//! Keyed by workspace content hash, so identical trees hit regardless of
//! which session produced them. Entries remember the workspace path for
//! prefix invalidation.

use crate::partition::{CachePartition, PartitionStats};
use crate::store::{EvictionCandidate, Store, StoreConfig};
use sbx_core::Analysis;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

/// Default analysis TTL: 24 hours.
pub const DEFAULT_ANALYSIS_TTL: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone)]
struct CachedAnalysis {
    analysis: Analysis,
    workspace_path: PathBuf,
}

/// Memoised codebase analyses.
pub struct AnalysisCache {
    store: Mutex<Store<CachedAnalysis>>,
}

impl AnalysisCache {
    pub fn new(mut config: StoreConfig) -> Self {
        if config.default_ttl.is_none() {
            config.default_ttl = Some(DEFAULT_ANALYSIS_TTL);
        }
        Self {
            store: Mutex::new(Store::new(config)),
        }
    }

    pub fn get(&self, content_hash: &str, now_ms: u64) -> Option<Analysis> {
        self.store
            .lock()
            .get(content_hash, now_ms)
            .map(|cached| cached.analysis)
    }

    pub fn put(
        &self,
        content_hash: impl Into<String>,
        analysis: Analysis,
        workspace_path: impl Into<PathBuf>,
        ttl: Option<Duration>,
        now_ms: u64,
    ) {
        let size = serde_json::to_string(&analysis).map(|s| s.len()).unwrap_or(0);
        self.store.lock().put(
            content_hash,
            CachedAnalysis {
                analysis,
                workspace_path: workspace_path.into(),
            },
            size,
            ttl,
            now_ms,
        );
    }

    /// Drop every analysis whose workspace sits under `prefix`.
    pub fn invalidate_by_path_prefix(&self, prefix: &Path) -> usize {
        self.store
            .lock()
            .invalidate_where(|_, entry| entry.value.workspace_path.starts_with(prefix))
    }
}

impl CachePartition for AnalysisCache {
    fn name(&self) -> &'static str {
        "analysis"
    }

    fn stats(&self) -> PartitionStats {
        let store = self.store.lock();
        let (hits, misses) = store.counters();
        PartitionStats {
            name: "analysis".to_string(),
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
        self.invalidate_by_path_prefix(workspace_path)
    }

    fn clear(&self) {
        self.store.lock().invalidate_where(|_, _| true);
    }
}

#[cfg(test)]
#[path = "analysis_tests.rs"]
mod tests;
