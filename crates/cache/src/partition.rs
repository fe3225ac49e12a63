// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Common surface the cache manager uses to drive heterogeneous partitions.

use crate::store::EvictionCandidate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-partition statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub name: String,
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

impl PartitionStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Uniform operations over a typed cache partition.
///
/// Values stay typed inside each partition; the manager only needs sizes,
/// counters, expiry sweeps, eviction, and workspace invalidation.
pub trait CachePartition: Send + Sync {
    fn name(&self) -> &'static str;
    fn stats(&self) -> PartitionStats;
    fn total_bytes(&self) -> usize;
    /// Drop expired entries, returning the count removed.
    fn cleanup_expired(&self, now_ms: u64) -> usize;
    /// Next entry global eviction would remove from this partition.
    fn eviction_candidate(&self) -> Option<EvictionCandidate>;
    fn evict(&self, key: &str) -> bool;
    /// Drop entries tied to a workspace path, returning the count removed.
    fn invalidate_workspace(&self, workspace_path: &Path) -> usize;
    fn clear(&self);
}
