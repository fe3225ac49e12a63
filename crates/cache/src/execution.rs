// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution cache partition.
//!
//! Memoises results of pure operations. Keys derive from the operation type
//! plus canonicalised parameters; side-effecting operations are refused.
//! Every entry records the files it depended on so file changes invalidate
//! exactly the affected results.

use crate::partition::{CachePartition, PartitionStats};
use crate::store::{EvictionCandidate, Store, StoreConfig};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

/// Operation types that always have side effects.
const SIDE_EFFECT_OPS: &[&str] = &[
    "file_write",
    "file_delete",
    "file_move",
    "git_commit",
    "git_push",
    "package_install",
    "command_execute",
];

/// Parameter keys that list file dependencies.
const FILE_PARAM_KEYS: &[&str] = &["file_path", "file_paths", "files"];

/// True when an operation's result may be memoised.
pub fn is_cacheable(op_type: &str, params: &Value) -> bool {
    if SIDE_EFFECT_OPS.contains(&op_type) {
        return false;
    }
    if let Some(write) = params.get("write").and_then(Value::as_bool) {
        if write {
            return false;
        }
    }
    true
}

/// Stable cache key: operation type plus canonically serialised parameters.
///
/// `serde_json`'s map keeps keys sorted, so logically equal parameter maps
/// serialise identically.
pub fn cache_key(op_type: &str, params: &Value) -> String {
    format!("{}:{}", op_type, params)
}

/// File paths referenced by an operation's parameters.
pub fn file_dependencies(params: &Value) -> Vec<PathBuf> {
    let mut deps = BTreeSet::new();
    for key in FILE_PARAM_KEYS {
        match params.get(key) {
            Some(Value::String(path)) => {
                deps.insert(PathBuf::from(path));
            }
            Some(Value::Array(paths)) => {
                for path in paths.iter().filter_map(Value::as_str) {
                    deps.insert(PathBuf::from(path));
                }
            }
            _ => {}
        }
    }
    deps.into_iter().collect()
}

#[derive(Debug, Clone)]
struct CachedResult {
    result: Value,
    dependencies: Vec<PathBuf>,
}

/// Memoised pure-operation results.
pub struct ExecutionCache {
    store: Mutex<Store<CachedResult>>,
}

impl ExecutionCache {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            store: Mutex::new(Store::new(config)),
        }
    }

    pub fn get(&self, op_type: &str, params: &Value, now_ms: u64) -> Option<Value> {
        let key = cache_key(op_type, params);
        self.store.lock().get(&key, now_ms).map(|c| c.result)
    }

    /// Cache an operation result. Returns false (and stores nothing) for
    /// uncacheable operations.
    pub fn put(
        &self,
        op_type: &str,
        params: &Value,
        result: Value,
        ttl: Option<Duration>,
        now_ms: u64,
    ) -> bool {
        if !is_cacheable(op_type, params) {
            tracing::debug!(op_type, "refusing to cache side-effecting operation");
            return false;
        }
        let key = cache_key(op_type, params);
        let size = result.to_string().len() + key.len();
        let dependencies = file_dependencies(params);
        self.store.lock().put(
            key,
            CachedResult {
                result,
                dependencies,
            },
            size,
            ttl,
            now_ms,
        );
        true
    }

    /// Drop every result depending on any of the changed files.
    pub fn invalidate_related(&self, changed_files: &[PathBuf]) -> usize {
        self.store.lock().invalidate_where(|_, entry| {
            entry
                .value
                .dependencies
                .iter()
                .any(|dep| changed_files.contains(dep))
        })
    }
}

impl CachePartition for ExecutionCache {
    fn name(&self) -> &'static str {
        "execution"
    }

    fn stats(&self) -> PartitionStats {
        let store = self.store.lock();
        let (hits, misses) = store.counters();
        PartitionStats {
            name: "execution".to_string(),
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
        self.store.lock().invalidate_where(|_, entry| {
            entry
                .value
                .dependencies
                .iter()
                .any(|dep| dep.starts_with(workspace_path))
        })
    }

    fn clear(&self) {
        self.store.lock().invalidate_where(|_, _| true);
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
