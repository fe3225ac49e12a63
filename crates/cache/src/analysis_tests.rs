// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::StoreConfig;
use sbx_core::Analysis;

fn sample_analysis() -> Analysis {
    Analysis {
        languages: vec!["python".to_string()],
        summary: "sample".to_string(),
        ..Analysis::default()
    }
}

#[test]
fn get_after_put_round_trips() {
    let cache = AnalysisCache::new(StoreConfig::default());
    cache.put("hash-1", sample_analysis(), "/sandbox/s1/workspace", None, 0);
    let hit = cache.get("hash-1", 1_000).unwrap();
    assert_eq!(hit.languages, vec!["python"]);
}

#[test]
fn default_ttl_is_24_hours() {
    let cache = AnalysisCache::new(StoreConfig {
        max_entries: 10,
        default_ttl: None,
    });
    cache.put("hash-1", sample_analysis(), "/ws", None, 0);
    let just_before = 24 * 3600 * 1000 - 1;
    assert!(cache.get("hash-1", just_before).is_some());
    assert!(cache.get("hash-1", just_before + 1).is_none());
}

#[test]
fn invalidate_by_path_prefix_targets_workspace() {
    let cache = AnalysisCache::new(StoreConfig::default());
    cache.put("h1", sample_analysis(), "/sandbox/s1/workspace", None, 0);
    cache.put("h2", sample_analysis(), "/sandbox/s2/workspace", None, 0);

    let removed = cache.invalidate_by_path_prefix(std::path::Path::new("/sandbox/s1"));
    assert_eq!(removed, 1);
    assert!(cache.get("h1", 1).is_none());
    assert!(cache.get("h2", 1).is_some());
}

#[test]
fn partition_stats_report_counts() {
    let cache = AnalysisCache::new(StoreConfig::default());
    cache.put("h1", sample_analysis(), "/ws", None, 0);
    cache.get("h1", 1);
    cache.get("missing", 1);

    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!(stats.bytes > 0);
    assert_eq!(stats.hit_rate(), 0.5);
}
