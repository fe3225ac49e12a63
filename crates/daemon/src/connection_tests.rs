// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::FakeClock;

fn manager_with(
    per_minute: usize,
    per_hour: usize,
) -> (FakeClock, ConnectionManager<FakeClock>) {
    let clock = FakeClock::default();
    let manager = ConnectionManager::new(
        clock.clone(),
        RateLimitConfig {
            max_requests_per_minute: per_minute,
            max_requests_per_hour: per_hour,
            burst_limit: None,
            burst_window_secs: 10,
        },
        ConnectionLimitConfig::default(),
    );
    (clock, manager)
}

#[test]
fn requests_within_budget_are_allowed() {
    let (_clock, manager) = manager_with(3, 100);
    for _ in 0..3 {
        assert!(manager.check_rate_limit("c1").allowed);
    }
}

#[test]
fn minute_budget_denies_with_retry_after() {
    let (clock, manager) = manager_with(3, 100);
    for _ in 0..3 {
        assert!(manager.check_rate_limit("c1").allowed);
    }
    clock.advance_ms(100);
    let decision = manager.check_rate_limit("c1");
    assert!(!decision.allowed);
    // First request was 0.1s ago: budget returns in ~59.9s
    assert!((decision.retry_after_secs - 59.9).abs() < 0.01);
}

#[test]
fn budget_recovers_after_the_window() {
    let (clock, manager) = manager_with(3, 100);
    for _ in 0..3 {
        assert!(manager.check_rate_limit("c1").allowed);
    }
    assert!(!manager.check_rate_limit("c1").allowed);
    clock.advance(Duration::from_secs(61));
    for _ in 0..3 {
        assert!(manager.check_rate_limit("c1").allowed);
    }
}

#[test]
fn connections_have_independent_budgets() {
    let (_clock, manager) = manager_with(1, 100);
    assert!(manager.check_rate_limit("c1").allowed);
    assert!(manager.check_rate_limit("c2").allowed);
    assert!(!manager.check_rate_limit("c1").allowed);
}

#[test]
fn hourly_budget_denies_until_rollover() {
    let (clock, manager) = manager_with(1000, 5);
    for _ in 0..5 {
        assert!(manager.check_rate_limit("c1").allowed);
        clock.advance(Duration::from_secs(61));
    }
    let decision = manager.check_rate_limit("c1");
    assert!(!decision.allowed);
    assert!(decision.retry_after_secs > 0.0);

    // Full hour from the first request rolls the counter
    clock.advance(Duration::from_secs(3600));
    assert!(manager.check_rate_limit("c1").allowed);
}

#[test]
fn burst_limit_rejects_rapid_fire() {
    let clock = FakeClock::default();
    let manager = ConnectionManager::new(
        clock.clone(),
        RateLimitConfig {
            max_requests_per_minute: 100,
            max_requests_per_hour: 1000,
            burst_limit: Some(2),
            burst_window_secs: 10,
        },
        ConnectionLimitConfig::default(),
    );
    assert!(manager.check_rate_limit("c1").allowed);
    assert!(manager.check_rate_limit("c1").allowed);
    let decision = manager.check_rate_limit("c1");
    assert!(!decision.allowed);
    assert!(decision.retry_after_secs > 0.0);

    clock.advance(Duration::from_secs(11));
    assert!(manager.check_rate_limit("c1").allowed);
}

#[test]
fn concurrent_connection_cap() {
    let clock = FakeClock::default();
    let manager = ConnectionManager::new(
        clock,
        RateLimitConfig::default(),
        ConnectionLimitConfig {
            max_concurrent_connections: 2,
            max_connections_per_ip: 2,
            ip_allowlist: vec![],
            ip_denylist: vec![],
        },
    );
    manager.register_connection("c1", "10.0.0.1").unwrap();
    manager.register_connection("c2", "10.0.0.2").unwrap();
    let err = manager.register_connection("c3", "10.0.0.3").unwrap_err();
    assert!(matches!(err, DaemonError::ResourceExhausted(_)));

    manager.unregister_connection("c1");
    manager.register_connection("c3", "10.0.0.3").unwrap();
}

#[test]
fn per_ip_cap_is_rate_limited_kind() {
    let clock = FakeClock::default();
    let manager = ConnectionManager::new(
        clock,
        RateLimitConfig::default(),
        ConnectionLimitConfig {
            max_concurrent_connections: 10,
            max_connections_per_ip: 1,
            ip_allowlist: vec![],
            ip_denylist: vec![],
        },
    );
    manager.register_connection("c1", "10.0.0.1").unwrap();
    let err = manager.register_connection("c2", "10.0.0.1").unwrap_err();
    assert!(matches!(err, DaemonError::RateLimited { .. }));
    assert_eq!(err.kind(), sbx_core::ErrorKind::RateLimited);
}

#[test]
fn denylist_refuses_registration() {
    let clock = FakeClock::default();
    let manager = ConnectionManager::new(
        clock,
        RateLimitConfig::default(),
        ConnectionLimitConfig {
            ip_denylist: vec!["10.0.0.9".to_string()],
            ..ConnectionLimitConfig::default()
        },
    );
    let err = manager.register_connection("c1", "10.0.0.9").unwrap_err();
    assert!(matches!(err, DaemonError::ConnectionRefused(_)));
}

#[test]
fn allowlist_restricts_registration() {
    let clock = FakeClock::default();
    let manager = ConnectionManager::new(
        clock,
        RateLimitConfig::default(),
        ConnectionLimitConfig {
            ip_allowlist: vec!["10.0.0.1".to_string()],
            ..ConnectionLimitConfig::default()
        },
    );
    manager.register_connection("c1", "10.0.0.1").unwrap();
    assert!(manager.register_connection("c2", "10.0.0.2").is_err());
}

#[test]
fn idle_connections_are_pruned() {
    let (clock, manager) = manager_with(10, 100);
    manager.check_rate_limit("c1");
    clock.advance(Duration::from_secs(7200));
    manager.check_rate_limit("c2");
    let pruned = manager.prune_idle(Duration::from_secs(3600));
    assert_eq!(pruned, 1);
    assert_eq!(manager.stats().active_connections, 1);
}

#[test]
fn reconfiguration_applies_to_subsequent_checks() {
    let (_clock, manager) = manager_with(1, 100);
    assert!(manager.check_rate_limit("c1").allowed);
    assert!(!manager.check_rate_limit("c1").allowed);

    let mut config = manager.rate_limits();
    config.max_requests_per_minute = 10;
    manager.configure_rate_limits(config);
    assert!(manager.check_rate_limit("c1").allowed);
}

#[test]
fn stats_count_requests_and_ips() {
    let clock = FakeClock::default();
    let manager = ConnectionManager::new(
        clock,
        RateLimitConfig::default(),
        ConnectionLimitConfig::default(),
    );
    manager.register_connection("c1", "10.0.0.1").unwrap();
    manager.register_connection("c2", "10.0.0.1").unwrap();
    manager.check_rate_limit("c1");
    manager.check_rate_limit("c2");
    let stats = manager.stats();
    assert_eq!(stats.active_connections, 2);
    assert_eq!(stats.unique_ips, 1);
    assert_eq!(stats.total_requests, 2);
}
