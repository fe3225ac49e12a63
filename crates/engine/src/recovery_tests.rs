// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::ErrorInfo;
use tempfile::TempDir;

#[test]
fn defaults_cover_every_kind() {
    let registry = RecoveryRegistry::with_defaults();
    for kind in [
        ErrorKind::Permission,
        ErrorKind::FileNotFound,
        ErrorKind::Timeout,
        ErrorKind::CommandNotFound,
        ErrorKind::Validation,
        ErrorKind::Syntax,
        ErrorKind::Value,
        ErrorKind::Runtime,
        ErrorKind::Security,
        ErrorKind::RateLimited,
        ErrorKind::ResourceExhausted,
        ErrorKind::MaxRetriesExceeded,
        ErrorKind::Internal,
    ] {
        assert!(
            !registry.strategies_for(kind).is_empty(),
            "no default strategy for {kind}"
        );
    }
}

#[test]
fn permission_default_carries_fix_permissions_action() {
    let registry = RecoveryRegistry::with_defaults();
    let strategies = registry.strategies_for(ErrorKind::Permission);
    assert!(matches!(
        strategies[0].action,
        Some(RecoveryAction::FixPermissions)
    ));
}

#[test]
fn timeout_default_raises_timeout() {
    let registry = RecoveryRegistry::with_defaults();
    let strategies = registry.strategies_for(ErrorKind::Timeout);
    assert!(matches!(
        strategies[0].action,
        Some(RecoveryAction::RaiseTimeout { factor }) if factor == 2.0
    ));
}

#[test]
fn registered_strategies_sort_by_probability() {
    let mut registry = RecoveryRegistry::with_defaults();
    registry.register(
        RecoveryStrategy::new(ErrorKind::Runtime, "better").with_probability(0.99),
    );
    let strategies = registry.strategies_for(ErrorKind::Runtime);
    assert_eq!(strategies[0].description, "better");
}

#[test]
fn probability_is_clamped() {
    let strategy = RecoveryStrategy::new(ErrorKind::Runtime, "x").with_probability(7.0);
    assert_eq!(strategy.success_probability, 1.0);
}

#[test]
fn suggest_recovery_flags_missing_workspace() {
    let error = ErrorInfo::new(ErrorKind::Runtime, "boom", 0);
    let suggestions = suggest_recovery(
        &error,
        std::path::Path::new("/nonexistent/workspace"),
        &[],
        &[],
    );
    assert!(suggestions[0].contains("no longer exists"));
}

#[test]
fn suggest_recovery_names_touched_files_for_permission_errors() {
    let dir = TempDir::new().unwrap();
    let error = ErrorInfo::new(ErrorKind::Permission, "denied", 0);
    let change = sbx_core::FileChange::new(
        dir.path().join("locked.txt"),
        sbx_core::ChangeType::Modify,
        0,
    );
    let suggestions = suggest_recovery(&error, dir.path(), &[change], &[]);
    assert!(suggestions.iter().any(|s| s.contains("locked.txt")));
}

#[test]
fn suggest_recovery_always_returns_something() {
    let dir = TempDir::new().unwrap();
    let error = ErrorInfo::new(ErrorKind::Value, "bad", 0);
    let suggestions = suggest_recovery(&error, dir.path(), &[], &[]);
    assert!(!suggestions.is_empty());
}

#[test]
fn custom_action_debug_hides_the_hook() {
    let action = RecoveryAction::Custom {
        name: "reseed".to_string(),
        hook: std::sync::Arc::new(|_| true),
    };
    assert_eq!(format!("{:?}", action), "Custom { name: \"reseed\" }");
}
