// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery strategies for failed tasks.
//!
//! Strategies are data: a taxonomy kind, operator-facing suggestions, and an
//! optional effectful action expressed as a tagged variant so the retry
//! engine can dispatch without storing arbitrary closures in plan state.

use sbx_core::{CommandInfo, ErrorInfo, ErrorKind, FileChange};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Hook signature for custom recovery actions.
pub type RecoveryHook = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Effectful recovery action applied before a retry attempt.
#[derive(Clone)]
pub enum RecoveryAction {
    /// Make the workspace and recently modified files writable
    FixPermissions,
    /// Multiply the executor's default timeout for subsequent attempts
    RaiseTimeout { factor: f64 },
    /// Drop executor histories so the retry starts clean
    ClearHistory,
    /// Caller-supplied hook, invoked with the workspace root
    Custom { name: String, hook: RecoveryHook },
}

impl std::fmt::Debug for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryAction::FixPermissions => write!(f, "FixPermissions"),
            RecoveryAction::RaiseTimeout { factor } => {
                write!(f, "RaiseTimeout {{ factor: {} }}", factor)
            }
            RecoveryAction::ClearHistory => write!(f, "ClearHistory"),
            RecoveryAction::Custom { name, .. } => write!(f, "Custom {{ name: {:?} }}", name),
        }
    }
}

/// A recovery strategy registered for an error kind.
#[derive(Debug, Clone)]
pub struct RecoveryStrategy {
    pub kind: ErrorKind,
    pub description: String,
    pub suggested_actions: Vec<String>,
    pub action: Option<RecoveryAction>,
    /// Estimated probability this strategy unblocks the task, in [0, 1]
    pub success_probability: f64,
}

impl RecoveryStrategy {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            suggested_actions: Vec::new(),
            action: None,
            success_probability: 0.5,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_actions.push(suggestion.into());
        self
    }

    pub fn with_action(mut self, action: RecoveryAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.success_probability = probability.clamp(0.0, 1.0);
        self
    }
}

/// Registry mapping error kinds to recovery strategies.
pub struct RecoveryRegistry {
    strategies: HashMap<ErrorKind, Vec<RecoveryStrategy>>,
}

impl RecoveryRegistry {
    /// Registry with the default strategy set covering every error kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            strategies: HashMap::new(),
        };

        registry.register(
            RecoveryStrategy::new(ErrorKind::Permission, "Fix file and directory permissions")
                .with_suggestion("Check workspace ownership")
                .with_suggestion("Make recently modified files writable")
                .with_action(RecoveryAction::FixPermissions)
                .with_probability(0.8),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::Timeout, "Handle command timeouts")
                .with_suggestion("Increase timeout duration")
                .with_suggestion("Break the task into smaller steps")
                .with_action(RecoveryAction::RaiseTimeout { factor: 2.0 })
                .with_probability(0.7),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::CommandNotFound, "Handle missing commands")
                .with_suggestion("Install the missing tool in the workspace")
                .with_suggestion("Check PATH inside the sandbox")
                .with_probability(0.5),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::FileNotFound, "Handle missing files")
                .with_suggestion("Verify the file path against the workspace tree")
                .with_suggestion("Re-run the task that should have produced the file")
                .with_probability(0.6),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::Syntax, "Handle syntax errors in authored code")
                .with_suggestion("Review the most recent file changes")
                .with_probability(0.3),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::Value, "Handle malformed values")
                .with_suggestion("Validate task inputs")
                .with_probability(0.4),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::Runtime, "Retry transient runtime failures")
                .with_suggestion("Inspect recent commands for partial side effects")
                .with_action(RecoveryAction::ClearHistory)
                .with_probability(0.5),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::Validation, "Handle validation failures")
                .with_suggestion("Re-validate the plan before retrying")
                .with_probability(0.3),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::Security, "Handle policy denials")
                .with_suggestion("Keep paths and commands inside the workspace")
                .with_probability(0.2),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::RateLimited, "Back off rate-limited calls")
                .with_suggestion("Wait for the retry-after hint")
                .with_probability(0.9),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::ResourceExhausted, "Free resources")
                .with_suggestion("Run emergency cleanup")
                .with_suggestion("Destroy idle sessions")
                .with_probability(0.6),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::MaxRetriesExceeded, "Escalate exhausted retries")
                .with_suggestion("Surface the attempt history to the operator")
                .with_probability(0.0),
        );
        registry.register(
            RecoveryStrategy::new(ErrorKind::Internal, "Handle internal failures")
                .with_suggestion("Check daemon logs")
                .with_probability(0.3),
        );

        registry
    }

    pub fn register(&mut self, strategy: RecoveryStrategy) {
        self.strategies
            .entry(strategy.kind)
            .or_default()
            .push(strategy);
    }

    /// Strategies for a kind, highest success probability first.
    pub fn strategies_for(&self, kind: ErrorKind) -> Vec<RecoveryStrategy> {
        let mut strategies = self
            .strategies
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        strategies.sort_by(|a, b| {
            b.success_probability
                .partial_cmp(&a.success_probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        strategies
    }
}

impl Default for RecoveryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Environment-aware suggestions derived from the error and a snapshot of
/// the workspace state.
pub fn suggest_recovery(
    error: &ErrorInfo,
    workspace_root: &Path,
    recent_changes: &[FileChange],
    recent_commands: &[CommandInfo],
) -> Vec<String> {
    let mut suggestions = Vec::new();

    if !workspace_root.exists() {
        suggestions.push(format!(
            "Workspace {} no longer exists; recreate the session",
            workspace_root.display()
        ));
    } else if workspace_root
        .metadata()
        .map(|m| m.permissions().readonly())
        .unwrap_or(false)
    {
        suggestions.push("Workspace is read-only; fix permissions before retrying".to_string());
    }

    match error.kind {
        ErrorKind::Permission => {
            for change in recent_changes.iter().rev().take(3) {
                suggestions.push(format!(
                    "Check permissions on {}",
                    change.file_path.display()
                ));
            }
        }
        ErrorKind::Timeout => {
            suggestions.push("Increase the operation timeout".to_string());
            if let Some(last) = recent_commands.last() {
                suggestions.push(format!(
                    "Last command ran {:.1}s: {}",
                    last.duration_seconds, last.command
                ));
            }
        }
        ErrorKind::CommandNotFound => {
            if let Some(last) = recent_commands.last() {
                let tool = last.command.split_whitespace().next().unwrap_or("");
                suggestions.push(format!("Install `{}` inside the sandbox", tool));
            }
        }
        _ => {}
    }

    if suggestions.is_empty() {
        suggestions.push("Review the attempt history and recent commands".to_string());
    }
    suggestions
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
