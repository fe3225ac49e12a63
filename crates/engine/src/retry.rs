// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry context and exponential backoff.
//!
//! The retry budget is `len(previous_attempts) < max_retries` and the delay
//! before attempt `n` is `base_delay * backoff_multiplier^n`, so delays are
//! non-decreasing for multipliers >= 1.

use crate::recovery::RecoveryStrategy;
use sbx_core::{ErrorInfo, Task};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

/// Record of one execution attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptInfo {
    /// 1-based attempt number
    pub attempt_number: usize,
    pub at_epoch_ms: u64,
    pub duration_seconds: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
    pub changes_made: usize,
    pub commands_executed: usize,
}

/// Accumulated state used to decide whether and how to retry a failed task.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub task: Task,
    /// Most recent failure
    pub error_info: ErrorInfo,
    pub previous_attempts: Vec<AttemptInfo>,
    /// Registered strategies for the failure kind, best first
    pub strategies: Vec<RecoveryStrategy>,
    /// Environment-aware operator suggestions
    pub suggestions: Vec<String>,
    pub config: RetryConfig,
}

impl RetryContext {
    pub fn new(task: Task, error_info: ErrorInfo, config: RetryConfig) -> Self {
        Self {
            task,
            error_info,
            previous_attempts: Vec::new(),
            strategies: Vec::new(),
            suggestions: Vec::new(),
            config,
        }
    }

    /// True while attempts remain in the budget.
    pub fn can_retry(&self) -> bool {
        self.previous_attempts.len() < self.config.max_retries
    }

    /// Backoff delay before the next attempt.
    pub fn next_delay(&self) -> Duration {
        let exponent = self.previous_attempts.len() as i32;
        let factor = self.config.backoff_multiplier.powi(exponent);
        self.config.base_delay.mul_f64(factor)
    }

    /// Register an attempt outcome.
    pub fn record_attempt(&mut self, attempt: AttemptInfo) {
        self.previous_attempts.push(attempt);
    }

    /// The strategy most likely to succeed, if any.
    pub fn best_strategy(&self) -> Option<&RecoveryStrategy> {
        self.strategies.first()
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
