// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-engine: Sandboxed command execution, retry with recovery, and
//! dependency-driven plan execution

pub mod engine;
pub mod error;
pub mod executor;
pub mod recovery;
pub mod retry;

pub use engine::{ExecutionEngine, ExecutionResult, PlanDirective, StatusSink, TaskResult};
pub use error::EngineError;
pub use executor::{
    ExecutorConfig, PackageManager, SandboxExecutor, DEFAULT_COMMAND_TIMEOUT,
};
pub use recovery::{
    suggest_recovery, RecoveryAction, RecoveryHook, RecoveryRegistry, RecoveryStrategy,
};
pub use retry::{AttemptInfo, RetryConfig, RetryContext};
