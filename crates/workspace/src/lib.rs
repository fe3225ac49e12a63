// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-workspace: Scoped filesystem access, workspace cloning, and
//! multi-file transactions for the intelligent sandbox

pub mod clone;
pub mod error;
pub mod manager;
pub mod scoped;
pub mod transaction;

pub use clone::{clone_tree, hash_tree, CloneStats};
pub use error::WorkspaceError;
pub use manager::{WorkspaceManager, WorkspaceManagerConfig};
pub use scoped::{CopyOptions, ScopedFs, VCS_DIRS};
pub use transaction::{
    ConflictKind, ConflictSeverity, FileConflict, FileOperation, MultiFileTransaction, OpKind,
    ResolutionStrategy, TransactionCoordinator, TransactionId, TransactionReport,
    TransactionState, TransactionStatus,
};
