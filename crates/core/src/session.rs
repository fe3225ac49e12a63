// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier and record.
//!
//! A session is the lifetime of one workspace plus its caches and listeners.
//! Sessions own their workspace exclusively; two sessions never share a
//! sandbox path.

use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

crate::define_id! {
    /// Unique identifier for a sandbox session.
    pub struct SessionId;
}

/// One workspace and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub workspace: Workspace,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>, workspace: Workspace, created_at_ms: u64) -> Self {
        Self {
            id: id.into(),
            workspace,
            created_at_ms,
            metadata: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
