// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace cloning and session lifecycle.
//!
//! One manager owns a sandbox root directory and allocates
//! `<root>/<session_id>/workspace` for each session, plus an `artifacts/`
//! sibling pruned by the cleanup scheduler. Cloning is exclusive; two
//! sessions never share a sandbox path.

use crate::clone::clone_tree;
use crate::error::WorkspaceError;
use sbx_core::{
    Clock, IdGen, IsolationConfig, Session, SessionId, Workspace, WorkspaceId, WorkspaceStatus,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Configuration for a [`WorkspaceManager`].
#[derive(Debug, Clone)]
pub struct WorkspaceManagerConfig {
    /// Process-owned directory all sandboxes live under
    pub sandbox_root: PathBuf,
    /// Maximum number of live sessions; 0 disables the cap
    pub max_sessions: usize,
    pub isolation: IsolationConfig,
}

impl WorkspaceManagerConfig {
    pub fn new(sandbox_root: impl Into<PathBuf>) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
            max_sessions: 20,
            isolation: IsolationConfig::default(),
        }
    }
}

/// Creates, tracks, and destroys per-session workspaces.
pub struct WorkspaceManager<C: Clock, G: IdGen> {
    config: WorkspaceManagerConfig,
    clock: C,
    id_gen: G,
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl<C: Clock, G: IdGen> WorkspaceManager<C, G> {
    pub fn new(config: WorkspaceManagerConfig, clock: C, id_gen: G) -> Self {
        Self {
            config,
            clock,
            id_gen,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.config.sandbox_root
    }

    /// Clone `source_path` into a fresh sandbox and register the session.
    pub fn create_workspace(
        &self,
        source_path: impl AsRef<Path>,
        session_id: Option<SessionId>,
    ) -> Result<Session, WorkspaceError> {
        let source_path = source_path.as_ref();
        if !source_path.is_dir() {
            return Err(WorkspaceError::SourceNotFound(source_path.to_path_buf()));
        }

        let session_id = session_id.unwrap_or_else(|| SessionId::new(self.id_gen.next()));
        {
            let sessions = self.sessions.lock();
            if self.config.max_sessions > 0 && sessions.len() >= self.config.max_sessions {
                return Err(WorkspaceError::SessionLimit(sessions.len()));
            }
            if sessions.contains_key(&session_id) {
                return Err(WorkspaceError::SessionExists(session_id.to_string()));
            }
        }

        let session_dir = self.config.sandbox_root.join(session_id.as_str());
        let sandbox_path = session_dir.join("workspace");
        std::fs::create_dir_all(&sandbox_path)?;
        std::fs::create_dir_all(session_dir.join("artifacts"))?;

        let stats = clone_tree(
            source_path,
            &sandbox_path,
            self.config.isolation.limits.disk_mb,
        )?;

        let now = self.clock.epoch_ms();
        let workspace = Workspace {
            id: WorkspaceId::new(session_id.as_str()),
            source_path: source_path.to_path_buf(),
            sandbox_path: sandbox_path.clone(),
            isolation: self.config.isolation.clone(),
            status: WorkspaceStatus::Active,
            content_hash: Some(stats.content_hash.clone()),
            created_at_ms: now,
        };
        let session = Session::new(session_id.clone(), workspace, now);

        tracing::info!(
            session = %session_id,
            source = %source_path.display(),
            sandbox = %sandbox_path.display(),
            files = stats.files_copied,
            "workspace created"
        );

        self.sessions.lock().insert(session_id, session.clone());
        Ok(session)
    }

    /// Destroy a session's sandbox directory. Idempotent: returns `false`
    /// for unknown sessions, `true` once the directory is gone.
    pub fn destroy_workspace(&self, session_id: &SessionId) -> Result<bool, WorkspaceError> {
        let Some(mut session) = self.sessions.lock().remove(session_id) else {
            return Ok(false);
        };

        session.workspace.status = WorkspaceStatus::CleaningUp;
        let session_dir = self.config.sandbox_root.join(session_id.as_str());
        if session_dir.exists() {
            std::fs::remove_dir_all(&session_dir)?;
        }
        session.workspace.status = WorkspaceStatus::Destroyed;
        tracing::info!(session = %session_id, "workspace destroyed");
        Ok(true)
    }

    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.lock().get(session_id).cloned()
    }

    pub fn sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.lock().values().cloned().collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Session directories on disk that no live session owns.
    ///
    /// The cleanup scheduler removes these (e.g. leftovers from a crashed
    /// process sharing the same sandbox root).
    pub fn orphaned_session_dirs(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut orphans = Vec::new();
        if !self.config.sandbox_root.exists() {
            return Ok(orphans);
        }
        let sessions = self.sessions.lock();
        for entry in std::fs::read_dir(&self.config.sandbox_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !sessions.contains_key(name.as_str()) {
                orphans.push(entry.path());
            }
        }
        Ok(orphans)
    }

    /// Destroy every live session. Used by emergency shutdown.
    pub fn destroy_all(&self) -> usize {
        let ids: Vec<SessionId> = self.sessions.lock().keys().cloned().collect();
        let mut destroyed = 0;
        for id in ids {
            match self.destroy_workspace(&id) {
                Ok(true) => destroyed += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(session = %id, error = %err, "destroy failed during shutdown")
                }
            }
        }
        destroyed
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
