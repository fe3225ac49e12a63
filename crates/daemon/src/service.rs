// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox service: wires the subsystems together.
//!
//! One service owns the workspace manager, analyser, caches, planner,
//! status manager, approval workflow, execution engine, resource manager,
//! and connection manager. The tool surface dispatches into it; the cleanup
//! scheduler runs against it in the background.

use crate::connection::{ConnectionLimitConfig, ConnectionManager, RateLimitConfig};
use crate::env::Limits;
use crate::error::DaemonError;
use crate::resource::ResourceManager;
use sbx_cache::{CacheConfig, CacheManager, PlanCharacteristics, StoreConfig};
use sbx_core::{
    Analysis, Clock, ErrorInfo, IdGen, PlanId, Session, SessionId, TaskId, TaskStatus,
};
use sbx_engine::{ExecutionEngine, ExecutionResult, RetryConfig, StatusSink};
use sbx_planner::{
    ApprovalResponse, ApprovalWorkflow, CodebaseAnalyzer, RequestId, StaticAnalyzer,
    StatusManager, TaskPlanner,
};
use sbx_workspace::{WorkspaceManager, WorkspaceManagerConfig};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

/// Retained execution-history entries per session.
const HISTORY_CAP: usize = 100;

/// One audited action against a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_type: String,
    pub description: String,
    pub at_epoch_ms: u64,
    pub success: bool,
}

/// Bridges engine status events into the status manager.
struct StatusBridge<C: Clock> {
    status: Arc<StatusManager<C>>,
}

impl<C: Clock> StatusSink for StatusBridge<C> {
    fn on_status(
        &self,
        _plan_id: &PlanId,
        task_id: &TaskId,
        status: TaskStatus,
        error: Option<&ErrorInfo>,
    ) {
        if let Err(err) =
            self.status
                .update_task_status(task_id, status, None, None, error.cloned())
        {
            tracing::warn!(task = %task_id, error = %err, "status bridge update failed");
        }
    }
}

/// The assembled sandbox service.
pub struct SandboxService<C: Clock, G: IdGen> {
    clock: C,
    limits: Limits,
    workspaces: WorkspaceManager<C, G>,
    analyzer: StaticAnalyzer<C>,
    cache: CacheManager<C>,
    status: Arc<StatusManager<C>>,
    planner: TaskPlanner<C, G>,
    approval: ApprovalWorkflow<C, G>,
    engine: ExecutionEngine<C>,
    resources: ResourceManager<C>,
    connections: ConnectionManager<C>,
    history: Mutex<HashMap<SessionId, VecDeque<ActionRecord>>>,
    /// Per-session execution locks so destroy waits for in-flight plans
    execution_locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: Clock + 'static, G: IdGen> SandboxService<C, G> {
    pub fn new(limits: Limits, sandbox_root: impl Into<PathBuf>, clock: C, id_gen: G) -> Self {
        let sandbox_root = sandbox_root.into();

        let mut workspace_config = WorkspaceManagerConfig::new(sandbox_root.clone());
        workspace_config.max_sessions = limits.max_sessions;

        let store = StoreConfig {
            max_entries: limits.max_cache_size,
            default_ttl: None,
        };
        let cache_config = CacheConfig {
            max_memory_mb: limits.max_memory_mb,
            analysis: store.clone(),
            templates: store.clone(),
            execution: store,
        };

        let status = Arc::new(StatusManager::new(clock.clone()));
        let mut engine = ExecutionEngine::new(clock.clone(), sandbox_root.clone())
            .with_retry_config(RetryConfig::default())
            .with_command_timeout(limits.command_timeout);
        engine.add_status_sink(Arc::new(StatusBridge {
            status: Arc::clone(&status),
        }));

        Self {
            workspaces: WorkspaceManager::new(workspace_config, clock.clone(), id_gen.clone()),
            analyzer: StaticAnalyzer::new(clock.clone()),
            cache: CacheManager::new(clock.clone(), cache_config),
            planner: TaskPlanner::new(clock.clone(), id_gen.clone(), Arc::clone(&status)),
            approval: ApprovalWorkflow::new(clock.clone(), id_gen),
            resources: ResourceManager::new(limits.clone(), clock.clone()),
            connections: ConnectionManager::new(
                clock.clone(),
                RateLimitConfig::default(),
                ConnectionLimitConfig::default(),
            ),
            status,
            engine,
            history: Mutex::new(HashMap::new()),
            execution_locks: Mutex::new(HashMap::new()),
            clock,
            limits,
        }
    }

    fn execution_lock(&self, session_id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.execution_locks
                .lock()
                .entry(session_id.clone())
                .or_default(),
        )
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn connections(&self) -> &ConnectionManager<C> {
        &self.connections
    }

    pub fn resources(&self) -> &ResourceManager<C> {
        &self.resources
    }

    pub fn cache(&self) -> &CacheManager<C> {
        &self.cache
    }

    pub fn status_manager(&self) -> Arc<StatusManager<C>> {
        Arc::clone(&self.status)
    }

    pub fn workspaces(&self) -> &WorkspaceManager<C, G> {
        &self.workspaces
    }

    pub fn planner(&self) -> &TaskPlanner<C, G> {
        &self.planner
    }

    pub fn approval(&self) -> &ApprovalWorkflow<C, G> {
        &self.approval
    }

    fn record_action(
        &self,
        session_id: &SessionId,
        action_type: &str,
        description: impl Into<String>,
        success: bool,
    ) {
        let mut history = self.history.lock();
        let ring = history.entry(session_id.clone()).or_default();
        if ring.len() >= HISTORY_CAP {
            ring.pop_front();
        }
        ring.push_back(ActionRecord {
            action_type: action_type.to_string(),
            description: description.into(),
            at_epoch_ms: self.clock.epoch_ms(),
            success,
        });
    }

    /// Clone a source tree into a new session workspace.
    pub fn create_workspace(
        &self,
        source_path: &str,
        session_id: Option<String>,
    ) -> Result<Session, DaemonError> {
        self.resources.check_resource_limits(
            self.workspaces.session_count(),
            self.cache.memory_used_bytes(),
        )?;
        let session = self
            .workspaces
            .create_workspace(source_path, session_id.map(SessionId::new))?;
        self.record_action(
            &session.id,
            "create_workspace",
            format!("cloned {}", source_path),
            true,
        );
        Ok(session)
    }

    /// Destroy a session workspace and drop its cached state. Waits for any
    /// in-flight plan execution bound to the session to unwind first.
    pub async fn destroy_workspace(&self, session_id: &str) -> Result<bool, DaemonError> {
        let session_id = SessionId::new(session_id);
        let lock = self.execution_lock(&session_id);
        let _in_flight = lock.lock().await;

        let sandbox_path = self
            .workspaces
            .session(&session_id)
            .map(|s| s.workspace.sandbox_path.clone());
        let destroyed = self.workspaces.destroy_workspace(&session_id)?;
        if let Some(path) = sandbox_path {
            self.cache.invalidate_workspace_caches(&path);
        }
        self.history.lock().remove(&session_id);
        self.execution_locks.lock().remove(&session_id);
        Ok(destroyed)
    }

    /// Analyse a session's workspace, memoised by content hash.
    pub fn analyze_codebase(&self, session_id: &str) -> Result<Analysis, DaemonError> {
        let session_id = SessionId::new(session_id);
        let session = self
            .workspaces
            .session(&session_id)
            .ok_or_else(|| DaemonError::UnknownSession(session_id.to_string()))?;

        let now = self.clock.epoch_ms();
        if let Some(hash) = &session.workspace.content_hash {
            if let Some(cached) = self.cache.analysis().get(hash, now) {
                tracing::debug!(session = %session_id, "analysis cache hit");
                self.record_action(&session_id, "analyze_codebase", "analysis (cached)", true);
                return Ok(cached);
            }
        }

        let analysis = self.analyzer.analyze(&session.workspace)?;
        if let Some(hash) = &session.workspace.content_hash {
            self.cache.analysis().put(
                hash.clone(),
                analysis.clone(),
                session.workspace.sandbox_path.clone(),
                None,
                now,
            );
            self.cache.enforce_memory_budget();
        }
        self.record_action(&session_id, "analyze_codebase", "analysis (fresh)", true);
        Ok(analysis)
    }

    /// Create a task plan for a session from a goal description.
    pub fn create_task_plan(
        &self,
        session_id: &str,
        description: &str,
    ) -> Result<sbx_core::TaskPlan, DaemonError> {
        let session_id = SessionId::new(session_id);
        let session = self
            .workspaces
            .session(&session_id)
            .ok_or_else(|| DaemonError::UnknownSession(session_id.to_string()))?;

        let analysis = self.analyze_codebase(session_id.as_str())?;
        let plan =
            self.planner
                .create_plan(description, &analysis, &session.workspace.sandbox_path)?;

        // Seed the template cache so similar future goals can reuse shapes
        self.cache.templates().put(
            plan.id.as_str().to_string(),
            plan.clone(),
            None,
            self.clock.epoch_ms(),
        );
        self.cache.enforce_memory_budget();

        self.record_action(
            &session_id,
            "create_task_plan",
            format!("planned {} tasks", plan.tasks.len()),
            true,
        );
        Ok(plan)
    }

    /// Submit a stored plan for approval.
    pub fn submit_plan_for_approval(&self, plan_id: &str) -> Result<RequestId, DaemonError> {
        let plan_id = PlanId::new(plan_id);
        let mut plan = self
            .planner
            .plan(&plan_id)
            .ok_or_else(|| DaemonError::InvalidArgument(format!("unknown plan: {}", plan_id)))?;
        let request_id = self.approval.submit_for_approval(&mut plan);
        self.planner.store_plan(plan);
        Ok(request_id)
    }

    /// Respond to an approval request and mirror the outcome on the plan.
    pub fn respond_to_approval(
        &self,
        request_id: &str,
        response: ApprovalResponse,
    ) -> Result<(), DaemonError> {
        let request_id = RequestId::new(request_id);
        let request = self.approval.respond(&request_id, response)?;
        if let Some(mut plan) = self.planner.plan(&request.plan_id) {
            ApprovalWorkflow::<C, G>::apply_response_to_plan(&request, &mut plan);
            if !request.modifications.is_empty() {
                self.approval
                    .modify_plan_based_on_feedback(&mut plan, &request.modifications);
            }
            self.planner.store_plan(plan);
        }
        Ok(())
    }

    /// Execute a stored plan inside its workspace.
    pub async fn execute_task_plan(&self, plan_id: &str) -> Result<ExecutionResult, DaemonError> {
        let plan_id = PlanId::new(plan_id);
        let mut plan = self
            .planner
            .plan(&plan_id)
            .ok_or_else(|| DaemonError::InvalidArgument(format!("unknown plan: {}", plan_id)))?;

        let session_id = self
            .workspaces
            .sessions()
            .into_iter()
            .find(|s| s.workspace.sandbox_path == plan.context.workspace_path)
            .map(|s| s.id);

        let _worker = self.resources.acquire_worker().await?;
        let _in_flight = match &session_id {
            Some(id) => Some(self.execution_lock(id).lock_owned().await),
            None => None,
        };
        let result = self.engine.execute_plan(&mut plan).await;

        match result {
            Ok(result) => {
                // Invalidate memoised results depending on files this run touched
                let changed: Vec<PathBuf> = result
                    .task_results
                    .iter()
                    .flat_map(|r| r.changes_made.iter().map(|c| c.file_path.clone()))
                    .collect();
                if !changed.is_empty() {
                    self.cache.execution().invalidate_related(&changed);
                }
                self.cache
                    .templates()
                    .record_use(plan.id.as_str(), result.success, self.clock.epoch_ms());

                if let Some(session_id) = session_id {
                    self.record_action(
                        &session_id,
                        "execute_task_plan",
                        result.summary.clone(),
                        result.success,
                    );
                }
                self.planner.store_plan(plan);
                Ok(result)
            }
            Err(err) => {
                if let Some(session_id) = session_id {
                    self.record_action(
                        &session_id,
                        "execute_task_plan",
                        err.to_string(),
                        false,
                    );
                }
                self.planner.store_plan(plan);
                Err(err.into())
            }
        }
    }

    /// Update one task's status in a stored plan and the status manager.
    pub fn update_task_status(
        &self,
        plan_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<(), DaemonError> {
        let plan_id = PlanId::new(plan_id);
        let task_id = TaskId::new(task_id);
        let mut plan = self
            .planner
            .plan(&plan_id)
            .ok_or_else(|| DaemonError::InvalidArgument(format!("unknown plan: {}", plan_id)))?;
        {
            let task = plan.task_mut(&task_id).ok_or_else(|| {
                DaemonError::InvalidArgument(format!("unknown task: {}", task_id))
            })?;
            task.status = status;
        }
        self.status
            .update_task_status(&task_id, status, None, None, None)?;
        self.planner.store_plan(plan);
        Ok(())
    }

    /// Audited actions for a session, oldest first.
    pub fn execution_history(&self, session_id: &str) -> Result<Vec<ActionRecord>, DaemonError> {
        let session_id = SessionId::new(session_id);
        if self.workspaces.session(&session_id).is_none() {
            return Err(DaemonError::UnknownSession(session_id.to_string()));
        }
        Ok(self
            .history
            .lock()
            .get(&session_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Plans similar to a stored one, via the template cache.
    pub fn similar_plans(
        &self,
        plan_id: &str,
        max_results: usize,
    ) -> Result<Vec<(String, f64)>, DaemonError> {
        let plan = self
            .planner
            .plan(&PlanId::new(plan_id))
            .ok_or_else(|| DaemonError::InvalidArgument(format!("unknown plan: {}", plan_id)))?;
        let characteristics = PlanCharacteristics::of_plan(&plan);
        Ok(self
            .cache
            .templates()
            .find_similar(&characteristics, max_results)
            .into_iter()
            .filter(|(name, _, _)| name != plan.id.as_str())
            .map(|(name, _, score)| (name, score))
            .collect())
    }

    /// One cleanup pass: reap processes, prune artifacts and orphans, sweep
    /// caches, relieve memory pressure. Never fails; problems are logged.
    pub fn cleanup_pass(&self) {
        let reaped = self.resources.cleanup_finished();
        if reaped > 0 {
            tracing::info!(reaped, "finished processes reaped");
        }

        self.prune_artifacts();

        match self.workspaces.orphaned_session_dirs() {
            Ok(orphans) => {
                for dir in orphans {
                    if let Err(err) = std::fs::remove_dir_all(&dir) {
                        tracing::warn!(dir = %dir.display(), error = %err, "orphan removal failed");
                    } else {
                        tracing::info!(dir = %dir.display(), "orphaned session dir removed");
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "orphan scan failed"),
        }

        self.connections.prune_idle(std::time::Duration::from_secs(3600));
        self.cache.cleanup_expired();
        self.cache.enforce_memory_budget();

        let budget = self.limits.max_memory_mb as usize * 1024 * 1024;
        if budget > 0 && self.cache.memory_used_bytes() * 10 > budget * 9 {
            tracing::warn!("memory above 90% after eviction, clearing caches");
            self.cache.clear_all();
        }
    }

    /// Delete artifact files older than the configured age.
    fn prune_artifacts(&self) {
        let cutoff = std::time::Duration::from_secs(self.limits.artifact_max_age_hours * 3600);
        for session in self.workspaces.sessions() {
            let artifacts = self
                .workspaces
                .sandbox_root()
                .join(session.id.as_str())
                .join("artifacts");
            let Ok(entries) = std::fs::read_dir(&artifacts) else {
                continue;
            };
            for entry in entries.flatten() {
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                let stale = metadata
                    .modified()
                    .ok()
                    .and_then(|at| at.elapsed().ok())
                    .map(|age| age > cutoff)
                    .unwrap_or(false);
                if stale {
                    let path = entry.path();
                    let result = if metadata.is_dir() {
                        std::fs::remove_dir_all(&path)
                    } else {
                        std::fs::remove_file(&path)
                    };
                    match result {
                        Ok(()) => tracing::info!(path = %path.display(), "stale artifact pruned"),
                        Err(err) => {
                            tracing::warn!(path = %path.display(), error = %err, "artifact prune failed")
                        }
                    }
                }
            }
        }
    }

    /// Destroy all sessions, terminate all processes, clear caches.
    pub async fn emergency_shutdown(&self) -> (usize, usize) {
        tracing::warn!("emergency shutdown requested");
        let destroyed = self.workspaces.destroy_all();
        let terminated = self.resources.terminate_all().await;
        self.cache.clear_all();
        (destroyed, terminated)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
