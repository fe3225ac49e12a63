// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool surface.
//!
//! Named tools over JSON argument maps, dispatched into the service. Every
//! call is rate-limit gated and returns a structured status object; errors
//! are encoded in the response, never raised across the boundary.

use crate::error::DaemonError;
use crate::service::SandboxService;
use sbx_core::{Clock, IdGen, TaskStatus};
use sbx_planner::ApprovalResponse;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Stable tool names exposed by the service.
pub const TOOL_NAMES: &[&str] = &[
    "create_workspace",
    "destroy_workspace",
    "analyze_codebase",
    "create_task_plan",
    "submit_plan_for_approval",
    "approve_plan",
    "reject_plan",
    "request_plan_revision",
    "execute_task_plan",
    "update_task_status",
    "get_execution_history",
    "get_resource_stats",
    "get_connection_stats",
    "configure_rate_limits",
    "configure_connection_limits",
    "emergency_cleanup",
];

/// One inbound tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub connection_id: String,
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

fn ok(mut body: Value) -> Value {
    if let Some(object) = body.as_object_mut() {
        object.insert("success".to_string(), Value::Bool(true));
    }
    body
}

fn fail(err: &DaemonError) -> Value {
    let mut body = json!({
        "success": false,
        "error": { "kind": err.kind().to_string() },
        "message": err.to_string(),
    });
    if let Some(retry_after) = err.retry_after_secs() {
        if let Some(object) = body.as_object_mut() {
            object.insert("retry_after".to_string(), json!(retry_after));
        }
    }
    body
}

fn arg_str(args: &Value, key: &str) -> Result<String, DaemonError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DaemonError::InvalidArgument(format!("missing argument: {}", key)))
}

fn arg_opt_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_status(raw: &str) -> Result<TaskStatus, DaemonError> {
    match raw {
        "not_started" => Ok(TaskStatus::NotStarted),
        "in_progress" => Ok(TaskStatus::InProgress),
        "completed" => Ok(TaskStatus::Completed),
        "error" => Ok(TaskStatus::Error),
        other => Err(DaemonError::InvalidArgument(format!(
            "unknown task status: {}",
            other
        ))),
    }
}

/// Dispatch one tool call. Rate limiting happens before the tool runs;
/// every outcome is a structured JSON object.
pub async fn dispatch<C: Clock + 'static, G: IdGen>(
    service: &SandboxService<C, G>,
    request: ToolRequest,
) -> Value {
    let decision = service.connections().check_rate_limit(&request.connection_id);
    if !decision.allowed {
        return fail(&DaemonError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let span = tracing::info_span!("tool", tool = %request.tool, connection = %request.connection_id);
    let _guard = span.enter();

    match run_tool(service, &request).await {
        Ok(body) => ok(body),
        Err(err) => {
            tracing::warn!(tool = %request.tool, error = %err, "tool call failed");
            fail(&err)
        }
    }
}

async fn run_tool<C: Clock + 'static, G: IdGen>(
    service: &SandboxService<C, G>,
    request: &ToolRequest,
) -> Result<Value, DaemonError> {
    let args = &request.args;
    match request.tool.as_str() {
        "create_workspace" => {
            let source_path = arg_str(args, "source_path")?;
            let workspace_id = arg_opt_str(args, "workspace_id");
            let session = service.create_workspace(&source_path, workspace_id)?;
            Ok(json!({
                "workspace_id": session.id.as_str(),
                "sandbox_path": session.workspace.sandbox_path,
                "isolation_enabled": session.workspace.isolation.enabled,
            }))
        }

        "destroy_workspace" => {
            let workspace_id = arg_str(args, "workspace_id")?;
            let destroyed = service.destroy_workspace(&workspace_id).await?;
            Ok(json!({ "destroyed": destroyed }))
        }

        "analyze_codebase" => {
            let workspace_id = arg_str(args, "workspace_id")?;
            let analysis = service.analyze_codebase(&workspace_id)?;
            Ok(json!({
                "languages": analysis.languages,
                "frameworks": analysis.frameworks,
                "dependencies_count": analysis.dependencies.list.len(),
                "files_count": analysis.files_count(),
                "lines_of_code": analysis.metrics.lines_of_code,
                "summary": analysis.summary,
            }))
        }

        "create_task_plan" => {
            let workspace_id = arg_str(args, "workspace_id")?;
            let description = arg_str(args, "description")?;
            let plan = service.create_task_plan(&workspace_id, &description)?;
            let tasks: Vec<Value> = plan
                .tasks
                .iter()
                .map(|task| {
                    json!({
                        "id": task.id.as_str(),
                        "description": task.description,
                        "status": task.status.to_string(),
                        "dependencies": task
                            .dependencies
                            .iter()
                            .map(|d| d.as_str())
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            Ok(json!({
                "plan_id": plan.id.as_str(),
                "tasks_count": plan.tasks.len(),
                "tasks": tasks,
            }))
        }

        "submit_plan_for_approval" => {
            let plan_id = arg_str(args, "plan_id")?;
            let request_id = service.submit_plan_for_approval(&plan_id)?;
            Ok(json!({ "request_id": request_id.as_str() }))
        }

        "approve_plan" | "reject_plan" | "request_plan_revision" => {
            let request_id = arg_str(args, "request_id")?;
            let feedback = arg_opt_str(args, "feedback");
            let modifications: Vec<String> = args
                .get("modifications")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let status = match request.tool.as_str() {
                "approve_plan" => sbx_core::ApprovalStatus::Approved,
                "reject_plan" => sbx_core::ApprovalStatus::Rejected,
                _ => sbx_core::ApprovalStatus::NeedsRevision,
            };
            service.respond_to_approval(
                &request_id,
                ApprovalResponse {
                    status,
                    feedback,
                    modifications,
                },
            )?;
            Ok(json!({}))
        }

        "execute_task_plan" => {
            let plan_id = arg_str(args, "plan_id")?;
            let result = service.execute_task_plan(&plan_id).await?;
            Ok(json!({
                "tasks_completed": result.tasks_completed,
                "tasks_failed": result.tasks_failed,
                "total_duration": result.total_duration,
                // Legacy name some callers expect; same value as total_duration
                "execution_time": result.total_duration,
                "success_rate": result.success_rate,
                "summary": result.summary,
            }))
        }

        "update_task_status" => {
            let plan_id = arg_str(args, "plan_id")?;
            let task_id = arg_str(args, "task_id")?;
            let status = parse_status(&arg_str(args, "status")?)?;
            service.update_task_status(&plan_id, &task_id, status)?;
            Ok(json!({}))
        }

        "get_execution_history" => {
            let workspace_id = arg_str(args, "workspace_id")?;
            let history = service.execution_history(&workspace_id)?;
            let recent: Vec<Value> = history
                .iter()
                .rev()
                .take(20)
                .map(|record| {
                    json!({
                        "action_type": record.action_type,
                        "description": record.description,
                        "timestamp": record.at_epoch_ms,
                        "success": record.success,
                    })
                })
                .collect();
            Ok(json!({
                "total_actions": history.len(),
                "recent_actions": recent,
            }))
        }

        "get_resource_stats" => {
            let stats = service.resources().stats(
                service.workspaces().session_count(),
                service.cache().memory_used_bytes(),
            );
            let cache_health = service.cache().health();
            Ok(json!({
                "resources": stats,
                "cache": {
                    "status": cache_health.status.to_string(),
                    "memory_percent": cache_health.memory_percent,
                    "hit_rate": cache_health.hit_rate,
                    "issues": cache_health.issues,
                    "partitions": service.cache().stats(),
                },
            }))
        }

        "get_connection_stats" => {
            let stats = service.connections().stats();
            Ok(serde_json::to_value(&stats)
                .map_err(|e| DaemonError::InvalidArgument(e.to_string()))?)
        }

        "configure_rate_limits" => {
            let mut config = service.connections().rate_limits();
            if let Some(limit) = args.get("max_requests_per_minute").and_then(Value::as_u64) {
                config.max_requests_per_minute = limit as usize;
            }
            if let Some(limit) = args.get("max_requests_per_hour").and_then(Value::as_u64) {
                config.max_requests_per_hour = limit as usize;
            }
            if let Some(limit) = args.get("burst_limit").and_then(Value::as_u64) {
                config.burst_limit = Some(limit as usize);
            }
            service.connections().configure_rate_limits(config.clone());
            Ok(json!({ "rate_limits": config }))
        }

        "configure_connection_limits" => {
            let stats = service.connections().stats();
            let mut config = stats.connection_limits;
            if let Some(limit) = args
                .get("max_concurrent_connections")
                .and_then(Value::as_u64)
            {
                config.max_concurrent_connections = limit as usize;
            }
            if let Some(limit) = args.get("max_connections_per_ip").and_then(Value::as_u64) {
                config.max_connections_per_ip = limit as usize;
            }
            service
                .connections()
                .configure_connection_limits(config.clone());
            Ok(json!({ "connection_limits": config }))
        }

        "emergency_cleanup" => {
            let (sessions_destroyed, processes_terminated) = service.emergency_shutdown().await;
            Ok(json!({
                "sessions_destroyed": sessions_destroyed,
                "processes_terminated": processes_terminated,
            }))
        }

        other => Err(DaemonError::UnknownTool(other.to_string())),
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
