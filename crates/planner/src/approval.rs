// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan approval workflow.
//!
//! Plans are submitted for approval, responded to with approve / reject /
//! needs-revision, and revision feedback is parsed into typed modification
//! requests. Applying modifications is non-destructive: intent is recorded
//! in plan metadata and full re-planning stays the planner's job.

use crate::error::PlannerError;
use sbx_core::{ApprovalStatus, Clock, IdGen, PlanId, PlanStatus, TaskPlan};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

sbx_core::define_id! {
    /// Unique identifier for an approval request.
    pub struct RequestId;
}

/// Typed modification parsed from revision feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationKind {
    Description,
    Duration,
    AddTask,
    RemoveTask,
    Generic,
}

impl fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModificationKind::Description => write!(f, "description"),
            ModificationKind::Duration => write!(f, "duration"),
            ModificationKind::AddTask => write!(f, "add_task"),
            ModificationKind::RemoveTask => write!(f, "remove_task"),
            ModificationKind::Generic => write!(f, "generic"),
        }
    }
}

/// A parsed modification request against a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationRequest {
    pub id: String,
    pub plan_id: PlanId,
    pub kind: ModificationKind,
    /// The raw feedback line the kind was parsed from
    pub reason: String,
}

/// A pending or resolved approval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub plan_id: PlanId,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub requested_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at_ms: Option<u64>,
    #[serde(default)]
    pub modifications: Vec<ModificationRequest>,
}

/// A response to an approval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Freeform modification descriptions, parsed on needs-revision
    #[serde(default)]
    pub modifications: Vec<String>,
}

/// Compact view of a request for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub request_id: RequestId,
    pub plan_id: PlanId,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub modification_count: usize,
    pub requested_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at_ms: Option<u64>,
}

/// Observer for approval lifecycle events. Called synchronously under the
/// workflow lock; panics are isolated.
pub trait ApprovalListener: Send + Sync {
    fn on_submitted(&self, _request: &ApprovalRequest) {}
    fn on_responded(&self, _request: &ApprovalRequest, _response: &ApprovalResponse) {}
}

struct Inner {
    requests: HashMap<RequestId, ApprovalRequest>,
    history: HashMap<RequestId, Vec<ApprovalResponse>>,
    modifications: HashMap<PlanId, Vec<ModificationRequest>>,
    listeners: Vec<(usize, Arc<dyn ApprovalListener>)>,
    next_listener_id: usize,
}

/// Manages approval requests for task plans.
pub struct ApprovalWorkflow<C: Clock, G: IdGen> {
    clock: C,
    id_gen: G,
    inner: Mutex<Inner>,
}

impl<C: Clock, G: IdGen> ApprovalWorkflow<C, G> {
    pub fn new(clock: C, id_gen: G) -> Self {
        Self {
            clock,
            id_gen,
            inner: Mutex::new(Inner {
                requests: HashMap::new(),
                history: HashMap::new(),
                modifications: HashMap::new(),
                listeners: Vec::new(),
                next_listener_id: 0,
            }),
        }
    }

    /// Submit a plan for approval; the plan transitions to pending.
    pub fn submit_for_approval(&self, plan: &mut TaskPlan) -> RequestId {
        plan.status = PlanStatus::PendingApproval;
        plan.approval_status = ApprovalStatus::Pending;

        let request = ApprovalRequest {
            id: RequestId::new(self.id_gen.next()),
            plan_id: plan.id.clone(),
            status: ApprovalStatus::Pending,
            feedback: None,
            requested_at_ms: self.clock.epoch_ms(),
            resolved_at_ms: None,
            modifications: Vec::new(),
        };
        let id = request.id.clone();

        let mut inner = self.inner.lock();
        inner.requests.insert(id.clone(), request.clone());
        notify(&inner.listeners, |l| l.on_submitted(&request));
        tracing::info!(request = %id, plan = %plan.id, "plan submitted for approval");
        id
    }

    /// Record a response, parsing revision modifications when requested.
    pub fn respond(
        &self,
        request_id: &RequestId,
        response: ApprovalResponse,
    ) -> Result<ApprovalRequest, PlannerError> {
        let mut inner = self.inner.lock();
        let request = inner
            .requests
            .get_mut(request_id)
            .ok_or_else(|| PlannerError::UnknownRequest(request_id.to_string()))?;

        request.status = response.status;
        request.feedback = response.feedback.clone();
        request.resolved_at_ms = Some(self.clock.epoch_ms());

        if response.status == ApprovalStatus::NeedsRevision {
            let plan_id = request.plan_id.clone();
            let parsed: Vec<ModificationRequest> = response
                .modifications
                .iter()
                .map(|description| parse_modification(&self.id_gen, &plan_id, description))
                .collect();
            request.modifications = parsed.clone();
            inner
                .modifications
                .entry(plan_id)
                .or_default()
                .extend(parsed);
        }

        let updated = inner
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| PlannerError::UnknownRequest(request_id.to_string()))?;
        inner
            .history
            .entry(request_id.clone())
            .or_default()
            .push(response.clone());
        notify(&inner.listeners, |l| l.on_responded(&updated, &response));
        tracing::info!(request = %request_id, status = %updated.status, "approval response recorded");
        Ok(updated)
    }

    /// Mirror a resolved request's status onto the plan.
    pub fn apply_response_to_plan(request: &ApprovalRequest, plan: &mut TaskPlan) {
        plan.approval_status = request.status;
        plan.status = match request.status {
            ApprovalStatus::Approved => PlanStatus::Approved,
            ApprovalStatus::Rejected => PlanStatus::Failed,
            ApprovalStatus::Pending | ApprovalStatus::NeedsRevision => PlanStatus::PendingApproval,
        };
    }

    /// Record modification intent in plan metadata. Non-destructive: the
    /// planner re-plans from this on the next revision cycle.
    pub fn modify_plan_based_on_feedback(
        &self,
        plan: &mut TaskPlan,
        modifications: &[ModificationRequest],
    ) {
        for modification in modifications {
            let key = match modification.kind {
                ModificationKind::Description => "pending_description_change",
                ModificationKind::Duration => "pending_duration_change",
                ModificationKind::AddTask => "pending_task_addition",
                ModificationKind::RemoveTask => "pending_task_removal",
                ModificationKind::Generic => "pending_modification",
            };
            plan.metadata
                .insert(key.to_string(), modification.reason.clone());
        }
    }

    pub fn request(&self, request_id: &RequestId) -> Option<ApprovalRequest> {
        self.inner.lock().requests.get(request_id).cloned()
    }

    /// Requests still awaiting a response, oldest first.
    pub fn pending_approvals(&self) -> Vec<ApprovalRequest> {
        let inner = self.inner.lock();
        let mut pending: Vec<ApprovalRequest> = inner
            .requests
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.requested_at_ms);
        pending
    }

    pub fn approval_history(&self, request_id: &RequestId) -> Vec<ApprovalResponse> {
        self.inner
            .lock()
            .history
            .get(request_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn plan_modifications(&self, plan_id: &PlanId) -> Vec<ModificationRequest> {
        self.inner
            .lock()
            .modifications
            .get(plan_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn approval_summary(
        &self,
        request_id: &RequestId,
    ) -> Result<ApprovalSummary, PlannerError> {
        let inner = self.inner.lock();
        let request = inner
            .requests
            .get(request_id)
            .ok_or_else(|| PlannerError::UnknownRequest(request_id.to_string()))?;
        Ok(ApprovalSummary {
            request_id: request.id.clone(),
            plan_id: request.plan_id.clone(),
            status: request.status,
            feedback: request.feedback.clone(),
            modification_count: request.modifications.len(),
            requested_at_ms: request.requested_at_ms,
            resolved_at_ms: request.resolved_at_ms,
        })
    }

    /// Register a listener; returns a token for removal.
    pub fn add_listener(&self, listener: Arc<dyn ApprovalListener>) -> usize {
        let mut inner = self.inner.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&self, token: usize) {
        self.inner.lock().listeners.retain(|(id, _)| *id != token);
    }
}

fn notify<F>(listeners: &[(usize, Arc<dyn ApprovalListener>)], call: F)
where
    F: Fn(&dyn ApprovalListener),
{
    for (listener_id, listener) in listeners {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            call(listener.as_ref())
        }));
        if result.is_err() {
            tracing::warn!(listener = *listener_id, "approval listener panicked");
        }
    }
}

/// Parse a freeform modification description into a typed request.
fn parse_modification<G: IdGen>(
    id_gen: &G,
    plan_id: &PlanId,
    description: &str,
) -> ModificationRequest {
    let desc = description.to_lowercase();
    let kind = if desc.contains("change description") || desc.contains("modify description") {
        ModificationKind::Description
    } else if desc.contains("change duration") || desc.contains("modify duration") {
        ModificationKind::Duration
    } else if desc.contains("add task") {
        ModificationKind::AddTask
    } else if desc.contains("remove task") {
        ModificationKind::RemoveTask
    } else {
        ModificationKind::Generic
    };
    ModificationRequest {
        id: id_gen.next(),
        plan_id: plan_id.clone(),
        kind,
        reason: description.to_string(),
    }
}

#[cfg(test)]
#[path = "approval_tests.rs"]
mod tests;
