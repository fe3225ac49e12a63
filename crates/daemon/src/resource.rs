// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource governance: process registry, bounded worker pool, hard limits.
//!
//! Spawned subprocesses register here so teardown can terminate them
//! gracefully (SIGTERM, a grace period, then SIGKILL). The worker pool is a
//! semaphore bounding concurrent tool work.

use crate::env::Limits;
use crate::error::DaemonError;
use sbx_core::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Grace period between SIGTERM and SIGKILL.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// One tracked subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub description: String,
    pub registered_at_ms: u64,
}

/// Point-in-time resource statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    pub processes: usize,
    pub max_processes: usize,
    pub available_workers: usize,
    pub max_threads: usize,
    pub memory_used_mb: f64,
    pub max_memory_mb: u64,
    pub sessions: usize,
    pub max_sessions: usize,
}

/// Tracks subprocesses and enforces hard limits.
pub struct ResourceManager<C: Clock> {
    limits: Limits,
    clock: C,
    processes: Mutex<HashMap<u32, ProcessRecord>>,
    pool: Arc<Semaphore>,
}

impl<C: Clock> ResourceManager<C> {
    pub fn new(limits: Limits, clock: C) -> Self {
        let pool = Arc::new(Semaphore::new(limits.max_threads.max(1)));
        Self {
            limits,
            clock,
            processes: Mutex::new(HashMap::new()),
            pool,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Acquire a worker slot from the bounded pool.
    pub async fn acquire_worker(&self) -> Result<OwnedSemaphorePermit, DaemonError> {
        Arc::clone(&self.pool)
            .acquire_owned()
            .await
            .map_err(|_| DaemonError::ResourceExhausted("worker pool closed".to_string()))
    }

    /// Register a spawned subprocess. Fails when the process cap is hit.
    pub fn register_process(
        &self,
        pid: u32,
        description: impl Into<String>,
    ) -> Result<(), DaemonError> {
        let mut processes = self.processes.lock();
        if processes.len() >= self.limits.max_processes {
            return Err(DaemonError::ResourceExhausted(format!(
                "process cap reached ({})",
                self.limits.max_processes
            )));
        }
        processes.insert(
            pid,
            ProcessRecord {
                pid,
                description: description.into(),
                registered_at_ms: self.clock.epoch_ms(),
            },
        );
        Ok(())
    }

    pub fn unregister_process(&self, pid: u32) {
        self.processes.lock().remove(&pid);
    }

    pub fn processes(&self) -> Vec<ProcessRecord> {
        let mut records: Vec<ProcessRecord> = self.processes.lock().values().cloned().collect();
        records.sort_by_key(|r| r.pid);
        records
    }

    /// Drop registry entries whose process has exited.
    pub fn cleanup_finished(&self) -> usize {
        let mut processes = self.processes.lock();
        let before = processes.len();
        processes.retain(|&pid, _| process_alive(pid));
        before - processes.len()
    }

    /// Terminate every registered process: SIGTERM, wait the grace period,
    /// SIGKILL whatever is left. Returns how many were signalled.
    pub async fn terminate_all(&self) -> usize {
        let pids: Vec<u32> = self.processes.lock().keys().copied().collect();
        if pids.is_empty() {
            return 0;
        }

        for &pid in &pids {
            send_sigterm(pid);
        }
        tokio::time::sleep(TERMINATION_GRACE).await;
        for &pid in &pids {
            if process_alive(pid) {
                tracing::warn!(pid, "process survived SIGTERM, killing");
                send_sigkill(pid);
            }
        }
        self.processes.lock().clear();
        pids.len()
    }

    /// Enforce the hard limits checked at session creation and process
    /// registration.
    pub fn check_resource_limits(
        &self,
        sessions: usize,
        memory_used_bytes: usize,
    ) -> Result<(), DaemonError> {
        if sessions >= self.limits.max_sessions {
            return Err(DaemonError::ResourceExhausted(format!(
                "session cap reached ({})",
                self.limits.max_sessions
            )));
        }
        let memory_mb = memory_used_bytes as u64 / (1024 * 1024);
        if memory_mb >= self.limits.max_memory_mb {
            return Err(DaemonError::ResourceExhausted(format!(
                "memory cap reached ({} MB of {} MB)",
                memory_mb, self.limits.max_memory_mb
            )));
        }
        if self.processes.lock().len() >= self.limits.max_processes {
            return Err(DaemonError::ResourceExhausted(format!(
                "process cap reached ({})",
                self.limits.max_processes
            )));
        }
        Ok(())
    }

    pub fn stats(&self, sessions: usize, memory_used_bytes: usize) -> ResourceStats {
        ResourceStats {
            processes: self.processes.lock().len(),
            max_processes: self.limits.max_processes,
            available_workers: self.pool.available_permits(),
            max_threads: self.limits.max_threads,
            memory_used_mb: memory_used_bytes as f64 / (1024.0 * 1024.0),
            max_memory_mb: self.limits.max_memory_mb,
            sessions,
            max_sessions: self.limits.max_sessions,
        }
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}

#[cfg(unix)]
fn send_sigkill(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn send_sigkill(_pid: u32) {}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
