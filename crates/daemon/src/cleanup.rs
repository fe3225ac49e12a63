// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background cleanup scheduler.
//!
//! Runs a cleanup pass on a fixed interval until shut down. Pass failures
//! are logged and swallowed; the scheduler never crashes the process.

use crate::service::SandboxService;
use sbx_core::{Clock, IdGen};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Spawn the periodic cleanup task. Signal `shutdown` to stop it.
pub fn spawn_cleanup_scheduler<C: Clock + 'static, G: IdGen + 'static>(
    service: Arc<SandboxService<C, G>>,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(service.limits().cleanup_interval_sec.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh daemon does
        // not clean before anything exists.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let service = Arc::clone(&service);
                    // Isolate pass panics so the scheduler survives
                    let pass = tokio::task::spawn_blocking(move || service.cleanup_pass());
                    if let Err(err) = pass.await {
                        tracing::error!(error = %err, "cleanup pass panicked");
                    }
                }
                _ = shutdown.notified() => {
                    tracing::info!("cleanup scheduler stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
