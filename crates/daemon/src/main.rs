// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Intelligent Sandbox Daemon (sbxd)
//!
//! Hosts the sandbox service: workspace lifecycle, planning, execution,
//! caching, and resource governance. The tool transport is supplied by the
//! embedding process; this binary owns the service lifetime, logging, the
//! cleanup scheduler, and signal handling.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use sbx_core::{SystemClock, UuidIdGen};
use sbx_daemon::{env, spawn_cleanup_scheduler, Limits, SandboxService};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("sbxd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("sbxd {}", env!("CARGO_PKG_VERSION"));
                println!("Intelligent Sandbox Daemon - hosts the sandbox tool service");
                println!();
                println!("USAGE:");
                println!("    sbxd");
                println!();
                println!("Configuration is read from SANDBOX_* environment variables;");
                println!("see the crate documentation for the full list.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: sbxd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let limits = Limits::from_env();
    let sandbox_root = env::sandbox_root();
    std::fs::create_dir_all(&sandbox_root)?;

    rotate_log_if_needed(&env::log_path());
    let _log_guard = setup_logging()?;

    info!(root = %sandbox_root.display(), "starting sandbox daemon");

    let service = Arc::new(SandboxService::new(
        limits,
        sandbox_root,
        SystemClock,
        UuidIdGen,
    ));

    let shutdown = Arc::new(Notify::new());
    let scheduler = spawn_cleanup_scheduler(Arc::clone(&service), Arc::clone(&shutdown));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("daemon ready");
    // Signal ready for parent process (transport embedding, service manager)
    println!("READY");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    shutdown.notify_waiters();
    let _ = scheduler.await;

    let (sessions, processes) = service.emergency_shutdown().await;
    info!(sessions, processes, "daemon stopped");
    Ok(())
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` -> `daemon.log.1` -> `daemon.log.2` -> `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = env::log_path();
    let Some(parent) = log_path.parent() else {
        return Err("log path has no parent directory".into());
    };
    std::fs::create_dir_all(parent)?;

    let file_appender = tracing_appender::rolling::never(
        parent,
        log_path
            .file_name()
            .ok_or("log path has no file name")?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
