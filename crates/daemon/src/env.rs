// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Hard limits, read once at startup. Every value has an env override.
#[derive(Debug, Clone)]
pub struct Limits {
    /// `SANDBOX_MAX_MEMORY_MB` (default 512)
    pub max_memory_mb: u64,
    /// `SANDBOX_MAX_PROCESSES` (default 10)
    pub max_processes: usize,
    /// `SANDBOX_MAX_ARTIFACTS_MB` (default 100)
    pub max_artifacts_mb: u64,
    /// `SANDBOX_MAX_EXECUTION_TIME` seconds (default 300)
    pub max_execution_time_sec: u64,
    /// `SANDBOX_MAX_CACHE_SIZE` entries per partition (default 1000)
    pub max_cache_size: usize,
    /// `SANDBOX_MAX_THREADS` (default 5)
    pub max_threads: usize,
    /// `SANDBOX_MAX_SESSIONS` (default 20)
    pub max_sessions: usize,
    /// `SANDBOX_CLEANUP_INTERVAL` seconds (default 300)
    pub cleanup_interval_sec: u64,
    /// `SANDBOX_ARTIFACT_MAX_AGE` hours (default 24)
    pub artifact_max_age_hours: u64,
    /// `SANDBOX_COMMAND_TIMEOUT` seconds; `none` or `0` disables (default 300)
    pub command_timeout: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_memory_mb: 512,
            max_processes: 10,
            max_artifacts_mb: 100,
            max_execution_time_sec: 300,
            max_cache_size: 1000,
            max_threads: 5,
            max_sessions: 20,
            cleanup_interval_sec: 300,
            artifact_max_age_hours: 24,
            command_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl Limits {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_memory_mb: parse_var("SANDBOX_MAX_MEMORY_MB", defaults.max_memory_mb),
            max_processes: parse_var("SANDBOX_MAX_PROCESSES", defaults.max_processes),
            max_artifacts_mb: parse_var("SANDBOX_MAX_ARTIFACTS_MB", defaults.max_artifacts_mb),
            max_execution_time_sec: parse_var(
                "SANDBOX_MAX_EXECUTION_TIME",
                defaults.max_execution_time_sec,
            ),
            max_cache_size: parse_var("SANDBOX_MAX_CACHE_SIZE", defaults.max_cache_size),
            max_threads: parse_var("SANDBOX_MAX_THREADS", defaults.max_threads),
            max_sessions: parse_var("SANDBOX_MAX_SESSIONS", defaults.max_sessions),
            cleanup_interval_sec: parse_var(
                "SANDBOX_CLEANUP_INTERVAL",
                defaults.cleanup_interval_sec,
            ),
            artifact_max_age_hours: parse_var(
                "SANDBOX_ARTIFACT_MAX_AGE",
                defaults.artifact_max_age_hours,
            ),
            command_timeout: command_timeout(),
        }
    }
}

/// Command timeout: `none`/`0` disables, unparseable falls back to 300 s.
fn command_timeout() -> Option<Duration> {
    match std::env::var("SANDBOX_COMMAND_TIMEOUT") {
        Err(_) => Some(Duration::from_secs(300)),
        Ok(raw) => {
            let raw = raw.trim().to_lowercase();
            if raw == "none" || raw == "0" {
                return None;
            }
            Some(Duration::from_secs(raw.parse().unwrap_or(300)))
        }
    }
}

/// Resolve sandbox root: SANDBOX_ROOT > XDG_STATE_HOME/sbx > ~/.local/state/sbx
pub fn sandbox_root() -> PathBuf {
    if let Ok(dir) = std::env::var("SANDBOX_ROOT") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("sbx");
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/state/sbx"),
        Err(_) => std::env::temp_dir().join("sbx"),
    }
}

/// Daemon log file path, inside the sandbox root.
pub fn log_path() -> PathBuf {
    sandbox_root().join("daemon.log")
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
