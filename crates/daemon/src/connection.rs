// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection tracking and rate limiting.
//!
//! Each connection keeps a sliding window of request instants trimmed to
//! the last 60 seconds plus an hourly counter rolled every 3600 seconds.
//! Connection caps (total, per IP, allow/deny lists) gate registration;
//! rate limits gate every request.

use crate::error::DaemonError;
use sbx_core::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const MINUTE_WINDOW: Duration = Duration::from_secs(60);
const HOUR_WINDOW: Duration = Duration::from_secs(3600);

/// Rate limit settings, adjustable at runtime via the tool surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests_per_minute: usize,
    pub max_requests_per_hour: usize,
    /// Optional burst ceiling inside `burst_window_secs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_limit: Option<usize>,
    #[serde(default = "default_burst_window")]
    pub burst_window_secs: u64,
}

fn default_burst_window() -> u64 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 60,
            max_requests_per_hour: 1000,
            burst_limit: None,
            burst_window_secs: default_burst_window(),
        }
    }
}

/// Connection cap settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionLimitConfig {
    pub max_concurrent_connections: usize,
    pub max_connections_per_ip: usize,
    /// When non-empty, only these IPs may register
    #[serde(default)]
    pub ip_allowlist: Vec<String>,
    #[serde(default)]
    pub ip_denylist: Vec<String>,
}

impl Default for ConnectionLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent_connections: 50,
            max_connections_per_ip: 5,
            ip_allowlist: Vec::new(),
            ip_denylist: Vec::new(),
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the caller regains budget; 0 when allowed
    pub retry_after_secs: f64,
}

struct ConnectionState {
    remote_ip: String,
    established_at: Instant,
    /// Request instants within the last minute, oldest first
    recent_requests: VecDeque<Instant>,
    hourly_count: usize,
    hour_started_at: Instant,
    last_seen: Instant,
}

/// Aggregate connection statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub active_connections: usize,
    pub max_concurrent_connections: usize,
    pub unique_ips: usize,
    pub total_requests: u64,
    pub rate_limits: RateLimitConfig,
    pub connection_limits: ConnectionLimitConfig,
}

struct Inner {
    connections: HashMap<String, ConnectionState>,
    rate_limits: RateLimitConfig,
    connection_limits: ConnectionLimitConfig,
    total_requests: u64,
}

/// Tracks connections and enforces rate limits and caps.
pub struct ConnectionManager<C: Clock> {
    clock: C,
    inner: Mutex<Inner>,
}

impl<C: Clock> ConnectionManager<C> {
    pub fn new(clock: C, rate_limits: RateLimitConfig, connection_limits: ConnectionLimitConfig) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner {
                connections: HashMap::new(),
                rate_limits,
                connection_limits,
                total_requests: 0,
            }),
        }
    }

    /// Register a connection, enforcing caps and IP lists.
    pub fn register_connection(
        &self,
        connection_id: &str,
        remote_ip: &str,
    ) -> Result<(), DaemonError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if !inner.connection_limits.ip_denylist.is_empty()
            && inner.connection_limits.ip_denylist.iter().any(|ip| ip == remote_ip)
        {
            return Err(DaemonError::ConnectionRefused(format!(
                "ip {} is denied",
                remote_ip
            )));
        }
        if !inner.connection_limits.ip_allowlist.is_empty()
            && !inner.connection_limits.ip_allowlist.iter().any(|ip| ip == remote_ip)
        {
            return Err(DaemonError::ConnectionRefused(format!(
                "ip {} is not allowed",
                remote_ip
            )));
        }
        if inner.connections.len() >= inner.connection_limits.max_concurrent_connections {
            return Err(DaemonError::ResourceExhausted(format!(
                "connection cap reached ({})",
                inner.connection_limits.max_concurrent_connections
            )));
        }
        let per_ip = inner
            .connections
            .values()
            .filter(|c| c.remote_ip == remote_ip)
            .count();
        if per_ip >= inner.connection_limits.max_connections_per_ip {
            return Err(DaemonError::RateLimited {
                retry_after_secs: 60.0,
            });
        }

        inner.connections.insert(
            connection_id.to_string(),
            ConnectionState {
                remote_ip: remote_ip.to_string(),
                established_at: now,
                recent_requests: VecDeque::new(),
                hourly_count: 0,
                hour_started_at: now,
                last_seen: now,
            },
        );
        tracing::debug!(connection = connection_id, ip = remote_ip, "connection registered");
        Ok(())
    }

    pub fn unregister_connection(&self, connection_id: &str) -> bool {
        self.inner.lock().connections.remove(connection_id).is_some()
    }

    /// Check and account one request for a connection.
    ///
    /// Unknown connections are registered on the fly with an unknown IP so
    /// embedded callers need no explicit handshake.
    pub fn check_rate_limit(&self, connection_id: &str) -> RateDecision {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let limits = inner.rate_limits.clone();

        let connection = inner
            .connections
            .entry(connection_id.to_string())
            .or_insert_with(|| ConnectionState {
                remote_ip: "unknown".to_string(),
                established_at: now,
                recent_requests: VecDeque::new(),
                hourly_count: 0,
                hour_started_at: now,
                last_seen: now,
            });
        connection.last_seen = now;

        // Trim the sliding minute window
        while let Some(&front) = connection.recent_requests.front() {
            if now.duration_since(front) >= MINUTE_WINDOW {
                connection.recent_requests.pop_front();
            } else {
                break;
            }
        }

        // Roll the hourly counter
        if now.duration_since(connection.hour_started_at) >= HOUR_WINDOW {
            connection.hourly_count = 0;
            connection.hour_started_at = now;
        }

        if connection.recent_requests.len() >= limits.max_requests_per_minute {
            let oldest = connection.recent_requests.front().copied().unwrap_or(now);
            let retry_after =
                MINUTE_WINDOW.as_secs_f64() - now.duration_since(oldest).as_secs_f64();
            return RateDecision {
                allowed: false,
                retry_after_secs: retry_after.max(0.0),
            };
        }

        if connection.hourly_count >= limits.max_requests_per_hour {
            let retry_after = HOUR_WINDOW.as_secs_f64()
                - now.duration_since(connection.hour_started_at).as_secs_f64();
            return RateDecision {
                allowed: false,
                retry_after_secs: retry_after.max(0.0),
            };
        }

        if let Some(burst_limit) = limits.burst_limit {
            let burst_window = Duration::from_secs(limits.burst_window_secs);
            let burst_count = connection
                .recent_requests
                .iter()
                .filter(|&&at| now.duration_since(at) < burst_window)
                .count();
            if burst_count >= burst_limit {
                let oldest_in_burst = connection
                    .recent_requests
                    .iter()
                    .find(|&&at| now.duration_since(at) < burst_window)
                    .copied()
                    .unwrap_or(now);
                let retry_after = burst_window.as_secs_f64()
                    - now.duration_since(oldest_in_burst).as_secs_f64();
                return RateDecision {
                    allowed: false,
                    retry_after_secs: retry_after.max(0.0),
                };
            }
        }

        connection.recent_requests.push_back(now);
        connection.hourly_count += 1;
        inner.total_requests += 1;
        RateDecision {
            allowed: true,
            retry_after_secs: 0.0,
        }
    }

    /// Drop connections idle longer than `max_idle`.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let before = inner.connections.len();
        inner
            .connections
            .retain(|_, c| now.duration_since(c.last_seen) < max_idle);
        before - inner.connections.len()
    }

    pub fn configure_rate_limits(&self, config: RateLimitConfig) {
        self.inner.lock().rate_limits = config;
    }

    pub fn configure_connection_limits(&self, config: ConnectionLimitConfig) {
        self.inner.lock().connection_limits = config;
    }

    pub fn rate_limits(&self) -> RateLimitConfig {
        self.inner.lock().rate_limits.clone()
    }

    pub fn stats(&self) -> ConnectionStats {
        let inner = self.inner.lock();
        let unique_ips = inner
            .connections
            .values()
            .map(|c| c.remote_ip.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        ConnectionStats {
            active_connections: inner.connections.len(),
            max_concurrent_connections: inner.connection_limits.max_concurrent_connections,
            unique_ips,
            total_requests: inner.total_requests,
            rate_limits: inner.rate_limits.clone(),
            connection_limits: inner.connection_limits.clone(),
        }
    }

    /// Uptime of one connection, for diagnostics.
    pub fn connection_age(&self, connection_id: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.inner
            .lock()
            .connections
            .get(connection_id)
            .map(|c| now.duration_since(c.established_at))
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
