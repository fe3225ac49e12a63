// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstractions for testable time.
//!
//! Rate-limit windows, cache TTLs, and retry backoff all read time through
//! the [`Clock`] trait so tests can advance a [`FakeClock`] instead of
//! sleeping.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time.
pub trait Clock: Clone + Send + Sync {
    /// Monotonic instant, for measuring elapsed time.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;
}

/// System clock for production use
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Controllable clock for tests.
///
/// Both the monotonic instant and the epoch time advance together via
/// [`FakeClock::advance`]. Clones share the same underlying offset.
#[derive(Clone)]
pub struct FakeClock {
    base_instant: Instant,
    base_epoch_ms: u64,
    offset: Arc<Mutex<Duration>>,
}

impl FakeClock {
    pub fn new(base_epoch_ms: u64) -> Self {
        Self {
            base_instant: Instant::now(),
            base_epoch_ms,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset += by;
    }

    /// Move the clock forward by whole milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(1_700_000_000_000)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base_instant + *self.offset.lock()
    }

    fn epoch_ms(&self) -> u64 {
        self.base_epoch_ms + self.offset.lock().as_millis() as u64
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
