// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now", as epoch seconds, for every time-dependent component in
/// the core (the idle sweep, the thermo staleness sweep, the scheduler).
/// Injectable so tests can drive these components without real sleeps,
/// mirroring the mock-clock pattern this codebase's telemetry worker
/// scheduler already uses.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> u64;
}

/// The real clock, backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A clock tests can set and advance directly.
#[derive(Debug, Default)]
pub struct MockClock {
    secs: AtomicU64,
}

impl MockClock {
    pub fn new(start_secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(start_secs),
        }
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_secs: u64) {
        self.secs.fetch_add(delta_secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_epoch_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}
