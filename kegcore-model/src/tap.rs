// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// An immutable, configured fluid path: a meter name, its tick-to-volume
/// conversion factor, and the relay that controls it.
///
/// Taps are value types. Structural equality is used by `TapManager` to
/// decide whether a synced tap descriptor actually changed anything (a
/// no-op sync should not cause a replace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tap {
    pub name: String,
    pub ml_per_tick: f64,
    pub relay_name: Option<String>,
}

impl Tap {
    pub fn new(name: impl Into<String>, ml_per_tick: f64, relay_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            ml_per_tick,
            relay_name,
        }
    }

    /// Converts a tick count to milliliters at this tap's conversion factor.
    pub fn ticks_to_milliliters(&self, ticks: u64) -> f64 {
        self.ml_per_tick * ticks as f64
    }
}
