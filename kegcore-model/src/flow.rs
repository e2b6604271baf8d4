// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::Tap;

/// Lifecycle state of a [`Flow`].
///
/// `Idle` is transient: a flow observed idle during a heartbeat sweep is
/// moved straight through to `Completed` in the same tick, but the state
/// still exists so the sweep can publish one `FlowUpdate(Idle)` before the
/// terminal update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowState {
    Active,
    Idle,
    Completed,
}

/// A live, in-memory aggregate of contiguous ticks on one meter between a
/// start and a stop, optionally bound to an authenticated user.
///
/// At most one `Flow` per meter is ever in `Active` or `Idle` state; this
/// invariant is enforced by `FlowManager`, not by `Flow` itself, because it
/// depends on the registry the manager owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub flow_id: u64,
    pub meter_name: String,
    pub bound_username: Option<String>,
    pub max_idle_secs: u64,
    pub state: FlowState,
    pub start_time: u64,
    pub last_activity_time: u64,
    pub total_ticks: u64,
    pub volume_ml: Option<f64>,
}

impl Flow {
    pub fn new(
        flow_id: u64,
        meter_name: impl Into<String>,
        bound_username: Option<String>,
        max_idle_secs: u64,
        when: u64,
    ) -> Self {
        Self {
            flow_id,
            meter_name: meter_name.into(),
            bound_username,
            max_idle_secs,
            state: FlowState::Active,
            start_time: when,
            last_activity_time: when,
            total_ticks: 0,
            volume_ml: None,
        }
    }

    pub fn has_username(&self) -> bool {
        self.bound_username.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Applies `amount` ticks observed at `when`, recomputing volume from
    /// `tap` if one is known for this meter. `tap` may be absent if the
    /// backend has not yet synced a descriptor for this meter.
    pub fn add_ticks(&mut self, amount: u64, when: u64, tap: Option<&Tap>) {
        self.total_ticks = self.total_ticks.saturating_add(amount);
        self.last_activity_time = when;
        if let Some(tap) = tap {
            self.volume_ml = Some(tap.ticks_to_milliliters(self.total_ticks));
        }
    }

    /// True if more than `max_idle_secs` have elapsed since the last
    /// recorded activity, as observed at `now`.
    pub fn is_idle(&self, now: u64) -> bool {
        now.saturating_sub(self.last_activity_time) > self.max_idle_secs
    }

    pub fn duration_secs(&self) -> u64 {
        self.last_activity_time.saturating_sub(self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_flow_starts_active_with_no_ticks() {
        let f = Flow::new(1, "m1", None, 10, 100);
        assert_eq!(f.state, FlowState::Active);
        assert_eq!(f.total_ticks, 0);
        assert_eq!(f.volume_ml, None);
    }

    #[test]
    fn add_ticks_without_tap_leaves_volume_unset() {
        let mut f = Flow::new(1, "m1", None, 10, 100);
        f.add_ticks(50, 105, None);
        assert_eq!(f.total_ticks, 50);
        assert_eq!(f.last_activity_time, 105);
        assert_eq!(f.volume_ml, None);
    }

    #[test]
    fn add_ticks_with_tap_computes_volume() {
        let tap = Tap::new("m1", 2.0, None);
        let mut f = Flow::new(1, "m1", None, 10, 100);
        f.add_ticks(50, 105, Some(&tap));
        assert_eq!(f.volume_ml, Some(100.0));
    }

    #[test]
    fn idle_detection_uses_max_idle_secs() {
        let mut f = Flow::new(1, "m1", None, 20, 0);
        f.add_ticks(1, 0, None);
        assert!(!f.is_idle(20));
        assert!(f.is_idle(21));
    }

    #[test]
    fn has_username_is_false_for_empty_or_absent() {
        assert!(!Flow::new(1, "m1", None, 10, 0).has_username());
        assert!(!Flow::new(1, "m1", Some(String::new()), 10, 0).has_username());
        assert!(Flow::new(1, "m1", Some("alice".to_owned()), 10, 0).has_username());
    }
}
