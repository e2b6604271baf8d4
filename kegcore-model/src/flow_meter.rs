// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

/// Per-meter tick accumulator with overflow and glitch filtering.
///
/// Sensor controllers report a raw, free-running tick counter that can wrap
/// on overflow or reset on reboot. `set_ticks` compares each reading against
/// the last one seen and only advances `total_ticks` when the delta is a
/// plausible forward step; everything else is treated as a glitch, but
/// `last_ticks` is always resynchronized so the *next* reading gets a sane
/// baseline.
#[derive(Debug, Clone)]
pub struct FlowMeter {
    name: String,
    max_delta: u64,
    last_ticks: Option<u64>,
    total_ticks: u64,
}

impl FlowMeter {
    /// `max_delta` of 0 disables the plausibility check entirely (every
    /// forward step is accepted, no matter how large).
    pub fn new(name: impl Into<String>, max_delta: u64) -> Self {
        Self {
            name: name.into(),
            max_delta,
            last_ticks: None,
            total_ticks: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn last_ticks(&self) -> Option<u64> {
        self.last_ticks
    }

    /// Records a new raw reading and returns the delta actually applied to
    /// `total_ticks` (0 if this is the first reading, or if the reading was
    /// rejected as a glitch).
    pub fn set_ticks(&mut self, ticks: u64) -> u64 {
        let delta = match self.last_ticks {
            None => 0,
            Some(last) => {
                // Widen to i128 so the subtraction can go negative (a
                // counter reset) without wrapping the unsigned inputs.
                let signed_delta = ticks as i128 - last as i128;
                let within_bound =
                    self.max_delta == 0 || signed_delta <= self.max_delta as i128;
                if signed_delta > 0 && within_bound {
                    signed_delta as u64
                } else {
                    0
                }
            }
        };
        self.total_ticks = self.total_ticks.saturating_add(delta);
        self.last_ticks = Some(ticks);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reading_establishes_baseline() {
        let mut m = FlowMeter::new("m1", 5000);
        assert_eq!(m.set_ticks(2000), 0);
        assert_eq!(m.total_ticks(), 0);
        assert_eq!(m.last_ticks(), Some(2000));
    }

    #[test]
    fn first_tick_glitch_scenario() {
        let mut m = FlowMeter::new("m1", 5000);
        assert_eq!(m.set_ticks(2000), 0);
        assert_eq!(m.set_ticks(2100), 100);
        assert_eq!(m.total_ticks(), 100);

        // A jump far beyond max_delta is rejected, but last_ticks still
        // resyncs to the new raw reading.
        assert_eq!(m.set_ticks(2100 + 5001), 0);
        assert_eq!(m.total_ticks(), 100);
        assert_eq!(m.last_ticks(), Some(7101));
    }

    #[test]
    fn overflow_reset_is_rejected_as_glitch() {
        let mut m = FlowMeter::new("m1", 0);
        // max_delta = 0 still rejects negative deltas (resets), only the
        // upper bound check is disabled.
        assert_eq!(m.set_ticks((1u64 << 32) - 100), 0);
        assert_eq!(m.set_ticks((1u64 << 32) - 50), 50);
        assert_eq!(m.set_ticks(10), 0);
        assert_eq!(m.total_ticks(), 50);
    }

    #[test]
    fn zero_max_delta_accepts_any_forward_step() {
        let mut m = FlowMeter::new("m1", 0);
        m.set_ticks(0);
        assert_eq!(m.set_ticks(1_000_000), 1_000_000);
        assert_eq!(m.total_ticks(), 1_000_000);
    }

    #[test]
    fn negative_delta_from_shrinking_counter_is_rejected() {
        let mut m = FlowMeter::new("m1", 5000);
        m.set_ticks(500);
        assert_eq!(m.set_ticks(100), 0);
        assert_eq!(m.total_ticks(), 0);
        assert_eq!(m.last_ticks(), Some(100));
    }
}
