// SPDX-License-Identifier: Apache-2.0

use crate::base_types::Millis;
use crate::config::SimConfig;
use rand::Rng;

#[cfg(test)]
#[path = "unit_tests/clock_tests.rs"]
mod clock_tests;

/// Per-node additive offset from simulator time to local time. The offset
/// is monotonically nondecreasing: it starts at a value drawn once from
/// `node_start_offset_range_ms` and, when drift is enabled, grows by a
/// uniformly-random amount in `[0, clock_drift_per_day_ms]` at every
/// checkpoint boundary.
#[derive(Debug, Clone, Copy)]
pub struct ClockDrift {
    offset_ms: i64,
    enabled: bool,
    per_day_ms: i64,
}

impl ClockDrift {
    pub fn new(config: &SimConfig, rng: &mut impl Rng) -> Self {
        let range = config.node_start_offset_range_ms;
        let initial = if range.lo == range.hi {
            range.lo
        } else {
            rng.gen_range(range.lo..=range.hi)
        };
        ClockDrift {
            offset_ms: initial,
            enabled: config.clock_drift_enabled,
            per_day_ms: config.clock_drift_per_day_ms,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset_ms
    }

    pub fn local_time(&self, sim_time: Millis) -> Millis {
        Millis(sim_time.0 + self.offset_ms)
    }

    /// Apply the bounded random daily drift, when enabled. A no-op
    /// otherwise, leaving the offset at its initial value.
    pub fn advance_one_checkpoint(&mut self, rng: &mut impl Rng) {
        if !self.enabled || self.per_day_ms <= 0 {
            return;
        }
        self.offset_ms += rng.gen_range(0..=self.per_day_ms);
    }
}
