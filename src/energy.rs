// SPDX-License-Identifier: Apache-2.0

use crate::base_types::{DurationMs, Joules, Millis};
use crate::config::SimConfig;

#[cfg(test)]
#[path = "unit_tests/energy_tests.rs"]
mod energy_tests;

/// One hour, used as the `time_to_charge_to` fallback when the harvest
/// rate is non-positive.
const FALLBACK_CHARGE_MS: i64 = 60 * 60 * 1_000;

/// Capacitor + harvester for one node: tracks stored energy, a constant
/// illuminance drawn once at construction, and the derived harvest rate.
#[derive(Debug, Clone)]
pub struct EnergyStore {
    energy: Joules,
    e_max: Joules,
    e_threshold: Joules,
    lux: f64,
    harvest_rate_a: f64,
    harvest_rate_b: f64,
    harvest_rate_k: f64,
    e_idle_per_ms: f64,
    day_cycle_enabled: bool,
    one_day_ms: i64,
    sunrise_ms: i64,
    sunset_ms: i64,
}

impl EnergyStore {
    pub fn new(config: &SimConfig, lux: f64) -> Self {
        EnergyStore {
            energy: Joules::ZERO,
            e_max: config.e_max,
            e_threshold: config.e_threshold,
            lux,
            harvest_rate_a: config.harvest_rate_a,
            harvest_rate_b: config.harvest_rate_b,
            harvest_rate_k: config.harvest_rate_k,
            e_idle_per_ms: config.e_idle_per_ms,
            day_cycle_enabled: config.day_cycle_enabled,
            one_day_ms: config.one_day_ms,
            sunrise_ms: config.sunrise_ms,
            sunset_ms: config.sunset_ms,
        }
    }

    pub fn energy(&self) -> Joules {
        self.energy
    }

    pub fn lux(&self) -> f64 {
        self.lux
    }

    /// Energy the protocol may spend: stored energy above the threshold.
    pub fn remaining(&self) -> Joules {
        Joules((self.energy.0 - self.e_threshold.0).max(0.0))
    }

    /// Net harvest rate, in joules per millisecond, at a given local time.
    /// Constant unless day-cycle mode is enabled, in which case it is zero
    /// outside `[sunrise, sunset)` and modulated by
    /// `sin(pi * normalized_day_fraction)` within.
    pub fn rate(&self, local_time: Millis) -> f64 {
        let base = (self.harvest_rate_a * self.lux + self.harvest_rate_b).max(0.0)
            / self.harvest_rate_k
            - self.e_idle_per_ms;
        if !self.day_cycle_enabled {
            return base;
        }
        let time_of_day = local_time.0.rem_euclid(self.one_day_ms);
        if time_of_day < self.sunrise_ms || time_of_day >= self.sunset_ms {
            return -self.e_idle_per_ms;
        }
        let span = (self.sunset_ms - self.sunrise_ms) as f64;
        let fraction = (time_of_day - self.sunrise_ms) as f64 / span;
        base * (std::f64::consts::PI * fraction).sin()
    }

    /// `energy <- min(e_max, energy + rate(local_time) * dt)`.
    pub fn harvest(&mut self, dt: DurationMs, local_time: Millis) {
        let gained = self.rate(local_time) * dt.0 as f64;
        self.energy = (self.energy + Joules(gained)).min(self.e_max);
    }

    /// Spend `joules` of remaining energy. Contract violation: panics if
    /// `joules > remaining()` — callers must check `remaining()` first.
    pub fn discharge(&mut self, joules: Joules) {
        let remaining = self.remaining();
        assert!(
            joules.0 <= remaining.0,
            "discharge({:.6}) exceeds remaining energy ({:.6})",
            joules.0,
            remaining.0
        );
        self.energy = self.energy - joules;
    }

    /// Milliseconds until `remaining() >= joules` at the current rate, or
    /// the one-hour fallback when the rate is non-positive.
    pub fn time_to_charge_to(&self, joules: Joules, local_time: Millis) -> DurationMs {
        let remaining = self.remaining();
        if remaining.0 >= joules.0 {
            return DurationMs(0);
        }
        let rate = self.rate(local_time);
        if rate <= 0.0 {
            return DurationMs(FALLBACK_CHARGE_MS);
        }
        let needed = joules.0 - remaining.0;
        DurationMs((needed / rate).ceil() as i64)
    }
}
