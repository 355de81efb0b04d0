// SPDX-License-Identifier: Apache-2.0

use crate::base_types::Joules;
use crate::error::SimError;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "unit_tests/config_tests.rs"]
mod config_tests;

/// A closed interval `[lo, hi]` sampled uniformly at random.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Range<T> {
    pub lo: T,
    pub hi: T,
}

impl<T: Copy> Range<T> {
    pub fn new(lo: T, hi: T) -> Self {
        Range { lo, hi }
    }
}

/// Every tunable of the core simulation, gathered in one place so that
/// `Simulation::new` has a single, validated entry point. Field groups run
/// in order: node population, calendar, the medium, the protocol timings,
/// the energy model, clock drift, and day-cycle modulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of low-powered nodes (ids `[0, low_power_nodes)`).
    pub low_power_nodes: usize,
    /// Number of high-powered nodes (ids `[low_power_nodes, N)`).
    pub high_power_nodes: usize,

    /// Length of the simulated run, in days.
    pub sim_days: u32,
    /// Milliseconds in one simulated day.
    pub one_day_ms: i64,
    /// Interval between KPI checkpoints within a day.
    pub checkpoint_cadence_ms: i64,

    /// Per-recipient probability that the medium drops a broadcast packet.
    pub pt_loss: f64,
    /// Fixed decode time applied to every received packet, in milliseconds.
    pub pt_time_ms: f64,
    /// Propagation delay range applied by the medium to every delivery.
    pub delay_range_ms: Range<f64>,

    /// Range from which a DISC cycle's listen window is drawn.
    pub listen_time_range_ms: Range<i64>,
    /// Nominal interval between two periodic syncs with the same peer.
    pub sync_interval_ms: i64,
    /// How long before a scheduled sync a cycle may be promoted to SYNC.
    pub sync_preparation_time_ms: i64,
    /// Length of a SYNC cycle's combined listen/transmit window.
    pub sync_time_ms: i64,
    /// Range from which the "listen before transmitting" half of a SYNC
    /// cycle is drawn.
    pub sync_time_range_ms: Range<f64>,
    /// Jitter applied before a node replies to a SYNC with an ACK.
    pub ack_send_delay_range_ms: Range<f64>,

    /// Ambient illuminance range for low-powered nodes, in lux.
    pub low_light_range_lux: Range<f64>,
    /// Ambient illuminance range for high-powered nodes, in lux.
    pub high_light_range_lux: Range<f64>,

    /// Capacitor ceiling.
    pub e_max: Joules,
    /// Energy floor below which nothing may be spent.
    pub e_threshold: Joules,
    /// Idle self-discharge, in joules per millisecond.
    pub e_idle_per_ms: f64,
    /// Energy spent per millisecond spent listening.
    pub e_receive_per_ms: f64,
    /// Energy spent per millisecond of the fixed transmit/decode cost
    /// (multiplied by `pt_time_ms` to obtain `e_tx`).
    pub e_tx_per_ms: f64,
    /// Harvest-rate model coefficients: `rate = max(0, a*lux + b) / k - e_idle_per_ms`.
    pub harvest_rate_a: f64,
    pub harvest_rate_b: f64,
    pub harvest_rate_k: f64,

    /// Whether clock drift accumulates at each checkpoint.
    pub clock_drift_enabled: bool,
    /// Maximum random increment applied to a node's offset per day.
    pub clock_drift_per_day_ms: i64,
    /// Range from which each node's initial clock offset is drawn once.
    pub node_start_offset_range_ms: Range<i64>,

    /// Whether the harvest rate is modulated by a day/night cycle.
    pub day_cycle_enabled: bool,
    pub sunrise_ms: i64,
    pub sunset_ms: i64,

    /// Cap on the rolling window of meeting points kept per neighbor.
    pub window_size: usize,
}

impl Default for SimConfig {
    /// A mid-size deployment: 18 low-power / 36 high-power nodes, a 5%
    /// per-recipient loss rate, day-cycle disabled.
    fn default() -> Self {
        let one_day_ms = 86_400_000;
        let pt_time_ms = 14.89;
        SimConfig {
            low_power_nodes: 18,
            high_power_nodes: 36,

            sim_days: 14,
            one_day_ms,
            checkpoint_cadence_ms: one_day_ms,

            pt_loss: 0.05,
            pt_time_ms,
            delay_range_ms: Range::new(10.0, 50.0),

            listen_time_range_ms: Range::new(1_000, 2_000),
            sync_interval_ms: one_day_ms,
            sync_preparation_time_ms: 45 * 60 * 1_000,
            sync_time_ms: 30_000,
            sync_time_range_ms: Range::new(2.0, 30_000.0 / 2.0),
            ack_send_delay_range_ms: Range::new(1.0, 5.0),

            low_light_range_lux: Range::new(15.0, 20.0),
            high_light_range_lux: Range::new(30.0, 35.0),

            e_max: Joules(8.82),
            e_threshold: Joules(1.62),
            e_idle_per_ms: 0.00000495 / 1_000.0,
            e_receive_per_ms: 0.03564 / 1_000.0,
            e_tx_per_ms: 0.1023 / 1_000.0,
            harvest_rate_a: 0.9083,
            harvest_rate_b: -9.2714,
            harvest_rate_k: 1_000_000_000.0,

            clock_drift_enabled: false,
            clock_drift_per_day_ms: 800,
            node_start_offset_range_ms: Range::new(0, 0),

            day_cycle_enabled: false,
            sunrise_ms: 8 * 60 * 60 * 1_000,
            sunset_ms: 18 * 60 * 60 * 1_000,

            window_size: 8,
        }
    }
}

impl SimConfig {
    pub fn num_nodes(&self) -> usize {
        self.low_power_nodes + self.high_power_nodes
    }

    /// Energy spent transmitting one packet (fixed decode-time cost).
    pub fn e_tx(&self) -> Joules {
        Joules(self.e_tx_per_ms * self.pt_time_ms)
    }

    /// Energy spent receiving and decoding one packet.
    pub fn e_rx(&self) -> Joules {
        Joules(self.e_receive_per_ms * self.pt_time_ms)
    }

    /// Reject a configuration that could not produce a meaningful run.
    /// This is the one fallible entry point in the public API; everything
    /// downstream of a validated `SimConfig` degrades metrics instead of
    /// erroring.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_nodes() == 0 {
            return Err(SimError::NoNodes {
                low: self.low_power_nodes,
                high: self.high_power_nodes,
            });
        }
        check_range_i64("listen_time_range_ms", self.listen_time_range_ms)?;
        check_range_f64("delay_range_ms", self.delay_range_ms)?;
        check_range_f64("sync_time_range_ms", self.sync_time_range_ms)?;
        check_range_f64("ack_send_delay_range_ms", self.ack_send_delay_range_ms)?;
        check_range_f64("low_light_range_lux", self.low_light_range_lux)?;
        check_range_f64("high_light_range_lux", self.high_light_range_lux)?;
        check_range_i64(
            "node_start_offset_range_ms",
            self.node_start_offset_range_ms,
        )?;

        if self.e_threshold.0 >= self.e_max.0 {
            return Err(SimError::ThresholdAboveMax {
                threshold: self.e_threshold.0,
                max: self.e_max.0,
            });
        }
        if !(0.0..=1.0).contains(&self.pt_loss) {
            return Err(SimError::InvalidLossRate(self.pt_loss));
        }
        if self.pt_time_ms <= 0.0 {
            return Err(SimError::NonPositive {
                field: "pt_time_ms",
                value: self.pt_time_ms,
            });
        }
        if self.one_day_ms <= 0 || self.checkpoint_cadence_ms <= 0 {
            return Err(SimError::NonPositive {
                field: "checkpoint_cadence_ms",
                value: self.checkpoint_cadence_ms as f64,
            });
        }
        if self.one_day_ms % self.checkpoint_cadence_ms != 0 {
            return Err(SimError::BadCheckpointCadence {
                one_day_ms: self.one_day_ms,
                cadence: self.checkpoint_cadence_ms,
            });
        }
        if self.window_size < 2 {
            return Err(SimError::WindowTooSmall(self.window_size));
        }
        Ok(())
    }
}

fn check_range_i64(field: &'static str, r: Range<i64>) -> Result<(), SimError> {
    if r.lo > r.hi {
        return Err(SimError::InvertedRange {
            field,
            lo: r.lo,
            hi: r.hi,
        });
    }
    Ok(())
}

fn check_range_f64(field: &'static str, r: Range<f64>) -> Result<(), SimError> {
    if r.lo > r.hi {
        return Err(SimError::InvertedRange {
            field,
            lo: r.lo as i64,
            hi: r.hi as i64,
        });
    }
    Ok(())
}
