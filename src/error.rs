// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors that reject a `SimConfig` or a `Simulation` before any event is
/// scheduled. Once a simulation is running, protocol-level failures (packet
/// loss, missed syncs, insufficient energy) are not errors: they are
/// observed only through degraded KPIs, per the engine's error-handling
/// design (a recoverable local condition is a no-op, not a `Result::Err`).
#[derive(Error, Debug, Eq, PartialEq)]
pub enum SimError {
    #[error("node counts must be positive (low={low}, high={high})")]
    NoNodes { low: usize, high: usize },

    #[error("range {field} is inverted: lo={lo} > hi={hi}")]
    InvertedRange {
        field: &'static str,
        lo: i64,
        hi: i64,
    },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("e_threshold ({threshold}) must be strictly less than e_max ({max})")]
    ThresholdAboveMax { threshold: f64, max: f64 },

    #[error("pt_loss must lie in [0, 1], got {0}")]
    InvalidLossRate(f64),

    #[error("checkpoint cadence must divide one_day_ms evenly (one_day_ms={one_day_ms}, cadence={cadence})")]
    BadCheckpointCadence { one_day_ms: i64, cadence: i64 },

    #[error("rolling window size w must be at least 2, got {0}")]
    WindowTooSmall(usize),
}
