// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "unit_tests/base_type_tests.rs"]
mod base_type_tests;

/// Identity of a simulated node, in `[0, N)`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A point in time, in integer milliseconds. Used both for the simulator's
/// global virtual clock and for a node's drift-adjusted local clock.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Serialize, Deserialize, Default)]
pub struct Millis(pub i64);

/// An elapsed amount of time, in integer milliseconds.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Serialize, Deserialize, Debug, Default)]
pub struct DurationMs(pub i64);

/// A quantity of energy, in joules.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Default)]
pub struct Joules(pub f64);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Debug for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl std::ops::Add<DurationMs> for Millis {
    type Output = Millis;

    fn add(self, rhs: DurationMs) -> Self::Output {
        Millis(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Millis {
    type Output = DurationMs;

    fn sub(self, rhs: Millis) -> Self::Output {
        DurationMs(self.0 - rhs.0)
    }
}

impl std::ops::Add<DurationMs> for DurationMs {
    type Output = DurationMs;

    fn add(self, rhs: DurationMs) -> Self::Output {
        DurationMs(self.0 + rhs.0)
    }
}

impl Millis {
    /// A time that is never reached by a running simulation; used as a
    /// sentinel default for "no scheduled meeting yet".
    pub fn never() -> Self {
        Millis(std::i64::MAX)
    }
}

impl PartialEq for Joules {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Joules {
    pub const ZERO: Joules = Joules(0.0);

    pub fn max(self, other: Joules) -> Joules {
        Joules(self.0.max(other.0))
    }

    pub fn min(self, other: Joules) -> Joules {
        Joules(self.0.min(other.0))
    }
}

impl std::ops::Add for Joules {
    type Output = Joules;

    fn add(self, rhs: Joules) -> Self::Output {
        Joules(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Joules {
    type Output = Joules;

    fn sub(self, rhs: Joules) -> Self::Output {
        Joules(self.0 - rhs.0)
    }
}

impl std::ops::Mul<f64> for Joules {
    type Output = Joules;

    fn mul(self, rhs: f64) -> Self::Output {
        Joules(self.0 * rhs)
    }
}
