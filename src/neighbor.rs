// SPDX-License-Identifier: Apache-2.0

use crate::base_types::{Millis, NodeId};
use std::collections::{HashMap, VecDeque};

#[cfg(test)]
#[path = "unit_tests/neighbor_tests.rs"]
mod neighbor_tests;

/// State kept for one known peer: the last meeting point, a rolling
/// window of up to `W` recent meeting points (FIFO) used for drift
/// estimation, and the derived next meeting time.
///
/// Meeting points are stored as raw `(my_time, their_time)` pairs rather
/// than collapsed to a single offset, so any derived offset comes from the
/// drift estimator rather than an ad hoc midpoint.
#[derive(Debug, Clone)]
pub struct NeighborEntry {
    meet_points: VecDeque<(Millis, Millis)>,
    window: usize,
    pub last_meet_mine: Millis,
    pub last_meet_their: Millis,
    pub next_meet: Option<Millis>,
}

impl NeighborEntry {
    fn new(window: usize, my_time: Millis, their_time: Millis) -> Self {
        let mut meet_points = VecDeque::with_capacity(window);
        meet_points.push_back((my_time, their_time));
        NeighborEntry {
            meet_points,
            window,
            last_meet_mine: my_time,
            last_meet_their: their_time,
            next_meet: None,
        }
    }

    fn record(&mut self, my_time: Millis, their_time: Millis) {
        self.meet_points.push_back((my_time, their_time));
        if self.meet_points.len() > self.window {
            self.meet_points.pop_front();
        }
        self.last_meet_mine = my_time;
        self.last_meet_their = their_time;
    }

    /// Ordinary least-squares slope of `their_time` on `my_time`. Falls
    /// back to `1.0` when fewer than two points, when the OLS denominator
    /// is zero, or when the slope falls outside `(0, 2]` — a closed form
    /// that never panics on a degenerate window, rather than a general
    /// linear-algebra routine. Deterministic given the window.
    pub fn estimate_drift(&self) -> f64 {
        let n = self.meet_points.len();
        if n < 2 {
            return 1.0;
        }
        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
        for &(x, y) in &self.meet_points {
            let x = x.0 as f64;
            let y = y.0 as f64;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }
        let n = n as f64;
        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator == 0.0 {
            return 1.0;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        if slope > 0.0 && slope <= 2.0 {
            slope
        } else {
            1.0
        }
    }
}

/// Per-node table of known peers. Never garbage-collected during a run.
#[derive(Debug, Clone, Default)]
pub struct NeighborTable {
    entries: HashMap<NodeId, NeighborEntry>,
    window: usize,
}

impl NeighborTable {
    pub fn new(window: usize) -> Self {
        NeighborTable {
            entries: HashMap::new(),
            window,
        }
    }

    pub fn contains(&self, peer: NodeId) -> bool {
        self.entries.contains_key(&peer)
    }

    pub fn get(&self, peer: NodeId) -> Option<&NeighborEntry> {
        self.entries.get(&peer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn peers(&self) -> impl Iterator<Item = &NodeId> {
        self.entries.keys()
    }

    /// Record `(my_time_now, sender_time_reported)` on a reception from
    /// `peer`, creating the entry on first contact.
    pub fn update(&mut self, peer: NodeId, my_time: Millis, their_time: Millis) {
        match self.entries.get_mut(&peer) {
            Some(entry) => entry.record(my_time, their_time),
            None => {
                self.entries
                    .insert(peer, NeighborEntry::new(self.window, my_time, their_time));
            }
        }
    }

    /// `my_sync_time = last_meet_mine / drift_rate + sync_interval - sync_time/2`,
    /// for every known peer. Returns the minimum positive delta across all
    /// peers, or `None` if there is no known peer.
    pub fn soonest_sync(&self, now: Millis, sync_interval_ms: i64, sync_time_ms: i64) -> Option<i64> {
        let mut soonest: Option<i64> = None;
        for entry in self.entries.values() {
            let delta = sync_delta(entry, now, sync_interval_ms, sync_time_ms);
            if delta > 0 && soonest.map_or(true, |s| delta < s) {
                soonest = Some(delta);
            }
        }
        soonest
    }

    /// The scheduled delta for one specific peer; may be negative, meaning
    /// the meeting is already in the past and a repair is warranted.
    pub fn sync_delta_for(
        &self,
        peer: NodeId,
        now: Millis,
        sync_interval_ms: i64,
        sync_time_ms: i64,
    ) -> Option<i64> {
        self.entries
            .get(&peer)
            .map(|entry| sync_delta(entry, now, sync_interval_ms, sync_time_ms))
    }

    /// Every peer whose derived sync time falls within
    /// `[soonest, soonest + sync_time_ms]` — the rendezvous window.
    pub fn upcoming_sync_partners(
        &self,
        now: Millis,
        sync_interval_ms: i64,
        sync_time_ms: i64,
    ) -> Vec<NodeId> {
        let soonest = match self.soonest_sync(now, sync_interval_ms, sync_time_ms) {
            Some(s) => s,
            None => return Vec::new(),
        };
        self.entries
            .iter()
            .filter_map(|(peer, entry)| {
                let delta = sync_delta(entry, now, sync_interval_ms, sync_time_ms);
                if delta >= soonest && delta <= soonest + sync_time_ms {
                    Some(*peer)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Reset the meeting schedule with a peer after a fresh ACK.
    pub fn reset_next_meet(&mut self, peer: NodeId, next: Millis) {
        if let Some(entry) = self.entries.get_mut(&peer) {
            entry.next_meet = Some(next);
        }
    }
}

fn sync_delta(entry: &NeighborEntry, now: Millis, sync_interval_ms: i64, sync_time_ms: i64) -> i64 {
    let drift_rate = entry.estimate_drift();
    let my_sync_time =
        (entry.last_meet_mine.0 as f64 / drift_rate) + sync_interval_ms as f64 - sync_time_ms as f64 / 2.0;
    my_sync_time as i64 - now.0
}
