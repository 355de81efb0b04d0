// SPDX-License-Identifier: Apache-2.0

use crate::base_types::{Joules, Millis};

#[cfg(test)]
#[path = "unit_tests/kpi_tests.rs"]
mod kpi_tests;

/// Per-node counters accumulated over a run: discovery and sync-attempt
/// totals, the energies attributed to each role, and first-success
/// timestamps, all under one accumulator so there is a single owner of
/// "did the protocol succeed" bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct KpiAccumulator {
    /// Sum of every discharge ever applied to this node's energy store.
    pub e_total: Joules,

    pub disc_start_time: Option<Millis>,
    pub disc_first_time: Option<Millis>,

    pub disc_sent: u64,
    pub disc_e_send: Joules,
    pub disc_received: u64,
    pub disc_e_receive: Joules,

    pub disc_successful: u64,
    pub disc_success_e: Joules,

    /// One attempt per transmitted SYNC packet — counted per packet, not
    /// per partner or per cycle.
    pub sync_tries: u64,
    pub acks_received: u64,

    /// Subset of `e_total` spent while running a SYNC cycle — listening,
    /// transmitting the SYNC, and replying with ACKs. Tracked separately so
    /// a checkpoint can report sync cost independent of discovery cost.
    pub sync_e: Joules,
    pub sync_cycles: u64,
}

impl KpiAccumulator {
    pub fn add_energy(&mut self, joules: Joules) {
        self.e_total = self.e_total + joules;
    }

    pub fn add_sync_energy(&mut self, joules: Joules) {
        self.sync_e = self.sync_e + joules;
    }

    pub fn record_sync_cycle(&mut self) {
        self.sync_cycles += 1;
    }

    /// Average energy spent per SYNC cycle committed to.
    pub fn sync_e_per_cycle(&self) -> f64 {
        if self.sync_cycles == 0 {
            0.0
        } else {
            self.sync_e.0 / self.sync_cycles as f64
        }
    }

    pub fn start_discovery(&mut self, local_time: Millis) {
        if self.disc_start_time.is_none() {
            self.disc_start_time = Some(local_time);
        }
    }

    pub fn send_discovery(&mut self, listen_time_ms: i64, e_receive_per_ms: f64, e_tx: Joules) {
        self.disc_sent += 1;
        let listen_e = listen_time_ms as f64 * e_receive_per_ms;
        self.disc_e_send = self.disc_e_send + Joules(listen_e) + e_tx;
        self.disc_e_receive = self.disc_e_receive + Joules(listen_e);
    }

    pub fn receive_discovery(&mut self, listen_time_ms: i64, e_receive_per_ms: f64, e_rx: Joules, local_time: Millis) {
        self.disc_received += 1;
        self.disc_e_receive =
            self.disc_e_receive + Joules(listen_time_ms as f64 / 2.0 * e_receive_per_ms) + e_rx;
        if self.disc_first_time.is_none() {
            self.disc_first_time = Some(local_time);
        }
    }

    pub fn receive_disc_ack(&mut self, listen_time_ms: i64, e_receive_per_ms: f64, e_tx: Joules, e_rx: Joules) {
        self.disc_successful += 1;
        self.disc_success_e = self.disc_success_e
            + Joules(listen_time_ms as f64 * e_receive_per_ms)
            + e_tx
            + e_rx;
    }

    pub fn record_sync_try(&mut self) {
        self.sync_tries += 1;
    }

    pub fn record_ack_received(&mut self) {
        self.acks_received += 1;
    }

    /// Average energy per discovery cycle (send + receive side), the
    /// elapsed time from discovery-start to first success in seconds
    /// (`None` if never succeeded — "not applicable", never zero), and the
    /// discovery success rate.
    pub fn discovery_kpis(&self) -> (f64, Option<f64>, f64) {
        let cycles = self.disc_sent + self.disc_received;
        if cycles == 0 {
            return (0.0, None, 0.0);
        }
        let e_per_cycle = (self.disc_e_receive.0 + self.disc_e_send.0) / cycles as f64;
        let latency = match (self.disc_start_time, self.disc_first_time) {
            (Some(start), Some(first)) => Some((first.0 - start.0) as f64 / 1_000.0),
            _ => None,
        };
        let success_rate = if self.disc_sent == 0 {
            0.0
        } else {
            self.disc_successful as f64 / self.disc_sent as f64 * 100.0
        };
        (e_per_cycle, latency, success_rate)
    }

    pub fn success_disc_energy(&self) -> f64 {
        if self.disc_successful == 0 {
            0.0
        } else {
            self.disc_success_e.0 / self.disc_successful as f64
        }
    }

    pub fn sync_success_pct(&self) -> f64 {
        if self.sync_tries == 0 {
            0.0
        } else {
            self.acks_received as f64 / self.sync_tries as f64 * 100.0
        }
    }
}
