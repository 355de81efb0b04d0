// SPDX-License-Identifier: Apache-2.0

use crate::base_types::{DurationMs, Joules, Millis, NodeId};
use crate::clock::ClockDrift;
use crate::config::SimConfig;
use crate::energy::EnergyStore;
use crate::kpi::KpiAccumulator;
use crate::neighbor::NeighborTable;
use crate::packet::{Packet, PacketKind};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

#[cfg(test)]
#[path = "unit_tests/node_tests.rs"]
mod node_tests;

/// Instantaneous radio mode. Drives medium eligibility (`is_receiving`) and
/// gates reception (`Deliver` is a no-op unless the recipient is currently
/// `Receive`). A reply transmission momentarily overwrites this while the
/// node's own cycle is mid-listen — replying to a DISC or SYNC reception
/// takes priority over the listen window it interrupts.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NodeState {
    Idle,
    Receive,
    Transmit,
    Decode,
}

/// Which half of a cycle (if any) a node is currently in. Drives what
/// `continue_after_listen` does once a listen window ends, and which
/// receptions are even capable of interrupting it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum CycleStage {
    AwaitingCharge,
    ListenA,
    Transmit,
    ListenB,
}

/// Per-cycle bookkeeping for a SYNC cycle, appended once the cycle commits
/// to SYNC and kept for the lifetime of the run.
#[derive(Copy, Clone, Debug)]
pub struct CycleRecord {
    pub sync_partners: usize,
    pub sync_received: u64,
    pub acks_received: u64,
}

/// One simulated sensor node: its energy store, neighbor table, clock
/// offset, KPI accumulator and the small state machine that drives its
/// discover/sync cycle.
pub struct Node {
    pub id: NodeId,
    state: NodeState,
    stage: CycleStage,

    pub energy: EnergyStore,
    pub neighbors: NeighborTable,
    pub clock: ClockDrift,
    pub kpi: KpiAccumulator,
    rng: Xoshiro256StarStar,

    cycle_id: u64,
    listen_epoch: u64,

    is_sync: bool,
    listen_time: i64,
    cycle_budget: Joules,
    partners: Vec<NodeId>,
    primary_partner: Option<NodeId>,

    awaiting_since: Millis,
    listen_for: DurationMs,
    listen_started_at: Millis,
    listen_discharged: Joules,

    pub sync_records: Vec<CycleRecord>,
}

/// What a `Node` method wants scheduled next. `Simulation` is the sole
/// translator from these into `scheduler::Event`s and `Medium` calls —
/// `Node` never touches the scheduler or the medium directly.
pub enum Action {
    ScheduleCycleWake { at: Millis, cycle_id: u64 },
    ScheduleListenDeadline { at: Millis, listen_epoch: u64 },
    ScheduleTransmitDone { at: Millis, packet: Packet },
    ScheduleRadiate { at: Millis, packet: Packet },
    ScheduleReceiveDecoded { at: Millis, packet: Packet },
    ScheduleAckReady { at: Millis, packet: Packet },
    /// Hand a packet to the medium right now.
    Broadcast { packet: Packet },
}

impl Node {
    pub fn new(id: NodeId, config: &SimConfig, seed: u64) -> Self {
        let mixed = seed
            .wrapping_add(id.0 as u64)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = Xoshiro256StarStar::seed_from_u64(mixed);
        let lux_range = if id.0 < config.low_power_nodes {
            config.low_light_range_lux
        } else {
            config.high_light_range_lux
        };
        let lux = rng.gen_range(lux_range.lo..=lux_range.hi);
        let clock = ClockDrift::new(config, &mut rng);
        Node {
            id,
            state: NodeState::Idle,
            stage: CycleStage::AwaitingCharge,
            energy: EnergyStore::new(config, lux),
            neighbors: NeighborTable::new(config.window_size),
            clock,
            kpi: KpiAccumulator::default(),
            rng,
            cycle_id: 0,
            listen_epoch: 0,
            is_sync: false,
            listen_time: 0,
            cycle_budget: Joules::ZERO,
            partners: Vec::new(),
            primary_partner: None,
            awaiting_since: Millis(0),
            listen_for: DurationMs(0),
            listen_started_at: Millis(0),
            listen_discharged: Joules::ZERO,
            sync_records: Vec::new(),
        }
    }

    pub fn local_time(&self, sim_now: Millis) -> Millis {
        self.clock.local_time(sim_now)
    }

    pub fn is_receiving(&self) -> bool {
        self.state == NodeState::Receive
    }

    pub fn advance_clock_checkpoint(&mut self) {
        self.clock.advance_one_checkpoint(&mut self.rng);
    }

    /// Kick off the very first cycle.
    pub fn start(&mut self, config: &SimConfig, sim_now: Millis) -> Vec<Action> {
        self.begin_cycle(config, sim_now)
    }

    /// Decide whether the next cycle will be a DISC or a SYNC cycle, and
    /// schedule the wake once the node will be charged for it.
    fn begin_cycle(&mut self, config: &SimConfig, sim_now: Millis) -> Vec<Action> {
        let local_now = self.local_time(sim_now);

        let disc_listen_time = self
            .rng
            .gen_range(config.listen_time_range_ms.lo..=config.listen_time_range_ms.hi);
        let disc_budget = Joules(disc_listen_time as f64 * config.e_receive_per_ms)
            + config.e_tx()
            + config.e_rx();

        let partners = self
            .neighbors
            .upcoming_sync_partners(local_now, config.sync_interval_ms, config.sync_time_ms);
        let sync_budget = Joules(config.sync_time_ms as f64 * config.e_receive_per_ms)
            + config.e_tx()
            + Joules(config.e_rx().0 * partners.len() as f64);

        let sync_in = self
            .neighbors
            .soonest_sync(local_now, config.sync_interval_ms, config.sync_time_ms);
        let idle_for_sync = self.energy.time_to_charge_to(sync_budget, local_now);

        let promote_to_sync = match sync_in {
            Some(delta) => {
                let lead = delta - idle_for_sync.0;
                lead > 0 && lead < config.sync_preparation_time_ms
            }
            None => false,
        };

        let wake_delay;
        if promote_to_sync {
            self.is_sync = true;
            self.listen_time = config.sync_time_ms;
            self.cycle_budget = sync_budget;
            self.partners = partners;
            self.primary_partner = self.partners.iter().min().copied();
            wake_delay = DurationMs(sync_in.unwrap());
            log::debug!(
                "node {:?} promotes cycle {} to SYNC with {} partner(s), waking in {:?}",
                self.id,
                self.cycle_id + 1,
                self.partners.len(),
                wake_delay
            );
        } else {
            self.is_sync = false;
            self.listen_time = disc_listen_time;
            self.cycle_budget = disc_budget;
            self.partners = Vec::new();
            self.primary_partner = None;
            wake_delay = self.energy.time_to_charge_to(disc_budget, local_now);
        }

        self.cycle_id += 1;
        self.stage = CycleStage::AwaitingCharge;
        self.state = NodeState::Idle;
        self.awaiting_since = sim_now;
        vec![Action::ScheduleCycleWake {
            at: sim_now + wake_delay,
            cycle_id: self.cycle_id,
        }]
    }

    pub fn on_cycle_wake(&mut self, cycle_id: u64, sim_now: Millis, config: &SimConfig) -> Vec<Action> {
        if cycle_id != self.cycle_id {
            return Vec::new();
        }
        let local_now = self.local_time(sim_now);
        let elapsed = sim_now - self.awaiting_since;
        self.energy.harvest(elapsed, local_now);
        if self.energy.remaining().0 < self.cycle_budget.0 {
            // Not charged yet after all (e.g. day-cycle dip) — recompute.
            return self.begin_cycle(config, sim_now);
        }

        if self.is_sync && self.partners.is_empty() {
            // A scheduled sync partner vanished between decision and
            // activation: silent no-op, no transmission.
            log::trace!("node {:?} SYNC cycle {} degraded to a no-op: no partners left", self.id, cycle_id);
            return self.end_cycle(config, sim_now);
        }

        if self.is_sync {
            self.sync_records.push(CycleRecord {
                sync_partners: self.partners.len(),
                sync_received: 0,
                acks_received: 0,
            });
            self.kpi.record_sync_cycle();
        } else {
            self.kpi.start_discovery(local_now);
        }

        let half = if self.is_sync {
            self.rng
                .gen_range(config.sync_time_range_ms.lo..=config.sync_time_range_ms.hi)
                .round() as i64
        } else {
            self.listen_time / 2
        };
        self.begin_listen(config, sim_now, CycleStage::ListenA, half)
    }

    fn begin_listen(
        &mut self,
        config: &SimConfig,
        sim_now: Millis,
        stage: CycleStage,
        duration_ms: i64,
    ) -> Vec<Action> {
        if duration_ms <= 0 {
            return self.end_cycle(config, sim_now);
        }
        let cost = Joules(duration_ms as f64 * config.e_receive_per_ms);
        if self.energy.remaining().0 < cost.0 {
            return self.end_cycle(config, sim_now);
        }
        self.energy.discharge(cost);
        self.listen_discharged = cost;
        self.listen_for = DurationMs(duration_ms);
        self.listen_started_at = sim_now;
        self.state = NodeState::Receive;
        self.stage = stage;
        self.listen_epoch += 1;
        vec![Action::ScheduleListenDeadline {
            at: sim_now + self.listen_for,
            listen_epoch: self.listen_epoch,
        }]
    }

    pub fn on_listen_deadline(
        &mut self,
        listen_epoch: u64,
        sim_now: Millis,
        config: &SimConfig,
    ) -> Vec<Action> {
        if listen_epoch != self.listen_epoch {
            return Vec::new();
        }
        self.settle_listen(sim_now);
        self.continue_after_listen(config, sim_now, false)
    }

    /// Credit the KPI for the listen window just ended (whether it ran to
    /// its deadline or was cut short by a qualifying reception) and harvest
    /// across the elapsed wall time. Energy already discharged up front is
    /// never refunded on early interrupt.
    fn settle_listen(&mut self, sim_now: Millis) {
        let elapsed = sim_now - self.listen_started_at;
        let local_now = self.local_time(sim_now);
        self.energy.harvest(elapsed, local_now);
        self.kpi.add_energy(self.listen_discharged);
        if self.is_sync {
            self.kpi.add_sync_energy(self.listen_discharged);
        }
        self.state = NodeState::Idle;
        // Invalidate any `ListenDeadline` still queued for this window (the
        // natural-end case here is its own deadline, which already matched
        // and is being consumed; an early interrupt leaves a stale one in
        // the scheduler that must not re-settle this window when it pops).
        self.listen_epoch += 1;
    }

    fn continue_after_listen(&mut self, config: &SimConfig, sim_now: Millis, heard: bool) -> Vec<Action> {
        match self.stage {
            CycleStage::ListenA if heard => self.end_cycle(config, sim_now),
            CycleStage::ListenA => {
                self.stage = CycleStage::Transmit;
                self.do_transmit(config, sim_now)
            }
            CycleStage::ListenB => self.end_cycle(config, sim_now),
            CycleStage::AwaitingCharge | CycleStage::Transmit => Vec::new(),
        }
    }

    fn do_transmit(&mut self, config: &SimConfig, sim_now: Millis) -> Vec<Action> {
        let e_tx = config.e_tx();
        if self.energy.remaining().0 < e_tx.0 {
            // Cannot afford to transmit: skip straight to the remaining
            // listen window without side effects.
            return self.begin_second_listen(config, sim_now);
        }
        self.energy.discharge(e_tx);
        self.state = NodeState::Transmit;
        let local_now = self.local_time(sim_now);
        let packet = if self.is_sync {
            Packet::sync(
                self.id,
                self.primary_partner.expect("sync cycle with no primary partner"),
                local_now,
            )
        } else {
            Packet::disc(self.id, None, local_now)
        };
        let at = sim_now + DurationMs(config.pt_time_ms.round() as i64);
        vec![Action::ScheduleTransmitDone { at, packet }]
    }

    /// Completion of ANY transmit chain this node started: its own cycle
    /// broadcast, a DISC-ACK reply, or a SYNC-ACK reply. Distinguished by
    /// `(kind, target)`, not by a separate event type, since at the wire
    /// level they are the same fixed-cost operation.
    pub fn on_transmit_done(&mut self, packet: Packet, sim_now: Millis, config: &SimConfig) -> Vec<Action> {
        let local_now = self.local_time(sim_now);
        self.energy.harvest(DurationMs(config.pt_time_ms.round() as i64), local_now);
        self.kpi.add_energy(transmit_energy_cost(&packet, config));

        match (packet.kind, packet.target) {
            (PacketKind::Disc, None) => {
                self.kpi
                    .send_discovery(self.listen_time, config.e_receive_per_ms, config.e_tx());
            }
            (PacketKind::Sync, _) => {
                self.kpi.record_sync_try();
                self.kpi.add_sync_energy(config.e_tx());
            }
            (PacketKind::Ack, _) => {
                self.kpi.add_sync_energy(config.e_tx());
            }
            (PacketKind::Disc, Some(_)) => {
                // Out-of-band DISC-ACK reply: falls through to the generic
                // radiate wait below, but does not touch this node's own
                // cycle stage.
            }
        }

        let delay = self.propagation_delay(config);
        vec![Action::ScheduleRadiate {
            at: sim_now + delay,
            packet,
        }]
    }

    fn propagation_delay(&mut self, config: &SimConfig) -> DurationMs {
        let lo = config.delay_range_ms.lo;
        let hi = config.delay_range_ms.hi;
        let ms = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
        DurationMs(ms.round() as i64)
    }

    /// The sender-side wait is over: hand the packet to the medium and, if
    /// this was the cycle's own transmit, move into the second listen half.
    pub fn on_radiate(&mut self, packet: Packet, sim_now: Millis, config: &SimConfig) -> Vec<Action> {
        let mut actions = vec![Action::Broadcast { packet }];
        let is_cycle_main = matches!(
            (packet.kind, packet.target),
            (PacketKind::Disc, None) | (PacketKind::Sync, _)
        ) && self.stage == CycleStage::Transmit;
        if is_cycle_main {
            actions.extend(self.begin_second_listen(config, sim_now));
        }
        actions
    }

    fn begin_second_listen(&mut self, config: &SimConfig, sim_now: Millis) -> Vec<Action> {
        let remaining = self.listen_time - self.listen_for.0;
        self.begin_listen(config, sim_now, CycleStage::ListenB, remaining)
    }

    fn end_cycle(&mut self, config: &SimConfig, sim_now: Millis) -> Vec<Action> {
        self.partners.clear();
        self.primary_partner = None;
        self.state = NodeState::Idle;
        self.stage = CycleStage::AwaitingCharge;
        self.begin_cycle(config, sim_now)
    }

    /// A packet physically arrived while this node was `Receive`; pay the
    /// fixed decode cost and schedule `ReceiveDecoded`, or drop it silently
    /// if the node's state changed (or it can no longer afford to decode)
    /// since the medium accepted the send.
    pub fn on_deliver(&mut self, packet: Packet, sim_now: Millis, config: &SimConfig) -> Vec<Action> {
        if self.state != NodeState::Receive {
            return Vec::new();
        }
        let e_rx = config.e_rx();
        if self.energy.remaining().0 < e_rx.0 {
            return Vec::new();
        }
        self.energy.discharge(e_rx);
        self.state = NodeState::Decode;
        let at = sim_now + DurationMs(config.pt_time_ms.round() as i64);
        vec![Action::ScheduleReceiveDecoded { at, packet }]
    }

    pub fn on_receive_decoded(&mut self, packet: Packet, sim_now: Millis, config: &SimConfig) -> Vec<Action> {
        self.state = NodeState::Receive;
        self.kpi.add_energy(config.e_rx());
        if self.is_sync {
            self.kpi.add_sync_energy(config.e_rx());
        }
        let local_now = self.local_time(sim_now);

        let mut actions = Vec::new();
        let mut heard = false;

        match packet.kind {
            PacketKind::Disc => {
                if !self.is_sync {
                    heard = self.handle_disc(packet, local_now, sim_now, config, &mut actions);
                }
            }
            PacketKind::Sync => {
                if self.is_sync && self.partners.contains(&packet.sender) {
                    heard = true;
                    if let Some(record) = self.sync_records.last_mut() {
                        record.sync_received += 1;
                    }
                    let (lo, hi) = (config.ack_send_delay_range_ms.lo, config.ack_send_delay_range_ms.hi);
                    let jitter = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
                    actions.push(Action::ScheduleAckReady {
                        at: sim_now + DurationMs(jitter.round() as i64),
                        packet,
                    });
                }
            }
            PacketKind::Ack => {
                if self.is_sync && !self.partners.is_empty() {
                    self.kpi.record_ack_received();
                    if let Some(record) = self.sync_records.last_mut() {
                        record.acks_received += 1;
                    }
                    self.neighbors.update(packet.sender, local_now, packet.sent_at);
                    self.neighbors
                        .reset_next_meet(packet.sender, local_now + DurationMs(config.sync_interval_ms));
                }
            }
        }

        if heard && self.stage == CycleStage::ListenA {
            self.settle_listen(sim_now);
            actions.extend(self.continue_after_listen(config, sim_now, true));
        }
        actions
    }

    /// DISC reception while this node is itself running a DISC cycle:
    /// either a directed DISC-ACK closing out our own discovery, or a
    /// broadcast DISC from a peer we don't know (or are overdue to sync
    /// with) that we reply to directly.
    fn handle_disc(
        &mut self,
        packet: Packet,
        local_now: Millis,
        sim_now: Millis,
        config: &SimConfig,
        actions: &mut Vec<Action>,
    ) -> bool {
        if packet.target == Some(self.id) {
            self.kpi
                .receive_disc_ack(self.listen_time, config.e_receive_per_ms, config.e_tx(), config.e_rx());
            self.neighbors.update(packet.sender, local_now, packet.sent_at);
            return true;
        }

        if packet.target.is_some() {
            return false;
        }

        let sender = packet.sender;
        let known = self.neighbors.contains(sender);
        let overdue = self
            .neighbors
            .sync_delta_for(sender, local_now, config.sync_interval_ms, config.sync_time_ms)
            .map_or(false, |delta| delta < 0);
        if known && !overdue {
            return false;
        }

        self.kpi
            .receive_discovery(self.listen_time, config.e_receive_per_ms, config.e_rx(), local_now);
        self.neighbors.update(sender, local_now, packet.sent_at);

        if self.energy.remaining().0 >= config.e_tx().0 {
            self.energy.discharge(config.e_tx());
            self.state = NodeState::Transmit;
            let reply = Packet::disc(self.id, Some(sender), local_now);
            let at = sim_now + DurationMs(config.pt_time_ms.round() as i64);
            actions.push(Action::ScheduleTransmitDone { at, packet: reply });
        }
        true
    }

    /// Jitter before an ACK elapsed: transmit it, addressed to the original
    /// SYNC's sender, paying the fixed transmit cost up front.
    pub fn on_ack_ready(&mut self, sync_packet: Packet, sim_now: Millis, config: &SimConfig) -> Vec<Action> {
        if self.energy.remaining().0 < config.e_tx().0 {
            return Vec::new();
        }
        self.energy.discharge(config.e_tx());
        self.state = NodeState::Transmit;
        let local_now = self.local_time(sim_now);
        self.neighbors
            .update(sync_packet.sender, local_now, sync_packet.sent_at);
        let ack = Packet::ack(self.id, sync_packet.sender, local_now);
        let at = sim_now + DurationMs(config.pt_time_ms.round() as i64);
        vec![Action::ScheduleTransmitDone { at, packet: ack }]
    }
}

fn transmit_energy_cost(packet: &Packet, config: &SimConfig) -> Joules {
    match packet.kind {
        PacketKind::Disc | PacketKind::Sync | PacketKind::Ack => config.e_tx(),
    }
}
