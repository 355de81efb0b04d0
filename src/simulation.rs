// SPDX-License-Identifier: Apache-2.0

use crate::base_types::{Joules, Millis, NodeId};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::kpi::KpiAccumulator;
use crate::medium::Medium;
use crate::node::{Action, Node};
use crate::scheduler::{Event, Scheduler};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

/// One row of the aggregated checkpoint table, the external consumer
/// contract this crate preserves even though nothing here writes it to a
/// file (a caller that wants a file serializes this itself).
#[derive(Copy, Clone, Debug, Default)]
pub struct CheckpointRow {
    pub e_per_discovery_cycle: f64,
    pub avg_discovery_latency_s: Option<f64>,
    pub discovery_success_rate: f64,
    pub avg_sync_tries: f64,
    pub avg_acks_received: f64,
    pub sync_success_rate: f64,
    pub avg_success_disc_energy: f64,
    pub avg_sync_energy_per_cycle: f64,
}

/// One entry of a node's neighbor-table summary, as exposed by
/// `Simulation::snapshot`.
#[derive(Copy, Clone, Debug)]
pub struct NeighborSummary {
    pub peer: NodeId,
    pub last_meet_mine: Millis,
    pub last_meet_their: Millis,
    pub next_meet: Option<Millis>,
    pub estimated_drift: f64,
}

/// Everything an external KPI/plotting collaborator needs to read off one
/// node at a checkpoint, without reaching into `Node` internals.
#[derive(Clone, Debug)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kpi: KpiAccumulator,
    pub energy: Joules,
    pub clock_offset_ms: i64,
    pub neighbors: Vec<NeighborSummary>,
}

/// The whole simulated network: a discrete-event `Scheduler`, a `Medium`,
/// and every `Node`. The sole mediator between per-node `Action`s and the
/// shared scheduler/medium.
pub struct Simulation {
    scheduler: Scheduler,
    medium: Medium,
    nodes: Vec<Node>,
    config: SimConfig,
    rng: Xoshiro256StarStar,
}

impl Simulation {
    pub fn new(config: SimConfig, seed: u64) -> Result<Self, SimError> {
        config.validate()?;

        let mut medium = Medium::new(&config);
        let mut nodes: Vec<Node> = (0..config.num_nodes())
            .map(|i| {
                let id = NodeId(i);
                medium.register(id);
                Node::new(id, &config, seed)
            })
            .collect();

        let mut scheduler = Scheduler::new();
        for node in &mut nodes {
            let actions = node.start(&config, scheduler.now());
            schedule_actions(&mut scheduler, node.id, actions);
        }

        Ok(Simulation {
            scheduler,
            medium,
            nodes,
            config,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
        })
    }

    pub fn now(&self) -> Millis {
        self.scheduler.now()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Drain the event queue up to and including `target`, dispatching
    /// every event to the owning node and feeding the resulting `Action`s
    /// back into the scheduler and the medium.
    pub fn run_to(&mut self, target: Millis) {
        let config = &self.config;
        let nodes = &mut self.nodes;
        let medium = &mut self.medium;
        let rng = &mut self.rng;

        self.scheduler.run_to(target, |scheduler, now, event| {
            handle_event(scheduler, nodes, medium, rng, config, now, event);
        });
    }

    /// Run the whole configured calendar (`sim_days` days), invoking
    /// `on_checkpoint` with the checkpoint index and the aggregate row
    /// every `checkpoint_cadence_ms`.
    pub fn run(&mut self, mut on_checkpoint: impl FnMut(u32, CheckpointRow)) {
        let total_ms = self.config.one_day_ms * self.config.sim_days as i64;
        let cadence = self.config.checkpoint_cadence_ms;
        let mut next = cadence;
        let mut checkpoint_index = 0;
        while next <= total_ms {
            self.run_to(Millis(next));
            let row = self.checkpoint_row();
            log::info!(
                "checkpoint {} at {:?}: disc_success={:.1}% sync_success={:.1}%",
                checkpoint_index,
                self.now(),
                row.discovery_success_rate,
                row.sync_success_rate
            );
            on_checkpoint(checkpoint_index, row);
            for node in &mut self.nodes {
                node.advance_clock_checkpoint();
            }
            checkpoint_index += 1;
            next += cadence;
        }
    }

    /// Per-node KPIs and neighbor-table summary, for an external collaborator
    /// that wants more than the aggregated `CheckpointRow`.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.nodes
            .iter()
            .map(|node| NodeSnapshot {
                id: node.id,
                kpi: node.kpi.clone(),
                energy: node.energy.energy(),
                clock_offset_ms: node.clock.offset(),
                neighbors: node
                    .neighbors
                    .peers()
                    .map(|&peer| {
                        let entry = node.neighbors.get(peer).expect("peer came from peers()");
                        NeighborSummary {
                            peer,
                            last_meet_mine: entry.last_meet_mine,
                            last_meet_their: entry.last_meet_their,
                            next_meet: entry.next_meet,
                            estimated_drift: entry.estimate_drift(),
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    /// Aggregate every node's KPI accumulator into one checkpoint row
    /// (unweighted mean across nodes).
    pub fn checkpoint_row(&self) -> CheckpointRow {
        let n = self.nodes.len().max(1) as f64;
        let mut row = CheckpointRow::default();
        let mut latency_sum = 0.0;
        let mut latency_count = 0u32;

        for node in &self.nodes {
            let (e_per_cycle, latency, success_rate) = node.kpi.discovery_kpis();
            row.e_per_discovery_cycle += e_per_cycle;
            row.discovery_success_rate += success_rate;
            row.avg_sync_tries += node.kpi.sync_tries as f64;
            row.avg_acks_received += node.kpi.acks_received as f64;
            row.sync_success_rate += node.kpi.sync_success_pct();
            row.avg_success_disc_energy += node.kpi.success_disc_energy();
            row.avg_sync_energy_per_cycle += node.kpi.sync_e_per_cycle();
            if let Some(latency) = latency {
                latency_sum += latency;
                latency_count += 1;
            }
        }

        row.e_per_discovery_cycle /= n;
        row.discovery_success_rate /= n;
        row.avg_sync_tries /= n;
        row.avg_acks_received /= n;
        row.sync_success_rate /= n;
        row.avg_success_disc_energy /= n;
        row.avg_sync_energy_per_cycle /= n;
        row.avg_discovery_latency_s = if latency_count == 0 {
            None
        } else {
            Some(latency_sum / latency_count as f64)
        };
        row
    }
}

/// Translate one node's `Action`s into scheduled events. Never sees a
/// `Broadcast` action: those only ever come out of `on_radiate`, which
/// `handle_event` processes separately since it also needs the medium.
fn schedule_actions(scheduler: &mut Scheduler, node_id: NodeId, actions: Vec<Action>) {
    for action in actions {
        match action {
            Action::ScheduleCycleWake { at, cycle_id } => {
                scheduler.schedule(at, Event::CycleWake { node: node_id, cycle_id });
            }
            Action::ScheduleListenDeadline { at, listen_epoch } => {
                scheduler.schedule(
                    at,
                    Event::ListenDeadline {
                        node: node_id,
                        listen_epoch,
                    },
                );
            }
            Action::ScheduleTransmitDone { at, packet } => {
                scheduler.schedule(at, Event::TransmitDone { node: node_id, packet });
            }
            Action::ScheduleRadiate { at, packet } => {
                scheduler.schedule(at, Event::Radiate { node: node_id, packet });
            }
            Action::ScheduleReceiveDecoded { at, packet } => {
                scheduler.schedule(
                    at,
                    Event::ReceiveDecoded {
                        receiver: node_id,
                        packet,
                    },
                );
            }
            Action::ScheduleAckReady { at, packet } => {
                scheduler.schedule(at, Event::AckReady { node: node_id, packet });
            }
            Action::Broadcast { .. } => {
                unreachable!("Broadcast only ever comes from on_radiate, handled inline");
            }
        }
    }
}

fn handle_event(
    scheduler: &mut Scheduler,
    nodes: &mut [Node],
    medium: &mut Medium,
    rng: &mut Xoshiro256StarStar,
    config: &SimConfig,
    now: Millis,
    event: Event,
) {
    log::debug!("dispatching {:?} at {:?}", event, now);
    match event {
        Event::CycleWake { node, cycle_id } => {
            let actions = nodes[node.0].on_cycle_wake(cycle_id, now, config);
            schedule_actions(scheduler, node, actions);
        }
        Event::ListenDeadline { node, listen_epoch } => {
            let actions = nodes[node.0].on_listen_deadline(listen_epoch, now, config);
            schedule_actions(scheduler, node, actions);
        }
        Event::TransmitDone { node, packet } => {
            let actions = nodes[node.0].on_transmit_done(packet, now, config);
            schedule_actions(scheduler, node, actions);
        }
        Event::Radiate { node, packet } => {
            let mut follow_up = Vec::new();
            for action in nodes[node.0].on_radiate(packet, now, config) {
                match action {
                    Action::Broadcast { packet } => {
                        let deliveries =
                            medium.broadcast(node, packet, |peer| nodes[peer.0].is_receiving(), rng);
                        for (peer, packet) in deliveries {
                            scheduler.schedule(now, Event::Deliver { receiver: peer, packet });
                        }
                    }
                    other => follow_up.push(other),
                }
            }
            schedule_actions(scheduler, node, follow_up);
        }
        Event::Deliver { receiver, packet } => {
            let actions = nodes[receiver.0].on_deliver(packet, now, config);
            schedule_actions(scheduler, receiver, actions);
        }
        Event::ReceiveDecoded { receiver, packet } => {
            let actions = nodes[receiver.0].on_receive_decoded(packet, now, config);
            schedule_actions(scheduler, receiver, actions);
        }
        Event::AckReady { node, packet } => {
            let actions = nodes[node.0].on_ack_ready(packet, now, config);
            schedule_actions(scheduler, node, actions);
        }
    }
}
