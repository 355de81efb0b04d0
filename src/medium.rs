// SPDX-License-Identifier: Apache-2.0

use crate::base_types::NodeId;
use crate::config::SimConfig;
use crate::packet::Packet;
use rand::Rng;

#[cfg(test)]
#[path = "unit_tests/medium_tests.rs"]
mod medium_tests;

/// The shared broadcast medium. Holds no mutable node state of its own —
/// `Simulation` owns the per-node radio state — so it exposes a pure
/// function from "who is listening" to "who receives". There is no
/// geographic filtering: every registered peer is reachable, gated only on
/// whether it is currently in `Receive` state. The medium applies no delay
/// of its own — the sender already paid the one propagation wait
/// (`Node::propagation_delay`) before handing the packet here — so every
/// eligible peer is delivered at the same instant, in registration order.
pub struct Medium {
    registered: Vec<NodeId>,
    pt_loss: f64,
}

impl Medium {
    pub fn new(config: &SimConfig) -> Self {
        Medium {
            registered: Vec::new(),
            pt_loss: config.pt_loss,
        }
    }

    /// Add a node to the peer set. Delivery order among peers for a given
    /// broadcast follows registration order.
    pub fn register(&mut self, node: NodeId) {
        self.registered.push(node);
    }

    /// For each peer other than `sender` whose current radio state is
    /// `Receive` (as reported by `is_receiving`), independently drop the
    /// packet with probability `pt_loss`; otherwise it is delivered. There
    /// is no retransmission at this layer.
    pub fn broadcast(
        &self,
        sender: NodeId,
        packet: Packet,
        is_receiving: impl Fn(NodeId) -> bool,
        rng: &mut impl Rng,
    ) -> Vec<(NodeId, Packet)> {
        let mut deliveries = Vec::new();
        for &peer in &self.registered {
            if peer == sender || !is_receiving(peer) {
                continue;
            }
            if rng.gen::<f64>() < self.pt_loss {
                continue;
            }
            deliveries.push((peer, packet));
        }
        deliveries
    }
}
