// SPDX-License-Identifier: Apache-2.0

use crate::base_types::{Millis, NodeId};

/// The three message kinds exchanged by the protocol. `target == None` means
/// broadcast; every reception site matches on `kind` exhaustively, so
/// adding a fourth kind is a compile error at every call site until
/// handled.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PacketKind {
    Disc,
    Sync,
    Ack,
}

/// A single in-memory radio message. No wire format is ever produced: this
/// is the record passed directly from sender to medium to receiver.
#[derive(Copy, Clone, Debug)]
pub struct Packet {
    pub kind: PacketKind,
    pub sender: NodeId,
    /// `None` for a broadcast DISC; `Some(_)` for a directed DISC-ACK,
    /// every SYNC, and every ACK.
    pub target: Option<NodeId>,
    /// The sender's local time at the moment of transmission.
    pub sent_at: Millis,
}

impl Packet {
    pub fn disc(sender: NodeId, target: Option<NodeId>, sent_at: Millis) -> Self {
        Packet {
            kind: PacketKind::Disc,
            sender,
            target,
            sent_at,
        }
    }

    pub fn sync(sender: NodeId, target: NodeId, sent_at: Millis) -> Self {
        Packet {
            kind: PacketKind::Sync,
            sender,
            target: Some(target),
            sent_at,
        }
    }

    pub fn ack(sender: NodeId, target: NodeId, sent_at: Millis) -> Self {
        Packet {
            kind: PacketKind::Ack,
            sender,
            target: Some(target),
            sent_at,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }
}
