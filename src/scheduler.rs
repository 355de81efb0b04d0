// SPDX-License-Identifier: Apache-2.0

use crate::base_types::{Millis, NodeId};
use crate::packet::Packet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[cfg(test)]
#[path = "unit_tests/scheduler_tests.rs"]
mod scheduler_tests;

/// Every suspension point in the system becomes one of these, scheduled
/// into the min-heap below. There is no real coroutine underneath: a
/// "suspension" is simply "compute the resulting state, schedule the
/// event that resumes it, and return".
#[derive(Debug)]
pub enum Event {
    /// End of the pre-cycle charge wait. `cycle_id` pins this wake to the
    /// cycle decision that scheduled it.
    CycleWake { node: NodeId, cycle_id: u64 },
    /// End of a listen window (first or second half of a cycle).
    /// `listen_epoch` is bumped every time a listen window starts or is
    /// interrupted, so a stale deadline from an interrupted listen is a
    /// no-op when it is eventually popped.
    ListenDeadline { node: NodeId, listen_epoch: u64 },
    /// End of the fixed decode-equivalent cost of transmitting a packet
    /// (the cycle's own DISC/SYNC, a DISC-ACK reply, or an ACK reply —
    /// distinguished by `packet.kind`/`packet.target` at the receiving
    /// end, not by the event itself). Never cancelled.
    TransmitDone { node: NodeId, packet: Packet },
    /// End of the sender-side propagation wait; the packet is now handed
    /// to the medium, which delivers it to every eligible peer at this
    /// same instant, in registration order.
    Radiate { node: NodeId, packet: Packet },
    /// A packet physically arrives at a peer that was in `Receive` state
    /// when the medium accepted the send.
    Deliver { receiver: NodeId, packet: Packet },
    /// End of the fixed decode time paid by the receiver of a packet.
    ReceiveDecoded { receiver: NodeId, packet: Packet },
    /// End of the random jitter before replying to a SYNC with an ACK.
    AckReady { node: NodeId, packet: Packet },
}

/// An event paired with its deadline and an insertion sequence used to
/// break exact-time ties deterministically: ties on `time` resolve in
/// monotonically increasing `seq` order, i.e. insertion order.
struct ScheduledEvent {
    time: Millis,
    seq: u64,
    event: Event,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for ScheduledEvent {}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (Reverse(self.time), Reverse(self.seq)).cmp(&(Reverse(other.time), Reverse(other.seq)))
    }
}
impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The discrete-event core: a min-heap of `(time, seq, event)`, a virtual
/// clock, and nothing else. `run_to` drains events up to (and including)
/// a target time, handing each one to a caller-supplied closure that may
/// itself schedule more events on the same `Scheduler`.
pub struct Scheduler {
    now: Millis,
    next_seq: u64,
    queue: BinaryHeap<ScheduledEvent>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            now: Millis(0),
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn schedule(&mut self, time: Millis, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        log::trace!("scheduling {:?} at {:?} (seq {})", event, time, seq);
        self.queue.push(ScheduledEvent { time, seq, event });
    }

    /// Advance the queue until the next event's time exceeds `target`,
    /// invoking `handler` for every event popped. `handler` receives the
    /// scheduler itself so it may schedule follow-up events; it must not
    /// call `run_to` reentrantly.
    pub fn run_to(&mut self, target: Millis, mut handler: impl FnMut(&mut Scheduler, Millis, Event)) {
        loop {
            let ready = matches!(self.queue.peek(), Some(e) if e.time <= target);
            if !ready {
                break;
            }
            let ScheduledEvent { time, event, .. } = self.queue.pop().unwrap();
            // Events scheduled in the past are fine but never move the clock backwards.
            self.now = std::cmp::max(self.now, time);
            let now = self.now;
            handler(self, now, event);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
