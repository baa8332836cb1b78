//! Virtual-time event queue
//!
//! A binary-heap scheduler over [`SimTime`]. Two events scheduled for the
//! same instant fire in the order they were scheduled (FIFO), which matters
//! when a window-expiry deadline races a last-moment access grant. Scheduled
//! events can be cancelled before they fire; cancelling after the fact is an
//! idempotent no-op.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use wigig_core::SimTime;

/// Handle to a scheduled event, usable for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// The virtual-time event queue.
#[derive(Debug)]
pub struct EventQueue<E> {
    heap: BinaryHeap<Reverse<(SimTime, u64)>>,
    payloads: HashMap<u64, E>,
    seq: u64,
    now: SimTime,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            payloads: HashMap::new(),
            seq: 0,
            now: SimTime::ZERO,
        }
    }

    /// Current virtual time: the timestamp of the last popped event.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` at virtual time `at`. Events in the past fire
    /// immediately on the next pop, in scheduling order.
    pub fn schedule(&mut self, at: SimTime, event: E) -> EventId {
        let id = self.seq;
        self.seq += 1;
        self.heap.push(Reverse((at, id)));
        self.payloads.insert(id, event);
        EventId(id)
    }

    /// Cancel a scheduled event. Returns `true` if it had not yet fired;
    /// cancelling a fired or already-cancelled event does nothing.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.payloads.remove(&id.0).is_some()
    }

    /// Pop the next live event, advancing virtual time to its timestamp.
    pub fn pop(&mut self) -> Option<(SimTime, E)> {
        while let Some(Reverse((at, id))) = self.heap.pop() {
            if let Some(event) = self.payloads.remove(&id) {
                self.now = self.now.max(at);
                return Some((at, event));
            }
            // Cancelled entry: skip its heap residue.
        }
        None
    }

    /// Timestamp of the next live event without popping it.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        while let Some(&Reverse((at, id))) = self.heap.peek() {
            if self.payloads.contains_key(&id) {
                return Some(at);
            }
            self.heap.pop();
        }
        None
    }

    pub fn is_empty(&mut self) -> bool {
        self.peek_time().is_none()
    }

    pub fn pending(&self) -> usize {
        self.payloads.len()
    }
}
