//! Bounded MAC transmit queue with lazy TTL eviction
//!
//! A FIFO of `(packet, header, enqueue-timestamp)` entries. Every operation
//! first prunes entries older than the configured maximum delay, so fullness
//! and emptiness are always evaluated against a freshly pruned view. When the
//! queue is still full after pruning, the overflow policy decides whether the
//! head is dropped to make room or the incoming packet is rejected.

use crate::sim_time::SimTime;
use crate::types::{FrameHeader, Packet, StationId, Tid};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// What to do when an enqueue finds the queue full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Remove the head unconditionally, then insert the new packet.
    DropOldest,
    /// Reject the incoming packet; the queue is unchanged.
    DropNewest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::DropNewest
    }
}

/// One queued MAC frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedFrame {
    pub packet: Packet,
    pub header: FrameHeader,
    pub enqueued_at: SimTime,
}

/// Queue occupancy and eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MacQueueStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub expired: u64,
    pub overflow_dropped: u64,
}

/// Bounded FIFO transmit queue.
#[derive(Debug, Clone)]
pub struct MacQueue {
    items: VecDeque<QueuedFrame>,
    max_packets: usize,
    max_delay: Duration,
    policy: OverflowPolicy,
    stats: MacQueueStats,
}

impl MacQueue {
    pub fn new(max_packets: usize, max_delay: Duration, policy: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::with_capacity(max_packets.min(1024)),
            max_packets,
            max_delay,
            policy,
            stats: MacQueueStats::default(),
        }
    }

    /// 500-packet, 500 ms queue: the usual MAC-layer default.
    pub fn with_defaults() -> Self {
        Self::new(500, Duration::from_millis(500), OverflowPolicy::default())
    }

    /// Remove (not merely skip) every entry older than the maximum delay.
    fn prune(&mut self, now: SimTime) {
        while let Some(front) = self.items.front() {
            if now.saturating_since(front.enqueued_at) > self.max_delay {
                self.items.pop_front();
                self.stats.expired += 1;
            } else {
                break;
            }
        }
        // TTL eviction is lazy but must not depend on FIFO position: a
        // same-age entry behind a fresher one is still pruned.
        let before = self.items.len();
        let max_delay = self.max_delay;
        self.items
            .retain(|f| now.saturating_since(f.enqueued_at) <= max_delay);
        self.stats.expired += (before - self.items.len()) as u64;
    }

    /// Insert a frame. Returns `false` when the packet was rejected
    /// (DropNewest policy on a full queue).
    pub fn enqueue(&mut self, now: SimTime, packet: Packet, header: FrameHeader) -> bool {
        self.prune(now);
        if self.items.len() >= self.max_packets {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    self.items.pop_front();
                    self.stats.overflow_dropped += 1;
                }
                OverflowPolicy::DropNewest => {
                    self.stats.overflow_dropped += 1;
                    return false;
                }
            }
        }
        self.items.push_back(QueuedFrame {
            packet,
            header,
            enqueued_at: now,
        });
        self.stats.enqueued += 1;
        true
    }

    pub fn dequeue(&mut self, now: SimTime) -> Option<QueuedFrame> {
        self.prune(now);
        let frame = self.items.pop_front();
        if frame.is_some() {
            self.stats.dequeued += 1;
        }
        frame
    }

    pub fn peek(&mut self, now: SimTime) -> Option<&QueuedFrame> {
        self.prune(now);
        self.items.front()
    }

    /// Remove and return the first frame addressed to `dest` with traffic
    /// class `tid`.
    pub fn dequeue_for(&mut self, now: SimTime, dest: StationId, tid: Tid) -> Option<QueuedFrame> {
        self.prune(now);
        let pos = self
            .items
            .iter()
            .position(|f| f.header.dest == dest && f.header.tid == tid)?;
        let frame = self.items.remove(pos);
        if frame.is_some() {
            self.stats.dequeued += 1;
        }
        frame
    }

    /// Peek at the first frame addressed to `dest`/`tid`.
    pub fn peek_for(&mut self, now: SimTime, dest: StationId, tid: Tid) -> Option<&QueuedFrame> {
        self.prune(now);
        self.items
            .iter()
            .find(|f| f.header.dest == dest && f.header.tid == tid)
    }

    /// Number of queued frames for `dest`/`tid` after pruning.
    pub fn count_for(&mut self, now: SimTime, dest: StationId, tid: Tid) -> usize {
        self.prune(now);
        self.items
            .iter()
            .filter(|f| f.header.dest == dest && f.header.tid == tid)
            .count()
    }

    pub fn is_empty(&mut self, now: SimTime) -> bool {
        self.prune(now);
        self.items.is_empty()
    }

    pub fn len(&mut self, now: SimTime) -> usize {
        self.prune(now);
        self.items.len()
    }

    pub fn stats(&self) -> MacQueueStats {
        self.stats
    }
}
