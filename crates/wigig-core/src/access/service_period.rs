//! Service-Period access with aggregation and Block-Ack
//!
//! Scheduled, contention-free access between two stations during a DTI
//! allocation. On every grant the coordinator first resumes any transmission
//! a previous service period of the same allocation left suspended, then
//! serves Block-Ack retransmissions, then pulls fresh traffic from the
//! per-destination queue, greedily folding packets into an A-MSDU until the
//! size limit rejects one.
//!
//! An allocation may recur across beacon intervals as non-contiguous service
//! periods; in-flight partial state is snapshotted per [`AllocationId`] at SP
//! end and restored byte-exact at the next SP start of the same allocation.
//! Channel time is a hard budget: no transmission is initiated whose bounded
//! duration exceeds what remains of the current SP.

use super::block_ack::BlockAckManager;
use super::txop::{
    frame_airtime, AccessAction, AccessCore, AckPolicy, RemoteStationManager, TxDescriptor,
};
use crate::mac_queue::MacQueue;
use crate::sim_time::SimTime;
use crate::types::{AllocationId, FrameHeader, Mcs, Packet, StationId, Tid};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Service-period policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePeriodConfig {
    /// A-MSDU size ceiling in bytes.
    pub max_amsdu_size: usize,
    /// Queue backlog that triggers an ADDBA handshake.
    pub addba_threshold: usize,
    /// A-MPDU aggregation capability; forces Block-Ack setup and disables
    /// fragmentation.
    pub ampdu_enabled: bool,
    /// Reorder-buffer size requested in ADDBA.
    pub ba_buffer_size: u16,
    /// Per-frame airtime ceiling inside the SP; a frame that would exceed it
    /// is fragmented on time rather than size.
    pub txop_limit: Option<Duration>,
    /// MCS the SP's data transfers use for airtime accounting.
    pub data_mcs: Mcs,
}

impl Default for ServicePeriodConfig {
    fn default() -> Self {
        Self {
            max_amsdu_size: 7935,
            addba_threshold: 2,
            ampdu_enabled: true,
            ba_buffer_size: 64,
            txop_limit: None,
            data_mcs: Mcs(4),
        }
    }
}

/// The active allocation's identity and window.
#[derive(Debug, Clone, Copy)]
struct CurrentAllocation {
    id: AllocationId,
    peer: StationId,
    tid: Tid,
    end: SimTime,
}

/// Service-period statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServicePeriodStats {
    pub transmissions: u64,
    pub aggregated_msdus: u64,
    pub suspensions: u64,
    pub resumptions: u64,
    pub bars_sent: u64,
    pub final_failures: u64,
}

/// Scheduled contention-free access coordinator.
#[derive(Debug)]
pub struct ServicePeriod {
    config: ServicePeriodConfig,
    core: AccessCore,
    block_ack: BlockAckManager,
    /// Destinations gated while an ADDBA handshake is outstanding.
    blocked: HashSet<(StationId, Tid)>,
    /// Snapshot of an interrupted transmission, one slot per allocation.
    suspended: HashMap<AllocationId, TxDescriptor>,
    current_allocation: Option<CurrentAllocation>,
    next_seq: u16,
    stats: ServicePeriodStats,
}

impl ServicePeriod {
    pub fn new(queue: MacQueue, config: ServicePeriodConfig) -> Self {
        Self {
            config,
            core: AccessCore::new(queue),
            block_ack: BlockAckManager::new(),
            blocked: HashSet::new(),
            suspended: HashMap::new(),
            current_allocation: None,
            next_seq: 0,
            stats: ServicePeriodStats::default(),
        }
    }

    pub fn stats(&self) -> ServicePeriodStats {
        self.stats
    }

    pub fn block_ack(&self) -> &BlockAckManager {
        &self.block_ack
    }

    pub fn queue(&mut self) -> &mut MacQueue {
        &mut self.core.queue
    }

    /// Enqueue application traffic for later service periods.
    pub fn enqueue(&mut self, now: SimTime, packet: Packet, header: FrameHeader) -> bool {
        self.core.queue.enqueue(now, packet, header)
    }

    /// Channel time left in the running SP; zero outside any SP.
    pub fn remaining_duration(&self, now: SimTime) -> Duration {
        match self.current_allocation {
            Some(alloc) => alloc.end.saturating_since(now),
            None => Duration::ZERO,
        }
    }

    /// Open a service period for `allocation`. If a previous SP of the same
    /// allocation was interrupted mid-transmission, that transmission is
    /// resumed byte-exact rather than restarted.
    pub fn start_service_period(
        &mut self,
        now: SimTime,
        allocation: AllocationId,
        peer: StationId,
        tid: Tid,
        duration: Duration,
    ) -> AccessAction {
        self.current_allocation = Some(CurrentAllocation {
            id: allocation,
            peer,
            tid,
            end: now + duration,
        });
        debug!(?allocation, ?peer, ?duration, "service period started");
        if let Some(mut desc) = self.suspended.remove(&allocation) {
            let remaining = self.remaining_duration(now);
            let airtime = frame_airtime(desc.payload_bytes(), self.config.data_mcs);
            if airtime > remaining {
                // Still does not fit; keep it parked for the next SP.
                self.suspended.insert(allocation, desc);
                return AccessAction::Idle;
            }
            desc.bounded = Some(remaining);
            self.stats.resumptions += 1;
            self.stats.transmissions += 1;
            return AccessAction::Resume(desc);
        }
        AccessAction::Idle
    }

    /// Close the running SP, snapshotting any in-flight transmission under
    /// its allocation ID for the next recurrence.
    pub fn end_current_service_period(&mut self) {
        if let Some(alloc) = self.current_allocation.take() {
            if let Some(frame) = self.core.complete_current() {
                let desc =
                    TxDescriptor::single(frame.packet, frame.header, AckPolicy::Normal);
                self.suspended.insert(alloc.id, desc);
                self.stats.suspensions += 1;
                debug!(allocation = ?alloc.id, "in-flight transmission suspended at SP end");
            }
        }
    }

    /// Fragmentation decision for a frame of `payload_bytes`. Aggregation or
    /// an established Block-Ack agreement rules fragmentation out entirely;
    /// otherwise it triggers on the size threshold, or on airtime against
    /// the SP's TXOP limit.
    pub fn need_fragmentation(
        &self,
        payload_bytes: usize,
        peer: StationId,
        tid: Tid,
        rsm: &dyn RemoteStationManager,
    ) -> bool {
        if self.config.ampdu_enabled || self.block_ack.is_established(peer, tid) {
            return false;
        }
        if let Some(limit) = self.config.txop_limit {
            if frame_airtime(payload_bytes, self.config.data_mcs) > limit {
                return true;
            }
        }
        payload_bytes > rsm.fragmentation_threshold()
    }

    /// Grant processing. Order is fixed: Block-Ack retransmissions first,
    /// then fresh traffic. Never initiates a transmission whose airtime
    /// exceeds the remaining SP budget.
    pub fn notify_access_granted(
        &mut self,
        now: SimTime,
        rsm: &mut dyn RemoteStationManager,
    ) -> AccessAction {
        let Some(alloc) = self.current_allocation else {
            return AccessAction::Idle;
        };
        let remaining = self.remaining_duration(now);
        if remaining.is_zero() {
            return AccessAction::Idle;
        }

        // 1. Pending Block-Ack retransmission.
        if self.block_ack.has_packets_to_retry(alloc.peer, alloc.tid) {
            if let Some((seq, packet)) = self.block_ack.next_retry(alloc.peer, alloc.tid) {
                let airtime = frame_airtime(packet.size, self.config.data_mcs);
                if airtime > remaining {
                    // Put it back; next SP gets it.
                    self.block_ack
                        .notify_mpdu_sent(alloc.peer, alloc.tid, seq, packet);
                    return AccessAction::Idle;
                }
                let header = FrameHeader::data(StationId(0), alloc.peer, alloc.tid, seq);
                let mut desc = TxDescriptor::single(packet, header, AckPolicy::BlockAck);
                desc.bounded = Some(remaining);
                self.block_ack
                    .notify_mpdu_sent(alloc.peer, alloc.tid, seq, packet);
                self.stats.transmissions += 1;
                return AccessAction::Transmit(desc);
            }
        }

        // 2. Backpressure: nothing new while the ADDBA handshake is out.
        if self.blocked.contains(&(alloc.peer, alloc.tid)) {
            return AccessAction::Idle;
        }

        // 3. Data-driven Block-Ack setup.
        let queued = self.core.queue.count_for(now, alloc.peer, alloc.tid);
        if self.block_ack.need_setup(
            alloc.peer,
            alloc.tid,
            queued,
            self.config.addba_threshold,
            self.config.ampdu_enabled,
        ) && queued > 0
        {
            self.block_ack.create_agreement(
                alloc.peer,
                alloc.tid,
                self.next_seq,
                self.config.ba_buffer_size,
            );
            self.blocked.insert((alloc.peer, alloc.tid));
            return AccessAction::SendAddba {
                peer: alloc.peer,
                tid: alloc.tid,
            };
        }

        // 4. Fresh traffic, greedily aggregated.
        let Some(first) = self.core.queue.dequeue_for(now, alloc.peer, alloc.tid) else {
            return AccessAction::Idle;
        };
        self.core.set_current(first);

        let mut packets = vec![first.packet];
        let mut total = first.packet.size;
        loop {
            let Some(next) = self.core.queue.peek_for(now, alloc.peer, alloc.tid) else {
                break;
            };
            let candidate = total + next.packet.size;
            // First rejection ends the aggregate: greedy, not optimal.
            if candidate > self.config.max_amsdu_size {
                break;
            }
            if frame_airtime(candidate, self.config.data_mcs) > remaining {
                break;
            }
            let next = self
                .core
                .queue
                .dequeue_for(now, alloc.peer, alloc.tid)
                .expect("peeked frame vanished");
            packets.push(next.packet);
            total += next.packet.size;
        }

        if frame_airtime(total, self.config.data_mcs) > remaining {
            // Not even the head packet fits this SP: park it as the current
            // frame; SP end will snapshot it for the allocation's next
            // recurrence.
            debug!(remaining_us = remaining.as_micros(), "frame deferred, SP budget too small");
            return AccessAction::Idle;
        }

        let established = self.block_ack.is_established(alloc.peer, alloc.tid);
        let ack = if established {
            AckPolicy::BlockAck
        } else {
            AckPolicy::Normal
        };
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        let header = FrameHeader::data(first.header.source, alloc.peer, alloc.tid, seq);
        if established {
            for packet in &packets {
                self.block_ack
                    .notify_mpdu_sent(alloc.peer, alloc.tid, seq, *packet);
            }
        }
        self.stats.transmissions += 1;
        self.stats.aggregated_msdus += packets.len() as u64 - 1;
        let mut desc = TxDescriptor {
            packets,
            header,
            ack,
            bounded: Some(remaining),
            duration_override: None,
        };
        if self.need_fragmentation(total, alloc.peer, alloc.tid, rsm) {
            // Time- or size-based fragmentation: tighten the bound so the
            // transmitter splits the frame to fit it.
            let limit = self.config.txop_limit.unwrap_or(remaining);
            desc.bounded = Some(remaining.min(limit));
        }
        AccessAction::Transmit(desc)
    }

    /// Normal ACK received for the in-flight frame.
    pub fn got_ack(&mut self) {
        self.core.complete_current();
    }

    /// Block-Ack response received: update the agreement and drop the
    /// current-frame slot.
    pub fn got_block_ack(&mut self, peer: StationId, tid: Tid, acked: &[u16]) -> Vec<u16> {
        self.core.complete_current();
        self.block_ack.on_block_ack(peer, tid, acked)
    }

    /// ADDBA response arrived: lift the backpressure either way.
    pub fn on_addba_response(&mut self, peer: StationId, tid: Tid, success: bool) {
        self.block_ack.on_addba_response(peer, tid, success);
        self.blocked.remove(&(peer, tid));
    }

    /// ACK/BlockAck timeout. Past the retry limit the frame is dropped with
    /// notification; within it, an established agreement answers with an
    /// explicit Block-Ack-Request to resynchronize the receiver's reorder
    /// window rather than blindly retransmitting.
    pub fn missed_ack(
        &mut self,
        now: SimTime,
        rsm: &mut dyn RemoteStationManager,
    ) -> AccessAction {
        let Some(alloc) = self.current_allocation else {
            return AccessAction::Idle;
        };
        let Some(frame) = self.core.current().copied() else {
            return AccessAction::Idle;
        };
        let retries = self.core.bump_retries();
        if !rsm.need_data_retransmission(alloc.peer, retries) {
            rsm.report_final_data_failed(alloc.peer);
            self.core.complete_current();
            self.stats.final_failures += 1;
            return AccessAction::FinalFailure {
                header: frame.header,
                packet: frame.packet,
            };
        }
        if self.block_ack.is_established(alloc.peer, alloc.tid) {
            let starting_seq = self
                .block_ack
                .agreement(alloc.peer, alloc.tid)
                .map(|a| a.starting_seq)
                .unwrap_or(0);
            self.stats.bars_sent += 1;
            return AccessAction::SendBar {
                peer: alloc.peer,
                tid: alloc.tid,
                starting_seq,
            };
        }
        // Plain retransmission, still bounded by the SP budget.
        let remaining = self.remaining_duration(now);
        if frame_airtime(frame.packet.size, self.config.data_mcs) > remaining {
            return AccessAction::Idle;
        }
        let mut desc = TxDescriptor::single(frame.packet, frame.header, AckPolicy::Normal);
        desc.bounded = Some(remaining);
        self.stats.transmissions += 1;
        AccessAction::Transmit(desc)
    }

    /// External abort: allocation was truncated. No failure is reported.
    pub fn cancel(&mut self) {
        self.core.cancel();
        self.current_allocation = None;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
