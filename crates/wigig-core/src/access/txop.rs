//! Shared coordinator plumbing and the generic contention (DCF) variant
//!
//! [`AccessCore`] owns what every coordinator needs: the MAC queue, the
//! current-packet slot, the access-requested flag and retry bookkeeping.
//! [`DcfTxop`] layers ordinary DCF semantics on top: request access when a
//! packet arrives, back off with a doubled contention window on collision,
//! delegate retransmission decisions to the remote-station manager.

use crate::mac_queue::{MacQueue, QueuedFrame};
use crate::sim_time::SimTime;
use crate::types::{FrameHeader, Mcs, Packet, StationId, Tid};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

/// How the transmitted frame is to be acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// No acknowledgment expected (beacons, sweep frames).
    NoAck,
    /// Normal ACK.
    Normal,
    /// Covered by a Block-Ack agreement.
    BlockAck,
}

/// A frame (or A-MSDU aggregate) handed to the frame transmitter.
#[derive(Debug, Clone, PartialEq)]
pub struct TxDescriptor {
    /// One entry for a plain MSDU, several for an A-MSDU aggregate.
    pub packets: Vec<Packet>,
    pub header: FrameHeader,
    pub ack: AckPolicy,
    /// Upper bound on the transmission's airtime; the transmitter must not
    /// let fragmentation or duration fields claim more than this.
    pub bounded: Option<Duration>,
    /// Explicit value for the frame's Duration field, overriding the normal
    /// airtime-derived computation (used by DMG beacons to advertise the
    /// remaining BTI).
    pub duration_override: Option<Duration>,
}

impl TxDescriptor {
    pub fn single(packet: Packet, header: FrameHeader, ack: AckPolicy) -> Self {
        Self {
            packets: vec![packet],
            header,
            ack,
            bounded: None,
            duration_override: None,
        }
    }

    /// Total MAC payload bytes across the aggregate.
    pub fn payload_bytes(&self) -> usize {
        self.packets.iter().map(|p| p.size).sum()
    }
}

/// What the caller must do next. Returned by every coordinator entry point;
/// coordinators never call collaborators themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessAction {
    /// Nothing to do.
    Idle,
    /// Ask the medium-access manager for the channel after `backoff_slots`
    /// idle slots.
    RequestAccess { backoff_slots: u32 },
    /// Hand this frame to the frame transmitter.
    Transmit(TxDescriptor),
    /// Resume a transmitter-level suspended transmission byte-exact.
    Resume(TxDescriptor),
    /// A beacon transmission opportunity was won; the MAC decides the beacon
    /// content at this instant.
    BeaconGrant,
    /// An SLS TXOP was won for this peer.
    SlsGrant { peer: StationId, is_feedback: bool },
    /// Establish a Block-Ack agreement before sending more data.
    SendAddba { peer: StationId, tid: Tid },
    /// Resynchronize the receiver's reorder window.
    SendBar {
        peer: StationId,
        tid: Tid,
        starting_seq: u16,
    },
    /// Retry budget exhausted: the packet is dropped, never silently.
    FinalFailure { header: FrameHeader, packet: Packet },
}

/// Retry policy collaborator: decides retransmission and is notified of
/// permanent failures.
pub trait RemoteStationManager {
    /// Whether `dest` should see another retransmission after `retries`
    /// failed attempts.
    fn need_data_retransmission(&mut self, dest: StationId, retries: u8) -> bool;

    /// The retry budget for `dest` is exhausted and the packet is dropped.
    fn report_final_data_failed(&mut self, dest: StationId);

    /// Size threshold above which non-aggregated frames are fragmented.
    fn fragmentation_threshold(&self) -> usize;
}

/// Plain retry-limit policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u8,
    pub fragmentation_threshold: usize,
    final_failures: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u8) -> Self {
        Self {
            max_retries,
            fragmentation_threshold: 2346,
            final_failures: 0,
        }
    }

    pub fn final_failures(&self) -> u64 {
        self.final_failures
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(7)
    }
}

impl RemoteStationManager for RetryPolicy {
    fn need_data_retransmission(&mut self, _dest: StationId, retries: u8) -> bool {
        retries <= self.max_retries
    }

    fn report_final_data_failed(&mut self, _dest: StationId) {
        self.final_failures += 1;
    }

    fn fragmentation_threshold(&self) -> usize {
        self.fragmentation_threshold
    }
}

/// Aggregate coordinator statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStats {
    pub grants: u64,
    pub collisions: u64,
    pub missed_acks: u64,
    pub final_failures: u64,
    pub cancelled: u64,
}

// ── Shared core ─────────────────────────────────────────────────────────────

/// The plumbing every coordinator variant composes: queue, current-packet
/// slot, access-state flag, retry counter.
#[derive(Debug)]
pub struct AccessCore {
    pub queue: MacQueue,
    current: Option<QueuedFrame>,
    access_requested: bool,
    retries: u8,
    stats: AccessStats,
}

impl AccessCore {
    pub fn new(queue: MacQueue) -> Self {
        Self {
            queue,
            current: None,
            access_requested: false,
            retries: 0,
            stats: AccessStats::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn access_requested(&self) -> bool {
        self.access_requested
    }

    pub fn mark_access_requested(&mut self) {
        self.access_requested = true;
    }

    pub fn current(&self) -> Option<&QueuedFrame> {
        self.current.as_ref()
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }

    pub fn bump_retries(&mut self) -> u8 {
        self.retries += 1;
        self.retries
    }

    /// Called on every grant: clears the request flag, pulls a packet into
    /// the current slot if it is empty.
    pub fn on_grant(&mut self, now: SimTime) -> Option<QueuedFrame> {
        self.access_requested = false;
        self.stats.grants += 1;
        if self.current.is_none() {
            self.current = self.queue.dequeue(now);
            self.retries = 0;
        }
        self.current
    }

    /// Install a specific frame as the in-flight transmission.
    pub fn set_current(&mut self, frame: QueuedFrame) {
        self.current = Some(frame);
        self.retries = 0;
    }

    /// The in-flight frame completed (acknowledged or not needing one).
    pub fn complete_current(&mut self) -> Option<QueuedFrame> {
        self.retries = 0;
        self.current.take()
    }

    /// Transmission aborted externally (allocation ended, device off). A
    /// benign path: no failure callback is generated.
    pub fn cancel(&mut self) {
        self.current = None;
        self.access_requested = false;
        self.retries = 0;
        self.stats.cancelled += 1;
    }

    pub fn note_collision(&mut self) {
        self.stats.collisions += 1;
    }

    pub fn note_missed_ack(&mut self) {
        self.stats.missed_acks += 1;
    }

    pub fn note_final_failure(&mut self) {
        self.stats.final_failures += 1;
    }

    pub fn stats(&self) -> AccessStats {
        self.stats
    }
}

// ── Airtime ─────────────────────────────────────────────────────────────────

/// DMG SC preamble + header airtime.
const PHY_OVERHEAD: Duration = Duration::from_nanos(1891 + 582);

/// Airtime of a frame carrying `payload_bytes` at `mcs`, including PHY
/// overhead. Unknown MCS indices fall back to the control rate, which only
/// ever over-estimates the airtime.
pub fn frame_airtime(payload_bytes: usize, mcs: Mcs) -> Duration {
    let rate_bps = mcs.data_rate_mbps().unwrap_or(27.5) * 1e6;
    let secs = (payload_bytes as f64 * 8.0) / rate_bps;
    PHY_OVERHEAD + Duration::from_secs_f64(secs)
}

// ── Generic contention (DCF) variant ────────────────────────────────────────

/// Ordinary contention-based access: request on enqueue, binary exponential
/// backoff on collision, retry policy from the remote-station manager.
#[derive(Debug)]
pub struct DcfTxop {
    core: AccessCore,
    cw_min: u32,
    cw_max: u32,
    cw: u32,
    data_mcs: Mcs,
    rng: StdRng,
}

impl DcfTxop {
    pub fn new(queue: MacQueue, cw_min: u32, cw_max: u32, data_mcs: Mcs, seed: u64) -> Self {
        Self {
            core: AccessCore::new(queue),
            cw_min,
            cw_max,
            cw: cw_min,
            data_mcs,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 802.11ad DCF defaults: CWmin 15, CWmax 1023.
    pub fn with_defaults(seed: u64) -> Self {
        Self::new(MacQueue::with_defaults(), 15, 1023, Mcs(4), seed)
    }

    pub fn core(&self) -> &AccessCore {
        &self.core
    }

    pub fn stats(&self) -> AccessStats {
        self.core.stats()
    }

    fn draw_backoff(&mut self) -> u32 {
        self.rng.gen_range(0..=self.cw)
    }

    /// Enqueue a frame; if the coordinator is idle this also asks for the
    /// medium.
    pub fn queue(&mut self, now: SimTime, packet: Packet, header: FrameHeader) -> AccessAction {
        if !self.core.queue.enqueue(now, packet, header) {
            return AccessAction::Idle;
        }
        self.request_if_pending(now)
    }

    /// Ask for the medium if there is something to send and no request is
    /// already outstanding.
    pub fn request_if_pending(&mut self, now: SimTime) -> AccessAction {
        if self.core.access_requested() {
            return AccessAction::Idle;
        }
        if self.core.is_idle() && self.core.queue.is_empty(now) {
            return AccessAction::Idle;
        }
        self.core.mark_access_requested();
        let backoff_slots = self.draw_backoff();
        AccessAction::RequestAccess { backoff_slots }
    }

    /// Contention won: transmit the in-flight frame, or pull a fresh one.
    pub fn notify_access_granted(&mut self, now: SimTime) -> AccessAction {
        match self.core.on_grant(now) {
            None => AccessAction::Idle,
            Some(frame) => {
                let ack = if frame.header.no_ack {
                    AckPolicy::NoAck
                } else {
                    AckPolicy::Normal
                };
                AccessAction::Transmit(TxDescriptor::single(frame.packet, frame.header, ack))
            }
        }
    }

    /// Contention lost: double the window and go again.
    pub fn notify_collision(&mut self) -> AccessAction {
        self.core.note_collision();
        self.cw = ((self.cw + 1) * 2 - 1).min(self.cw_max);
        let backoff_slots = self.draw_backoff();
        self.core.mark_access_requested();
        AccessAction::RequestAccess { backoff_slots }
    }

    /// An internal (same-device, higher-priority queue) collision is handled
    /// like an external one.
    pub fn notify_internal_collision(&mut self) -> AccessAction {
        self.notify_collision()
    }

    /// ACK timeout. Retransmission is the remote-station manager's call;
    /// past the limit the packet is dropped with notification.
    pub fn missed_ack(&mut self, rsm: &mut dyn RemoteStationManager) -> AccessAction {
        self.core.note_missed_ack();
        let Some(frame) = self.core.current().copied() else {
            return AccessAction::Idle;
        };
        let retries = self.core.bump_retries();
        if rsm.need_data_retransmission(frame.header.dest, retries) {
            debug!(retries, dest = ?frame.header.dest, "retransmitting after missed ACK");
            self.core.mark_access_requested();
            let backoff_slots = self.draw_backoff();
            AccessAction::RequestAccess { backoff_slots }
        } else {
            rsm.report_final_data_failed(frame.header.dest);
            self.core.note_final_failure();
            self.core.complete_current();
            self.cw = self.cw_min;
            // The caller dispatches the failure first, then re-arms with
            // request_if_pending if the queue still holds traffic.
            AccessAction::FinalFailure {
                header: frame.header,
                packet: frame.packet,
            }
        }
    }

    /// ACK received: the frame is done; keep going if more is queued.
    pub fn got_ack(&mut self, now: SimTime) -> AccessAction {
        self.core.complete_current();
        self.cw = self.cw_min;
        self.request_if_pending(now)
    }

    /// Abort without any failure notification.
    pub fn cancel(&mut self) {
        self.core.cancel();
    }

    pub fn data_mcs(&self) -> Mcs {
        self.data_mcs
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
