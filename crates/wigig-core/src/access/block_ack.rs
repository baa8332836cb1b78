//! Block-Ack agreement tracking
//!
//! Per-(peer, TID) agreement state for A-MPDU transfers: the ADDBA handshake
//! (`Pending` until the response arrives, then `Established`), the set of
//! transmitted-but-unacknowledged sequence numbers, and the retry set a
//! Block-Ack response leaves behind.

use crate::types::{Packet, StationId, Tid};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Agreement lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgreementState {
    /// ADDBA request sent, response outstanding.
    Pending,
    /// Agreement in force; data may use Block-Ack policy.
    Established,
}

/// One (peer, TID) agreement.
#[derive(Debug, Clone)]
pub struct BlockAckAgreement {
    pub state: AgreementState,
    /// Left edge of the transmit window.
    pub starting_seq: u16,
    /// Reorder-buffer size granted by the recipient.
    pub buffer_size: u16,
    /// Sent, not yet acknowledged.
    in_flight: BTreeMap<u16, Packet>,
    /// Acknowledgment came back negative (or never came): retransmit these.
    retry: BTreeMap<u16, Packet>,
}

impl BlockAckAgreement {
    fn new(starting_seq: u16, buffer_size: u16) -> Self {
        Self {
            state: AgreementState::Pending,
            starting_seq,
            buffer_size,
            in_flight: BTreeMap::new(),
            retry: BTreeMap::new(),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn retry_count(&self) -> usize {
        self.retry.len()
    }
}

/// The per-station Block-Ack manager.
#[derive(Debug, Default)]
pub struct BlockAckManager {
    agreements: HashMap<(StationId, Tid), BlockAckAgreement>,
}

impl BlockAckManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy decision: start an ADDBA handshake once the queue backlog for
    /// the pair crosses `threshold`, or unconditionally when aggregation is
    /// in play — in both cases only if no agreement exists yet.
    pub fn need_setup(
        &self,
        peer: StationId,
        tid: Tid,
        queued: usize,
        threshold: usize,
        aggregation: bool,
    ) -> bool {
        if self.agreements.contains_key(&(peer, tid)) {
            return false;
        }
        aggregation || queued >= threshold
    }

    /// Record the outgoing ADDBA request: the agreement is `Pending` until
    /// the response resolves it.
    pub fn create_agreement(
        &mut self,
        peer: StationId,
        tid: Tid,
        starting_seq: u16,
        buffer_size: u16,
    ) {
        debug!(?peer, tid, starting_seq, "ADDBA requested");
        self.agreements
            .insert((peer, tid), BlockAckAgreement::new(starting_seq, buffer_size));
    }

    /// ADDBA response arrived. A rejection tears the agreement down; data
    /// falls back to normal acknowledgment.
    pub fn on_addba_response(&mut self, peer: StationId, tid: Tid, success: bool) {
        if success {
            if let Some(agreement) = self.agreements.get_mut(&(peer, tid)) {
                agreement.state = AgreementState::Established;
            }
        } else {
            self.agreements.remove(&(peer, tid));
        }
    }

    pub fn agreement(&self, peer: StationId, tid: Tid) -> Option<&BlockAckAgreement> {
        self.agreements.get(&(peer, tid))
    }

    pub fn is_established(&self, peer: StationId, tid: Tid) -> bool {
        matches!(
            self.agreements.get(&(peer, tid)).map(|a| a.state),
            Some(AgreementState::Established)
        )
    }

    /// Record an MPDU handed to the transmitter under this agreement.
    pub fn notify_mpdu_sent(&mut self, peer: StationId, tid: Tid, seq: u16, packet: Packet) {
        if let Some(agreement) = self.agreements.get_mut(&(peer, tid)) {
            agreement.in_flight.insert(seq, packet);
        }
    }

    /// Process a Block-Ack response: acknowledged sequences clear, anything
    /// still in flight below the window edge moves to the retry set.
    /// Returns the sequence numbers newly marked for retry.
    pub fn on_block_ack(&mut self, peer: StationId, tid: Tid, acked: &[u16]) -> Vec<u16> {
        let Some(agreement) = self.agreements.get_mut(&(peer, tid)) else {
            return Vec::new();
        };
        for seq in acked {
            agreement.in_flight.remove(seq);
            agreement.retry.remove(seq);
        }
        // Everything sent but not covered by this response needs retry.
        let missing: Vec<u16> = agreement.in_flight.keys().copied().collect();
        for seq in &missing {
            if let Some(packet) = agreement.in_flight.remove(seq) {
                agreement.retry.insert(*seq, packet);
            }
        }
        // Advance the window edge past the highest acknowledged sequence.
        if let Some(&high) = acked.iter().max() {
            agreement.starting_seq = agreement.starting_seq.max(high.wrapping_add(1));
        }
        missing
    }

    /// Whether any retransmission is pending for the pair.
    pub fn has_packets_to_retry(&self, peer: StationId, tid: Tid) -> bool {
        self.agreements
            .get(&(peer, tid))
            .map(|a| !a.retry.is_empty())
            .unwrap_or(false)
    }

    /// Pop the lowest-sequence retry candidate.
    pub fn next_retry(&mut self, peer: StationId, tid: Tid) -> Option<(u16, Packet)> {
        let agreement = self.agreements.get_mut(&(peer, tid))?;
        let seq = *agreement.retry.keys().next()?;
        let packet = agreement.retry.remove(&seq)?;
        Some((seq, packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: StationId = StationId(4);
    const TID: Tid = 2;

    #[test]
    fn test_setup_policy_threshold_and_aggregation() {
        let manager = BlockAckManager::new();
        assert!(!manager.need_setup(PEER, TID, 1, 3, false));
        assert!(manager.need_setup(PEER, TID, 3, 3, false));
        // Aggregation forces setup regardless of backlog.
        assert!(manager.need_setup(PEER, TID, 0, 3, true));
    }

    #[test]
    fn test_no_duplicate_setup() {
        let mut manager = BlockAckManager::new();
        manager.create_agreement(PEER, TID, 0, 64);
        assert!(!manager.need_setup(PEER, TID, 100, 3, true));
    }

    #[test]
    fn test_pending_to_established() {
        let mut manager = BlockAckManager::new();
        manager.create_agreement(PEER, TID, 0, 64);
        assert_eq!(
            manager.agreement(PEER, TID).unwrap().state,
            AgreementState::Pending
        );
        assert!(!manager.is_established(PEER, TID));
        manager.on_addba_response(PEER, TID, true);
        assert!(manager.is_established(PEER, TID));
    }

    #[test]
    fn test_rejected_addba_tears_down() {
        let mut manager = BlockAckManager::new();
        manager.create_agreement(PEER, TID, 0, 64);
        manager.on_addba_response(PEER, TID, false);
        assert!(manager.agreement(PEER, TID).is_none());
        // A later backlog can trigger a fresh attempt.
        assert!(manager.need_setup(PEER, TID, 5, 3, false));
    }

    #[test]
    fn test_block_ack_moves_unacked_to_retry() {
        let mut manager = BlockAckManager::new();
        manager.create_agreement(PEER, TID, 0, 64);
        manager.on_addba_response(PEER, TID, true);
        for seq in 0..4u16 {
            manager.notify_mpdu_sent(PEER, TID, seq, Packet::new(100, seq as u64));
        }

        let missing = manager.on_block_ack(PEER, TID, &[0, 2]);
        assert_eq!(missing, vec![1, 3]);
        assert!(manager.has_packets_to_retry(PEER, TID));
        assert_eq!(manager.agreement(PEER, TID).unwrap().retry_count(), 2);
        assert_eq!(manager.agreement(PEER, TID).unwrap().starting_seq, 3);

        // Retries pop in sequence order.
        let (seq, packet) = manager.next_retry(PEER, TID).unwrap();
        assert_eq!((seq, packet.uid), (1, 1));
        let (seq, _) = manager.next_retry(PEER, TID).unwrap();
        assert_eq!(seq, 3);
        assert!(!manager.has_packets_to_retry(PEER, TID));
    }

    #[test]
    fn test_retried_then_acked_clears() {
        let mut manager = BlockAckManager::new();
        manager.create_agreement(PEER, TID, 0, 64);
        manager.on_addba_response(PEER, TID, true);
        manager.notify_mpdu_sent(PEER, TID, 0, Packet::new(100, 0));
        manager.on_block_ack(PEER, TID, &[]);
        assert!(manager.has_packets_to_retry(PEER, TID));

        // The retransmission goes out and this time is acknowledged.
        let (seq, packet) = manager.next_retry(PEER, TID).unwrap();
        manager.notify_mpdu_sent(PEER, TID, seq, packet);
        manager.on_block_ack(PEER, TID, &[seq]);
        assert!(!manager.has_packets_to_retry(PEER, TID));
        assert_eq!(manager.agreement(PEER, TID).unwrap().in_flight_count(), 0);
    }
}
