//! Sector-Level-Sweep TXOP acquisition
//!
//! The coordinator the training logic uses to win short TXOPs, one sweep
//! frame (or one feedback frame) at a time. Pending peers queue FIFO; a
//! feedback request is a single remembered flag, not a queue entry, since at
//! most one feedback exchange is outstanding at once, and it takes priority
//! over sweep requests when access is won. SLS TXOPs are short and frequent,
//! so every attempt resets the contention window and draws a fresh random
//! backoff rather than reusing stale backoff state.

use super::txop::AccessAction;
use crate::types::StationId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::debug;

/// SLS TXOP coordinator.
#[derive(Debug)]
pub struct SlsTxop {
    /// Peers awaiting a sweep TXOP, FIFO.
    pending: VecDeque<StationId>,
    /// At most one outstanding feedback exchange.
    feedback_pending: Option<StationId>,
    access_requested: bool,
    cw: u32,
    rng: StdRng,
    grants: u64,
    collisions: u64,
}

impl SlsTxop {
    /// 802.11ad CWmin for the sweep contention window.
    const CW_MIN: u32 = 15;

    pub fn new(seed: u64) -> Self {
        Self {
            pending: VecDeque::new(),
            feedback_pending: None,
            access_requested: false,
            cw: Self::CW_MIN,
            rng: StdRng::seed_from_u64(seed),
            grants: 0,
            collisions: 0,
        }
    }

    /// Fresh backoff for every attempt: the window is reset first, so a
    /// previous exchange's state never biases this one's timing.
    fn fresh_backoff(&mut self) -> u32 {
        self.cw = Self::CW_MIN;
        self.rng.gen_range(0..=self.cw)
    }

    fn request(&mut self) -> AccessAction {
        if self.access_requested {
            return AccessAction::Idle;
        }
        self.access_requested = true;
        AccessAction::RequestAccess {
            backoff_slots: self.fresh_backoff(),
        }
    }

    /// Ask for an SLS TXOP toward `peer`. Sweep requests queue FIFO;
    /// a feedback request only sets the single pending-feedback flag.
    pub fn obtain_txop(&mut self, peer: StationId, is_feedback: bool) -> AccessAction {
        if is_feedback {
            self.feedback_pending = Some(peer);
        } else {
            self.pending.push_back(peer);
        }
        self.request()
    }

    /// Contention won: feedback first if one is pending, else the next
    /// queued peer.
    pub fn notify_access_granted(&mut self) -> AccessAction {
        self.access_requested = false;
        self.grants += 1;
        if let Some(peer) = self.feedback_pending.take() {
            debug!(?peer, "SLS TXOP granted for feedback");
            return AccessAction::SlsGrant {
                peer,
                is_feedback: true,
            };
        }
        match self.pending.pop_front() {
            Some(peer) => AccessAction::SlsGrant {
                peer,
                is_feedback: false,
            },
            None => AccessAction::Idle,
        }
    }

    /// Contention lost: retry with a fresh window and a fresh draw.
    pub fn notify_collision(&mut self) -> AccessAction {
        self.collisions += 1;
        self.access_requested = false;
        if self.feedback_pending.is_none() && self.pending.is_empty() {
            return AccessAction::Idle;
        }
        self.request()
    }

    /// More work queued? Re-arm after a grant was consumed.
    pub fn request_if_pending(&mut self) -> AccessAction {
        if self.feedback_pending.is_none() && self.pending.is_empty() {
            return AccessAction::Idle;
        }
        self.request()
    }

    pub fn pending_peers(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending_feedback(&self) -> bool {
        self.feedback_pending.is_some()
    }

    pub fn grants(&self) -> u64 {
        self.grants
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_peer_order() {
        let mut txop = SlsTxop::new(1);
        txop.obtain_txop(StationId(5), false);
        txop.obtain_txop(StationId(6), false);
        assert_eq!(txop.pending_peers(), 2);

        assert_eq!(
            txop.notify_access_granted(),
            AccessAction::SlsGrant {
                peer: StationId(5),
                is_feedback: false
            }
        );
        txop.request_if_pending();
        assert_eq!(
            txop.notify_access_granted(),
            AccessAction::SlsGrant {
                peer: StationId(6),
                is_feedback: false
            }
        );
    }

    #[test]
    fn test_feedback_takes_priority() {
        let mut txop = SlsTxop::new(1);
        txop.obtain_txop(StationId(5), false);
        txop.obtain_txop(StationId(9), true);
        assert!(txop.has_pending_feedback());

        assert_eq!(
            txop.notify_access_granted(),
            AccessAction::SlsGrant {
                peer: StationId(9),
                is_feedback: true
            }
        );
        // The sweep request is still queued behind it.
        txop.request_if_pending();
        assert_eq!(
            txop.notify_access_granted(),
            AccessAction::SlsGrant {
                peer: StationId(5),
                is_feedback: false
            }
        );
    }

    #[test]
    fn test_feedback_is_flag_not_queue() {
        let mut txop = SlsTxop::new(1);
        txop.obtain_txop(StationId(3), true);
        txop.obtain_txop(StationId(4), true);
        // Only the latest feedback peer is remembered.
        assert_eq!(
            txop.notify_access_granted(),
            AccessAction::SlsGrant {
                peer: StationId(4),
                is_feedback: true
            }
        );
        assert_eq!(txop.notify_access_granted(), AccessAction::Idle);
    }

    #[test]
    fn test_fresh_backoff_every_attempt() {
        let mut txop = SlsTxop::new(7);
        let mut draws = Vec::new();
        for i in 0..8u16 {
            match txop.obtain_txop(StationId(i), false) {
                AccessAction::RequestAccess { backoff_slots } => draws.push(backoff_slots),
                AccessAction::Idle => {}
                other => panic!("unexpected {other:?}"),
            }
            txop.notify_access_granted();
        }
        // All draws come from the reset CWmin window.
        assert!(draws.iter().all(|&b| b <= SlsTxop::CW_MIN));
        // And they are genuinely random, not a repeated stale value.
        assert!(draws.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_collision_redraws_and_retries() {
        let mut txop = SlsTxop::new(1);
        txop.obtain_txop(StationId(5), false);
        let action = txop.notify_collision();
        assert!(matches!(action, AccessAction::RequestAccess { .. }));
        assert_eq!(txop.collisions(), 1);
        // Peer is still queued.
        assert_eq!(txop.pending_peers(), 1);
    }

    #[test]
    fn test_collision_with_nothing_pending_goes_idle() {
        let mut txop = SlsTxop::new(1);
        assert_eq!(txop.notify_collision(), AccessAction::Idle);
    }
}
