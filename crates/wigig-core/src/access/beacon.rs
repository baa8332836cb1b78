//! Beacon Transmission Interval access
//!
//! The beacon coordinator competes once per BTI slot for the right to send a
//! DMG Beacon. A collision is not retried: the opportunity is simply lost and
//! the next BTI brings a fresh attempt on its own schedule. On a win the MAC
//! is handed the grant and decides the beacon content at that instant; the
//! transmitted frame's Duration field is overridden to the exact remaining
//! BTI time so other stations' NAV reflects when the interval ends, and
//! beacons are never acknowledged or RTS-protected.

use super::txop::{AccessAction, AckPolicy, TxDescriptor};
use crate::types::{FrameHeader, Packet};
use std::time::Duration;
use tracing::debug;

/// Beacon-window access coordinator.
#[derive(Debug, Default)]
pub struct BeaconTxop {
    access_requested: bool,
    grants: u64,
    lost_opportunities: u64,
}

impl BeaconTxop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the medium for this BTI slot. Idempotent: a second call while
    /// a request is outstanding does nothing.
    pub fn perform_cca(&mut self) -> AccessAction {
        if self.access_requested {
            return AccessAction::Idle;
        }
        self.access_requested = true;
        AccessAction::RequestAccess { backoff_slots: 0 }
    }

    /// Contention won: surface the grant. The MAC builds the beacon body for
    /// this exact instant and calls [`transmit_dmg_beacon`](Self::transmit_dmg_beacon).
    pub fn notify_access_granted(&mut self) -> AccessAction {
        self.access_requested = false;
        self.grants += 1;
        AccessAction::BeaconGrant
    }

    /// Contention lost: the beacon opportunity is gone. No retry; the next
    /// BTI re-arms via [`perform_cca`](Self::perform_cca).
    pub fn notify_collision(&mut self) -> AccessAction {
        self.access_requested = false;
        self.lost_opportunities += 1;
        debug!("beacon opportunity lost to collision");
        AccessAction::Idle
    }

    /// Build the beacon transmission: Duration field forced to the remaining
    /// BTI time, no acknowledgment.
    pub fn transmit_dmg_beacon(
        &self,
        body: Packet,
        header: FrameHeader,
        remaining_bti: Duration,
    ) -> AccessAction {
        let mut desc = TxDescriptor::single(body, header, AckPolicy::NoAck);
        desc.duration_override = Some(remaining_bti);
        desc.bounded = Some(remaining_bti);
        AccessAction::Transmit(desc)
    }

    pub fn grants(&self) -> u64 {
        self.grants
    }

    pub fn lost_opportunities(&self) -> u64 {
        self.lost_opportunities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameKind, StationId};

    #[test]
    fn test_perform_cca_is_idempotent() {
        let mut txop = BeaconTxop::new();
        assert!(matches!(
            txop.perform_cca(),
            AccessAction::RequestAccess { backoff_slots: 0 }
        ));
        assert_eq!(txop.perform_cca(), AccessAction::Idle);
    }

    #[test]
    fn test_grant_surfaces_to_mac() {
        let mut txop = BeaconTxop::new();
        txop.perform_cca();
        assert_eq!(txop.notify_access_granted(), AccessAction::BeaconGrant);
        assert_eq!(txop.grants(), 1);
        // The request flag cleared; the next BTI can re-arm.
        assert!(matches!(
            txop.perform_cca(),
            AccessAction::RequestAccess { .. }
        ));
    }

    #[test]
    fn test_collision_is_lost_without_retry() {
        let mut txop = BeaconTxop::new();
        txop.perform_cca();
        assert_eq!(txop.notify_collision(), AccessAction::Idle);
        assert_eq!(txop.lost_opportunities(), 1);
    }

    #[test]
    fn test_beacon_duration_override_and_no_ack() {
        let txop = BeaconTxop::new();
        let header =
            FrameHeader::management(FrameKind::DmgBeacon, StationId(1), StationId(0xFFFF));
        let remaining = Duration::from_micros(420);
        match txop.transmit_dmg_beacon(Packet::new(96, 1), header, remaining) {
            AccessAction::Transmit(desc) => {
                assert_eq!(desc.duration_override, Some(remaining));
                assert_eq!(desc.ack, AckPolicy::NoAck);
                assert_eq!(desc.bounded, Some(remaining));
            }
            other => panic!("expected Transmit, got {other:?}"),
        }
    }
}
