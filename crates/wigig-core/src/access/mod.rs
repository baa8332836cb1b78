//! Channel-access coordinators
//!
//! State machines that arbitrate when a station may transmit. All variants
//! share one plumbing core ([`txop::AccessCore`]) and differ in what they do
//! when contention is won, lost, or a window expires:
//!
//! - [`txop::DcfTxop`] — ordinary contention (DCF) access with binary
//!   exponential backoff.
//! - [`beacon::BeaconTxop`] — DMG Beacon transmission window access: one
//!   attempt per BTI, collisions are simply lost.
//! - [`ati::AtiTxop`] — Announcement Transmission Interval access with a
//!   hard window deadline and bounded-duration transmissions.
//! - [`sls::SlsTxop`] — short TXOP acquisition for sector-sweep and feedback
//!   frames, with a fresh random backoff on every attempt.
//! - [`service_period::ServicePeriod`] — scheduled contention-free access
//!   with aggregation, Block-Ack and cross-SP suspend/resume.
//!
//! Coordinators never invoke collaborators directly: every notification
//! returns a typed [`txop::AccessAction`] the caller dispatches. Failure is
//! an action, not an error; [`txop::AccessAction::FinalFailure`] is the only
//! way a packet is dropped, so drops are always surfaced.

pub mod ati;
pub mod beacon;
pub mod block_ack;
pub mod service_period;
pub mod sls;
pub mod txop;

pub use ati::AtiTxop;
pub use beacon::BeaconTxop;
pub use block_ack::{AgreementState, BlockAckAgreement, BlockAckManager};
pub use service_period::{ServicePeriod, ServicePeriodConfig};
pub use sls::SlsTxop;
pub use txop::{
    frame_airtime, AccessAction, AccessCore, AccessStats, AckPolicy, DcfTxop, RemoteStationManager,
    RetryPolicy, TxDescriptor,
};
