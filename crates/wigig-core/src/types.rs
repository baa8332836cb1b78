//! Core types for the 60 GHz DMG/EDMG simulation library
//!
//! This module defines the fundamental identifiers and unit conversions used
//! throughout the library: antenna/sector/AWV identifiers, station addresses,
//! DMG MCS entries, allocation descriptors, and dB/linear helpers.
//!
//! ## Identifier conventions
//!
//! IEEE 802.11ad numbers antennas and sectors starting from 1 in management
//! frames; this library keeps that convention in the public identifiers
//! (`AntennaId`, `SectorId`) while using zero-based indices internally for
//! vector addressing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one phased antenna array within a station (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AntennaId(pub u8);

/// Identifier of one directional sector within an antenna array (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SectorId(pub u8);

/// Identifier of one custom AWV refinement within a sector (0-based, list order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AwvId(pub u8);

/// Station address within a simulated BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId(pub u16);

impl fmt::Display for AntennaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STA{}", self.0)
    }
}

/// Traffic identifier (QoS TID), 0..=7 for user priorities.
pub type Tid = u8;

/// DMG MCS index (single-carrier and control PHY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mcs(pub u8);

impl Mcs {
    /// Control PHY MCS used for beacons, SSW frames and PHY headers.
    pub const CONTROL: Mcs = Mcs(0);

    /// PHY data rate in Mb/s for the DMG control and single-carrier MCS set.
    ///
    /// Returns `None` for indices outside the SC MCS table (0..=12).
    pub fn data_rate_mbps(&self) -> Option<f64> {
        // IEEE 802.11ad Table 21-14/21-18 (control + SC PHY).
        const RATES: [f64; 13] = [
            27.5, 385.0, 770.0, 962.5, 1155.0, 1251.25, 1540.0, 1925.0, 2310.0, 2502.5, 3080.0,
            3850.0, 4620.0,
        ];
        RATES.get(self.0 as usize).copied()
    }
}

/// Scheduled channel-time unit within the Data Transfer Interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllocationId(pub u8);

/// Kind of a DTI allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationKind {
    /// Contention-free, scheduled service period between two stations.
    ServicePeriod,
    /// Contention-based access period (EDCA/DCF inside the window).
    Cbap,
}

/// A simulated MAC payload. Only the size matters to the MAC/PHY model;
/// the `uid` lets higher layers correlate delivery notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Payload size in bytes.
    pub size: usize,
    /// Unique packet identifier assigned by the creator.
    pub uid: u64,
}

impl Packet {
    pub fn new(size: usize, uid: u64) -> Self {
        Self { size, uid }
    }
}

/// MAC frame classes the access coordinators distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    Data,
    QosData,
    Management,
    DmgBeacon,
    SectorSweep,
    SectorSweepFeedback,
    BlockAckRequest,
    Addba,
}

/// The subset of a MAC header the coordinators care about. Wire-format bit
/// layout is out of scope; this is a plain record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub kind: FrameKind,
    pub source: StationId,
    pub dest: StationId,
    pub tid: Tid,
    pub seq: u16,
    /// When true the frame must not be acknowledged (beacons, sweep frames).
    pub no_ack: bool,
}

impl FrameHeader {
    pub fn data(source: StationId, dest: StationId, tid: Tid, seq: u16) -> Self {
        Self {
            kind: FrameKind::QosData,
            source,
            dest,
            tid,
            seq,
            no_ack: false,
        }
    }

    pub fn management(kind: FrameKind, source: StationId, dest: StationId) -> Self {
        Self {
            kind,
            source,
            dest,
            tid: 0,
            seq: 0,
            no_ack: true,
        }
    }
}

// ── dB / linear conversions ─────────────────────────────────────────────────

/// Convert a power ratio in dB to linear scale.
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Convert a linear power ratio to dB. Zero and negative inputs map to -inf.
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        10.0 * linear.log10()
    }
}

/// Convert a power in dBm to watts.
#[inline]
pub fn dbm_to_watts(dbm: f64) -> f64 {
    10.0_f64.powf((dbm - 30.0) / 10.0)
}

/// Convert a power in watts to dBm.
#[inline]
pub fn watts_to_dbm(watts: f64) -> f64 {
    if watts <= 0.0 {
        f64::NEG_INFINITY
    } else {
        10.0 * watts.log10() + 30.0
    }
}

/// Amplitude (voltage) gain for a dB figure, `10^(dB/20)`.
#[inline]
pub fn db_to_amplitude(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}
