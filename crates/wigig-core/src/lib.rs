//! # 60 GHz DMG/EDMG Beamforming & Channel-Access Core
//!
//! This crate provides the core state machines and numeric models of an
//! IEEE 802.11ad/ay (DMG/EDMG, 60 GHz) MAC/PHY simulation:
//!
//! - **Codebook / RF chain**: the antenna array/sector/AWV model and the
//!   cursor API beamforming training steps through
//! - **Interference engine**: sweep-line noise accounting and SNR/PER
//!   evaluation for overlapping signals, including per-stream MIMO SNRs
//! - **Error models**: table-driven SNR→BER interpolation for the DMG PHY
//! - **Q-D propagation**: ray-traced multipath projected through the active
//!   antenna patterns into per-subcarrier channel gain
//! - **Channel access**: the coordinator family arbitrating beacon, ATI,
//!   sector-sweep and service-period transmission windows
//! - **Training**: sector-level sweep, beam refinement and MIMO training
//!   state machines
//!
//! ## Control flow
//!
//! ```text
//! traffic → MacQueue → access coordinator ──AccessAction──► frame transmitter
//!                              │                                  │
//!                       Codebook cursor                    Q-D propagation
//!                   (active sector / AWV)                        │
//!                              ▲                          InterferenceEngine
//!                              │                                  │
//!                      training logic ◄────measured SNR───────────┘
//! ```
//!
//! Coordinators and training state machines never invoke collaborators
//! directly: they return typed actions/events the simulation layer
//! dispatches, keeping every state transition unit-testable.

pub mod access;
pub mod codebook;
pub mod error_model;
pub mod interference;
pub mod mac_queue;
pub mod qd_channel;
pub mod sim_time;
pub mod training;
pub mod types;

// Re-export main types
pub use access::{
    AccessAction, AccessCore, AtiTxop, BeaconTxop, BlockAckManager, DcfTxop, RetryPolicy,
    ServicePeriod, ServicePeriodConfig, SlsTxop, TxDescriptor,
};
pub use codebook::{
    ActivePattern, AntennaArray, Awv, Codebook, CodebookConfig, CodebookError, CodebookResult,
    Orientation, PatternShape, RfChain, Sector,
};
pub use error_model::{DmgErrorModel, ErrorModelError, ErrorRateModel, SensitivityModel};
pub use interference::{InterferenceEngine, SignalEvent, SnrPer, TxVector};
pub use mac_queue::{MacQueue, OverflowPolicy};
pub use qd_channel::{QdChannelConfig, QdChannelError, QdChannelId, QdPropagationEngine};
pub use sim_time::SimTime;
pub use training::{
    BrpRefinement, MimoTraining, SectorChoice, SlsInitiator, SlsResponder, SswFeedback, SswFrame,
    TrainingEvent, TrainingRole, TxSectorSweep,
};
pub use types::{
    AllocationId, AllocationKind, AntennaId, AwvId, FrameHeader, FrameKind, Mcs, Packet, SectorId,
    StationId,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::access::{AccessAction, ServicePeriod, SlsTxop, TxDescriptor};
    pub use crate::codebook::{ActivePattern, Codebook, RfChain};
    pub use crate::interference::InterferenceEngine;
    pub use crate::sim_time::SimTime;
    pub use crate::training::{SlsInitiator, SlsResponder, TrainingEvent};
    pub use crate::types::{AntennaId, Mcs, Packet, SectorId, StationId};
}
