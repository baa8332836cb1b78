//! # Network simulation layer for the wigig 60 GHz core
//!
//! This crate turns the `wigig-core` state machines into a runnable
//! discrete-event simulation:
//!
//! - [`event_queue`]: the virtual-time scheduler (same-time FIFO ordering,
//!   cancellable handles)
//! - [`network`]: stations, the beacon-interval schedule and frame delivery
//! - [`los_channel`]: a closed-form line-of-sight channel for scenarios
//!   without Q-D ray-tracer output
//! - [`traffic`]: OnOff/Bulk application sources
//! - [`fst`]: fast session transfer between the 60 GHz and 5 GHz bands
//! - [`trace`]: beamforming trace CSV sinks

pub mod event_queue;
pub mod fst;
pub mod los_channel;
pub mod network;
pub mod trace;
pub mod traffic;

pub use event_queue::{EventId, EventQueue};
pub use fst::{Band, FstConfig, FstSession};
pub use los_channel::{fspl_db, LosChannel, Position};
pub use network::{
    AllocationConfig, Network, NetworkConfig, SimError, SimResult, Station, StationConfig,
};
pub use trace::BeamformingTraceWriter;
pub use traffic::{TrafficGenerator, TrafficPattern};
