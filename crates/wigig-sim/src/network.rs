//! Multi-station network simulation
//!
//! Wires the core components into a running BSS: one AP and its stations,
//! the beacon-interval schedule (BTI → A-BFT → ATI → DTI), frame delivery
//! through the channel and interference engines, and application traffic
//! feeding the service-period coordinators.
//!
//! ## Beacon interval
//!
//! ```text
//! |--- BTI ---|--- A-BFT ---|--- ATI ---|---------- DTI ----------|
//!  AP sector    STA sweeps    AP mgmt     scheduled allocations
//!  sweep        + feedback    exchange    (service periods, CBAP)
//! ```
//!
//! The AP performs its transmit sector sweep in the BTI while stations
//! listen quasi-omni; stations answer in A-BFT slots (responder sweeps plus
//! the AP's feedback), completing one SLS exchange per direction. Data flows
//! in DTI service periods using the trained sectors.

use crate::event_queue::EventQueue;
use crate::los_channel::{LosChannel, Position};
use crate::trace::BeamformingTraceWriter;
use crate::traffic::TrafficGenerator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};
use wigig_core::access::{
    frame_airtime, AccessAction, AtiTxop, BeaconTxop, RetryPolicy, ServicePeriod,
    ServicePeriodConfig, SlsTxop,
};
use wigig_core::codebook::CodebookError;
use wigig_core::error_model::{ErrorModelError, ErrorRateModel, SensitivityModel};
use wigig_core::interference::{InterferenceEngine, TxVector};
use wigig_core::mac_queue::MacQueue;
use wigig_core::training::{SlsInitiator, SlsResponder, TrainingEvent};
use wigig_core::types::{
    AllocationId, AllocationKind, FrameHeader, FrameKind, Mcs, Packet, StationId,
};
use wigig_core::{Codebook, SimTime};

/// Result type for simulation runs.
pub type SimResult<T> = Result<T, SimError>;

/// Simulation-layer failures: all configuration errors surfaced from the
/// core during scenario setup or dispatch.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("codebook error: {0}")]
    Codebook(#[from] CodebookError),

    #[error("error model: {0}")]
    ErrorModel(#[from] ErrorModelError),

    #[error("trace sink: {0}")]
    Trace(#[from] std::io::Error),

    #[error("unknown station {0}")]
    UnknownStation(StationId),
}

/// Per-station scenario description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: StationId,
    pub position: (f64, f64),
    pub num_antennas: usize,
    pub sectors_per_antenna: usize,
    pub awvs_per_sector: usize,
}

impl StationConfig {
    pub fn new(id: StationId, position: (f64, f64), sectors: usize) -> Self {
        Self {
            id,
            position,
            num_antennas: 1,
            sectors_per_antenna: sectors,
            awvs_per_sector: 0,
        }
    }
}

/// One DTI allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub id: AllocationId,
    pub kind: AllocationKind,
    pub source: StationId,
    pub destination: StationId,
    /// Offset of the SP start into the DTI.
    pub offset: Duration,
    pub duration: Duration,
}

/// Network-wide scenario parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub beacon_interval: Duration,
    /// Spacing between consecutive sweep frames.
    pub frame_spacing: Duration,
    pub ati_duration: Duration,
    pub tx_power_dbm: f64,
    pub noise_figure_db: f64,
    pub frequency_hz: f64,
    pub data_mcs: Mcs,
    pub sifs: Duration,
    pub allocations: Vec<AllocationConfig>,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            beacon_interval: Duration::from_millis(100),
            frame_spacing: Duration::from_micros(1),
            ati_duration: Duration::from_micros(500),
            tx_power_dbm: 10.0,
            noise_figure_db: 10.0,
            frequency_hz: 60.48e9,
            data_mcs: Mcs(4),
            sifs: Duration::from_micros(3),
            allocations: Vec::new(),
            seed: 1,
        }
    }
}

/// One simulated station.
pub struct Station {
    pub id: StationId,
    pub position: Position,
    pub codebook: Codebook,
    pub beacon_txop: BeaconTxop,
    pub sls_txop: SlsTxop,
    pub ati_txop: AtiTxop,
    pub service_period: ServicePeriod,
    pub retry: RetryPolicy,
    pub interference: InterferenceEngine,
    initiators: Vec<(StationId, SlsInitiator)>,
    responders: Vec<(StationId, SlsResponder)>,
    traffic: Option<(StationId, TrafficGenerator)>,
    pub delivered_bytes: u64,
    pub delivered_packets: u64,
    pub dropped_packets: u64,
}

impl Station {
    fn build(config: &StationConfig, net: &NetworkConfig) -> SimResult<Self> {
        let codebook = Codebook::uniform(
            config.num_antennas,
            config.sectors_per_antenna,
            config.awvs_per_sector,
        )?;
        Ok(Self {
            id: config.id,
            position: Position::new(config.position.0, config.position.1),
            codebook,
            beacon_txop: BeaconTxop::new(),
            sls_txop: SlsTxop::new(net.seed ^ config.id.0 as u64),
            ati_txop: AtiTxop::new(MacQueue::with_defaults()),
            service_period: ServicePeriod::new(
                MacQueue::with_defaults(),
                ServicePeriodConfig {
                    data_mcs: net.data_mcs,
                    ..Default::default()
                },
            ),
            retry: RetryPolicy::default(),
            interference: InterferenceEngine::new(net.noise_figure_db),
            initiators: Vec::new(),
            responders: Vec::new(),
            traffic: None,
            delivered_bytes: 0,
            delivered_packets: 0,
            dropped_packets: 0,
        })
    }

    fn initiator_for(&mut self, peer: StationId) -> &mut SlsInitiator {
        if let Some(pos) = self.initiators.iter().position(|(p, _)| *p == peer) {
            return &mut self.initiators[pos].1;
        }
        let initiator = SlsInitiator::new(self.id, peer, &self.codebook);
        self.initiators.push((peer, initiator));
        &mut self.initiators.last_mut().unwrap().1
    }

    fn responder_for(&mut self, peer: StationId) -> &mut SlsResponder {
        if let Some(pos) = self.responders.iter().position(|(p, _)| *p == peer) {
            return &mut self.responders[pos].1;
        }
        let responder = SlsResponder::new(self.id, peer, &self.codebook);
        self.responders.push((peer, responder));
        &mut self.responders.last_mut().unwrap().1
    }
}

#[derive(Debug, Clone, Copy)]
enum NetEvent {
    BeaconInterval,
    Abft,
    Ati,
    Dti,
    ServicePeriodStart { index: usize },
    ServicePeriodEnd { index: usize },
    TrafficWindow,
    End,
}

/// The running network. Station 0 is the AP/PCP.
pub struct Network {
    pub config: NetworkConfig,
    stations: Vec<Station>,
    channel: LosChannel,
    error_model: SensitivityModel,
    events: EventQueue<NetEvent>,
    trained: HashSet<(StationId, StationId)>,
    training_log: Vec<(SimTime, StationId, TrainingEvent)>,
    trace: Option<BeamformingTraceWriter>,
    bft_counter: u64,
    end_at: SimTime,
    next_uid: u64,
}

impl Network {
    pub fn new(config: NetworkConfig, station_configs: &[StationConfig]) -> SimResult<Self> {
        let mut stations = Vec::with_capacity(station_configs.len());
        for sc in station_configs {
            stations.push(Station::build(sc, &config)?);
        }
        let channel = LosChannel::new(config.frequency_hz);
        Ok(Self {
            config,
            stations,
            channel,
            error_model: SensitivityModel::dmg_defaults(),
            events: EventQueue::new(),
            trained: HashSet::new(),
            training_log: Vec::new(),
            trace: None,
            bft_counter: 0,
            end_at: SimTime::ZERO,
            next_uid: 1,
        })
    }

    /// Attach the beamforming trace CSV sinks.
    pub fn with_trace_dir(mut self, dir: &std::path::Path) -> SimResult<Self> {
        self.trace = Some(BeamformingTraceWriter::create(dir)?);
        Ok(self)
    }

    /// Attach a traffic source at `source` addressed to `dest`.
    pub fn add_traffic(
        &mut self,
        source: StationId,
        dest: StationId,
        generator: TrafficGenerator,
    ) -> SimResult<()> {
        let station = self.station_mut(source)?;
        station.traffic = Some((dest, generator));
        Ok(())
    }

    pub fn station(&self, id: StationId) -> SimResult<&Station> {
        self.stations
            .iter()
            .find(|s| s.id == id)
            .ok_or(SimError::UnknownStation(id))
    }

    pub fn station_mut(&mut self, id: StationId) -> SimResult<&mut Station> {
        self.stations
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SimError::UnknownStation(id))
    }

    fn index_of(&self, id: StationId) -> SimResult<usize> {
        self.stations
            .iter()
            .position(|s| s.id == id)
            .ok_or(SimError::UnknownStation(id))
    }

    fn two_stations(&mut self, a: usize, b: usize) -> (&mut Station, &mut Station) {
        assert_ne!(a, b);
        if a < b {
            let (left, right) = self.stations.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.stations.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Completed-training events observed so far.
    pub fn training_log(&self) -> &[(SimTime, StationId, TrainingEvent)] {
        &self.training_log
    }

    /// All SLS completions.
    pub fn sls_completions(&self) -> Vec<&(SimTime, StationId, TrainingEvent)> {
        self.training_log
            .iter()
            .filter(|(_, _, e)| matches!(e, TrainingEvent::SlsCompleted { .. }))
            .collect()
    }

    // ── Frame delivery ──────────────────────────────────────────────────

    /// Push one frame through the channel into the receiver's interference
    /// engine. Returns the measured SNR in dB.
    fn deliver(
        &mut self,
        tx_idx: usize,
        rx_idx: usize,
        at: SimTime,
        payload_bytes: usize,
        mcs: Mcs,
    ) -> SimResult<f64> {
        let channel = self.channel.clone();
        let tx_power_dbm = self.config.tx_power_dbm;
        let (tx, rx) = self.two_stations(tx_idx, rx_idx);

        let tx_pattern = tx.codebook.chains()[0].active_tx_pattern()?;
        let rx_pattern = rx.codebook.chains()[0].active_rx_pattern()?;
        let rx_power = channel.rx_power_w(
            tx_power_dbm,
            tx.position,
            rx.position,
            &tx.codebook,
            &rx.codebook,
            tx_pattern,
            rx_pattern,
        );

        let airtime = frame_airtime(payload_bytes, mcs);
        let event = rx.interference.add(
            TxVector::dmg(mcs, vec![tx_pattern]),
            at,
            airtime,
            rx_power,
            Vec::new(),
        );
        let snr_db = rx.interference.calculate_snr_db(&event);
        rx.interference.erase_expired(at);
        Ok(snr_db)
    }

    /// Whether a data frame at `snr_db` decodes under the error model.
    fn frame_succeeds(&self, mcs: Mcs, snr_db: f64) -> SimResult<bool> {
        Ok(self.error_model.chunk_success_rate(mcs, snr_db, 1)? >= 0.5)
    }

    fn log_training(&mut self, at: SimTime, station: StationId, event: TrainingEvent) {
        if let TrainingEvent::SlsCompleted {
            peer,
            role,
            antenna,
            sector,
            snr_db,
        } = &event
        {
            if let Some(trace) = self.trace.as_mut() {
                let _ = trace.log_sls(
                    at,
                    station,
                    *peer,
                    self.bft_counter,
                    *antenna,
                    *sector,
                    *role,
                    0,
                    *snr_db,
                );
            }
        }
        self.training_log.push((at, station, event));
    }

    // ── Beacon-interval phases ──────────────────────────────────────────

    /// BTI: the AP's transmit sector sweep. Every station not yet trained
    /// listens quasi-omni and records the sweep.
    fn run_bti(&mut self, at: SimTime) -> SimResult<SimTime> {
        let beacon_bytes = 96;
        let beacon_airtime = frame_airtime(beacon_bytes, Mcs::CONTROL);
        let step = beacon_airtime + self.config.frame_spacing;
        let sweep_len = self.stations[0].codebook.total_sector_count();
        let bti_end = at + step.mul_f64(sweep_len as f64);
        let mut t = at;

        for peer_idx in 1..self.stations.len() {
            let peer_id = self.stations[peer_idx].id;
            let ap_id = self.stations[0].id;
            if self.trained.contains(&(ap_id, peer_id)) {
                continue;
            }

            // The AP contends once for its beacon window.
            let ap = &mut self.stations[0];
            ap.beacon_txop.perform_cca();
            if ap.beacon_txop.notify_access_granted() != AccessAction::BeaconGrant {
                continue;
            }
            ap.initiator_for(peer_id).start();
            // Receiver side starts a quasi-omni antenna cycle for the BTI.
            if let Some(chain) = self.stations[peer_idx].codebook.chain_mut(0) {
                chain.start_receiving_in_quasi_omni_mode()?;
            }

            loop {
                let uid = self.next_uid;
                self.next_uid += 1;
                let frame = {
                    let Station {
                        initiators,
                        codebook,
                        ..
                    } = &mut self.stations[0];
                    let initiator = &mut initiators
                        .iter_mut()
                        .find(|(p, _)| *p == peer_id)
                        .expect("initiator installed above")
                        .1;
                    let chain = codebook.chain_mut(0).expect("chain 0");
                    initiator.next_ssw(chain)?
                };
                let Some(frame) = frame else { break };

                // Beacon duration advertises the remaining BTI.
                let remaining = bti_end.saturating_since(t);
                let ap = &self.stations[0];
                let header = FrameHeader::management(FrameKind::DmgBeacon, ap.id, peer_id);
                let _ = ap.beacon_txop.transmit_dmg_beacon(
                    Packet::new(beacon_bytes, uid),
                    header,
                    remaining,
                );

                let snr_db = self.deliver(0, peer_idx, t, beacon_bytes, Mcs::CONTROL)?;
                let peer = &mut self.stations[peer_idx];
                peer.responder_for(ap_id).record_iss(&frame, snr_db);
                t += step;
            }
        }
        Ok(t.max(bti_end))
    }

    /// A-BFT: each untrained station wins an SLS slot, answers with its own
    /// sweep, and the AP closes the exchange with feedback.
    fn run_abft(&mut self, at: SimTime) -> SimResult<SimTime> {
        let ssw_bytes = 26;
        let ssw_airtime = frame_airtime(ssw_bytes, Mcs::CONTROL);
        let step = ssw_airtime + self.config.frame_spacing;
        let mut t = at;
        let ap_id = self.stations[0].id;

        for peer_idx in 1..self.stations.len() {
            let peer_id = self.stations[peer_idx].id;
            if self.trained.contains(&(ap_id, peer_id)) {
                continue;
            }

            // Slot acquisition through the SLS coordinator.
            let peer = &mut self.stations[peer_idx];
            peer.sls_txop.obtain_txop(ap_id, false);
            let AccessAction::SlsGrant { peer: granted, .. } =
                peer.sls_txop.notify_access_granted()
            else {
                continue;
            };
            debug!(?granted, "A-BFT slot won");

            // Responder sector sweep, AP listening quasi-omni.
            if let Some(chain) = self.stations[0].codebook.chain_mut(0) {
                chain.start_receiving_in_quasi_omni_mode()?;
            }
            loop {
                let frame = {
                    let Station {
                        responders,
                        codebook,
                        ..
                    } = &mut self.stations[peer_idx];
                    let responder = &mut responders
                        .iter_mut()
                        .find(|(p, _)| *p == ap_id)
                        .expect("responder installed in BTI")
                        .1;
                    let chain = codebook.chain_mut(0).expect("chain 0");
                    responder.next_rss_ssw(chain)?
                };
                let Some(frame) = frame else { break };

                let snr_db = self.deliver(peer_idx, 0, t, ssw_bytes, Mcs::CONTROL)?;
                let ap = &mut self.stations[0];
                ap.initiator_for(peer_id).record_rss(&frame, snr_db);
                t += step;
            }

            // Feedback closes the exchange; its ACK completes the initiator.
            let feedback = {
                let ap = &mut self.stations[0];
                ap.initiator_for(peer_id).build_feedback()
            };
            let Some(feedback) = feedback else {
                // Nothing received: benign, retry next beacon interval.
                continue;
            };
            let _ = self.deliver(0, peer_idx, t, ssw_bytes, Mcs::CONTROL)?;
            t += step;

            let responder_event = {
                let peer = &mut self.stations[peer_idx];
                let Station {
                    responders,
                    codebook,
                    ..
                } = peer;
                let responder = &mut responders
                    .iter_mut()
                    .find(|(p, _)| *p == ap_id)
                    .expect("responder installed in BTI")
                    .1;
                responder.on_feedback(&feedback, codebook.chain_mut(0).expect("chain 0"))?
            };
            let initiator_event = {
                let ap = &mut self.stations[0];
                let Station {
                    initiators,
                    codebook,
                    ..
                } = ap;
                let initiator = &mut initiators
                    .iter_mut()
                    .find(|(p, _)| *p == peer_id)
                    .expect("initiator installed in BTI")
                    .1;
                initiator.on_ack(codebook.chain_mut(0).expect("chain 0"))?
            };

            if let Some(event) = responder_event {
                self.log_training(t, peer_id, event);
            }
            if let Some(event) = initiator_event {
                self.log_training(t, ap_id, event);
                self.trained.insert((ap_id, peer_id));
                self.bft_counter += 1;
                info!(?peer_id, at = %t, "beamforming training complete");
            }
        }
        Ok(t)
    }

    /// ATI: the AP exchanges short management frames inside its announced
    /// window, each transmission bounded by the remaining budget.
    fn run_ati(&mut self, at: SimTime) -> SimResult<()> {
        let announce_bytes = 64;
        let ap_id = self.stations[0].id;
        let peers: Vec<StationId> =
            self.stations[1..].iter().map(|s| s.id).collect();

        let ap = &mut self.stations[0];
        ap.ati_txop
            .initiate_ati_access_period(at, self.config.ati_duration);
        for peer in &peers {
            let mut header = FrameHeader::management(FrameKind::Management, ap_id, *peer);
            header.no_ack = false;
            let uid = self.next_uid;
            self.next_uid += 1;
            ap.ati_txop
                .queue(at, Packet::new(announce_bytes, uid), header);
        }

        let mut t = at;
        loop {
            let ap = &mut self.stations[0];
            match ap.ati_txop.notify_access_granted(t) {
                AccessAction::Transmit(desc) => {
                    let rx_idx = self.index_of(desc.header.dest)?;
                    let airtime = frame_airtime(desc.payload_bytes(), Mcs::CONTROL);
                    let _ = self.deliver(0, rx_idx, t, desc.payload_bytes(), Mcs::CONTROL)?;
                    t += airtime + self.config.sifs;
                    let ap = &mut self.stations[0];
                    if !matches!(
                        ap.ati_txop.got_ack(t),
                        AccessAction::RequestAccess { .. }
                    ) {
                        break;
                    }
                }
                _ => break,
            }
        }
        self.stations[0].ati_txop.disable_transmission();
        Ok(())
    }

    /// One service period: drive the coordinator until the budget or the
    /// queue runs out, delivering each transmission and acknowledging it.
    fn run_service_period(&mut self, index: usize, at: SimTime) -> SimResult<()> {
        let alloc = self.config.allocations[index].clone();
        let src_idx = self.index_of(alloc.source)?;
        let dst_idx = self.index_of(alloc.destination)?;
        let mcs = self.config.data_mcs;
        let tid = 0;

        let first_action = {
            let src = &mut self.stations[src_idx];
            src.service_period
                .start_service_period(at, alloc.id, alloc.destination, tid, alloc.duration)
        };

        let mut t = at;
        let mut pending = match first_action {
            AccessAction::Idle => None,
            other => Some(other),
        };
        loop {
            let action = match pending.take() {
                Some(action) => action,
                None => {
                    let src = &mut self.stations[src_idx];
                    let Station {
                        service_period,
                        retry,
                        ..
                    } = src;
                    service_period.notify_access_granted(t, retry)
                }
            };

            match action {
                AccessAction::Transmit(desc) | AccessAction::Resume(desc) => {
                    let bytes = desc.payload_bytes();
                    let airtime = frame_airtime(bytes, mcs);
                    let snr_db = self.deliver(src_idx, dst_idx, t, bytes, mcs)?;
                    t += airtime + self.config.sifs;

                    if self.frame_succeeds(mcs, snr_db)? {
                        let dst = &mut self.stations[dst_idx];
                        dst.delivered_bytes += bytes as u64;
                        dst.delivered_packets += desc.packets.len() as u64;
                        let src = &mut self.stations[src_idx];
                        match desc.ack {
                            wigig_core::access::AckPolicy::BlockAck => {
                                src.service_period.got_block_ack(
                                    alloc.destination,
                                    tid,
                                    &[desc.header.seq],
                                );
                            }
                            _ => src.service_period.got_ack(),
                        }
                    } else {
                        let src = &mut self.stations[src_idx];
                        let Station {
                            service_period,
                            retry,
                            ..
                        } = src;
                        match service_period.missed_ack(t, retry) {
                            AccessAction::FinalFailure { .. } => {
                                self.stations[src_idx].dropped_packets += 1;
                            }
                            AccessAction::SendBar { peer, tid, .. } => {
                                // The BAR round trip marks everything
                                // outstanding for retry.
                                t += self.config.sifs;
                                self.stations[src_idx]
                                    .service_period
                                    .got_block_ack(peer, tid, &[]);
                            }
                            AccessAction::Transmit(desc) => {
                                pending = Some(AccessAction::Transmit(desc));
                            }
                            _ => {}
                        }
                    }
                }
                AccessAction::SendAddba { peer, tid } => {
                    // ADDBA request/response round trip at the control rate.
                    let addba_airtime = frame_airtime(38, Mcs::CONTROL);
                    let _ = self.deliver(src_idx, dst_idx, t, 38, Mcs::CONTROL)?;
                    t += (addba_airtime + self.config.sifs).mul_f64(2.0);
                    let src = &mut self.stations[src_idx];
                    src.service_period.on_addba_response(peer, tid, true);
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn drain_traffic(&mut self, from: SimTime, until: SimTime) {
        for station in self.stations.iter_mut() {
            let Some((dest, generator)) = station.traffic.as_mut() else {
                continue;
            };
            let dest = *dest;
            let source = station.id;
            for (t, packet) in generator.arrivals(SimTime::ZERO, from, until) {
                let header = FrameHeader::data(source, dest, 0, 0);
                if !station.service_period.enqueue(t, packet, header) {
                    station.dropped_packets += 1;
                }
            }
        }
    }

    // ── Main loop ───────────────────────────────────────────────────────

    /// Run the scenario for `duration` of virtual time.
    pub fn run(&mut self, duration: Duration) -> SimResult<()> {
        self.end_at = SimTime::ZERO + duration;
        self.events.schedule(SimTime::ZERO, NetEvent::BeaconInterval);
        self.events.schedule(SimTime::ZERO, NetEvent::TrafficWindow);
        self.events.schedule(self.end_at, NetEvent::End);

        while let Some((at, event)) = self.events.pop() {
            match event {
                NetEvent::End => break,
                NetEvent::BeaconInterval => {
                    let next = at + self.config.beacon_interval;
                    if next < self.end_at {
                        self.events.schedule(next, NetEvent::BeaconInterval);
                    }
                    let bti_end = self.run_bti(at)?;
                    self.events.schedule(bti_end, NetEvent::Abft);
                }
                NetEvent::Abft => {
                    let abft_end = self.run_abft(at)?;
                    self.events.schedule(abft_end, NetEvent::Ati);
                }
                NetEvent::Ati => {
                    self.run_ati(at)?;
                    self.events
                        .schedule(at + self.config.ati_duration, NetEvent::Dti);
                }
                NetEvent::Dti => {
                    for (index, alloc) in self.config.allocations.iter().enumerate() {
                        self.events.schedule(
                            at + alloc.offset,
                            NetEvent::ServicePeriodStart { index },
                        );
                        self.events.schedule(
                            at + alloc.offset + alloc.duration,
                            NetEvent::ServicePeriodEnd { index },
                        );
                    }
                }
                NetEvent::ServicePeriodStart { index } => {
                    self.run_service_period(index, at)?;
                }
                NetEvent::ServicePeriodEnd { index } => {
                    let source = self.config.allocations[index].source;
                    if let Ok(station) = self.station_mut(source) {
                        station.service_period.end_current_service_period();
                    }
                }
                NetEvent::TrafficWindow => {
                    let until = (at + self.config.beacon_interval).min(self.end_at);
                    self.drain_traffic(at, until);
                    if until < self.end_at {
                        self.events.schedule(until, NetEvent::TrafficWindow);
                    }
                }
            }
        }

        if let Some(trace) = self.trace.as_mut() {
            trace.flush()?;
        }
        Ok(())
    }

    /// Throughput delivered to a station across the whole run, in Mb/s.
    pub fn throughput_mbps(&self, station: StationId) -> SimResult<f64> {
        let delivered = self.station(station)?.delivered_bytes;
        let elapsed = self.end_at.as_secs_f64();
        if elapsed <= 0.0 {
            return Ok(0.0);
        }
        Ok(delivered as f64 * 8.0 / elapsed / 1e6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_setup() -> (NetworkConfig, Vec<StationConfig>) {
        let mut config = NetworkConfig::default();
        config.allocations = vec![AllocationConfig {
            id: AllocationId(1),
            kind: AllocationKind::ServicePeriod,
            source: StationId(1),
            destination: StationId(2),
            offset: Duration::from_millis(2),
            duration: Duration::from_millis(40),
        }];
        let stations = vec![
            StationConfig::new(StationId(1), (0.0, 0.0), 8),
            StationConfig::new(StationId(2), (5.0, 0.5), 8),
        ];
        (config, stations)
    }

    #[test]
    fn test_training_happens_in_first_beacon_interval() {
        let (config, stations) = two_node_setup();
        let mut network = Network::new(config, &stations).unwrap();
        network.run(Duration::from_millis(50)).unwrap();

        let completions = network.sls_completions();
        assert_eq!(completions.len(), 2, "one completion per direction");
    }

    #[test]
    fn test_data_flows_after_training() {
        let (config, stations) = two_node_setup();
        let mut network = Network::new(config, &stations).unwrap();
        network
            .add_traffic(
                StationId(1),
                StationId(2),
                TrafficGenerator::bulk(50.0, 1448),
            )
            .unwrap();
        network.run(Duration::from_millis(200)).unwrap();

        let delivered = network.station(StationId(2)).unwrap().delivered_bytes;
        assert!(delivered > 0, "service periods moved data");
    }

    #[test]
    fn test_no_retraining_once_complete() {
        let (config, stations) = two_node_setup();
        let mut network = Network::new(config, &stations).unwrap();
        // Three beacon intervals; training only completes once.
        network.run(Duration::from_millis(320)).unwrap();
        assert_eq!(network.sls_completions().len(), 2);
    }
}
