//! Beamforming training state machines
//!
//! The protocol logic that drives the codebook cursors: Sector-Level Sweep
//! (coarse sector selection via ISS/RSS probe exchanges), Beam Refinement
//! (AWV sweeps inside the winning sector), and MIMO training (candidate
//! sector/AWV combinations across RF chains with per-stream SNR capture).
//!
//! These state machines hold no timing of their own: the simulation layer
//! asks for the next probe frame, reports what was measured, and dispatches
//! the emitted [`TrainingEvent`]s. Antenna configuration changes go through
//! the [`RfChain`] cursor API, so the exclusivity invariants hold by
//! construction.

use crate::codebook::{Codebook, CodebookResult, RfChain};
use crate::types::{AntennaId, AwvId, SectorId, StationId};
use tracing::debug;

/// Which side of the training exchange a station is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingRole {
    Initiator,
    Responder,
}

/// Which sweep a probe frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    /// Initiator Sector Sweep.
    Iss,
    /// Responder Sector Sweep.
    Rss,
}

/// The winning sector for one link direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorChoice {
    pub antenna: AntennaId,
    pub sector: SectorId,
    pub snr_db: f64,
}

/// A sector-sweep probe frame (SSW). Wire layout is out of scope; this is
/// the information content the exchange needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SswFrame {
    pub source: StationId,
    pub dest: StationId,
    pub direction: SweepDirection,
    pub antenna: AntennaId,
    pub sector: SectorId,
    /// Remaining frames in this sweep (CDOWN-style countdown).
    pub cdown: u16,
    /// In RSS frames: the responder's verdict on the initiator's sweep.
    pub feedback: Option<SectorChoice>,
}

/// Sector-sweep feedback frame closing the SLS phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SswFeedback {
    pub source: StationId,
    pub dest: StationId,
    /// Best responder sector as observed by the initiator.
    pub best: SectorChoice,
}

/// Events emitted as training phases conclude.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    SlsCompleted {
        peer: StationId,
        role: TrainingRole,
        antenna: AntennaId,
        sector: SectorId,
        snr_db: f64,
    },
    BrpCompleted {
        peer: StationId,
        antenna: AntennaId,
        sector: SectorId,
        awv: AwvId,
        snr_db: f64,
    },
    MimoCompleted {
        peer: StationId,
        /// One winning configuration per spatial stream.
        selections: Vec<(AntennaId, SectorId, f64)>,
    },
}

// ── Transmit sector sweep driver ────────────────────────────────────────────

/// Steps a chain through every `(antenna, sector)` of a codebook in
/// canonical order, applying each to the chain as it goes. An explicit
/// `(index, length)` cursor into an owned list.
#[derive(Debug, Clone)]
pub struct TxSectorSweep {
    sectors: Vec<(AntennaId, SectorId)>,
    pos: usize,
}

impl TxSectorSweep {
    pub fn new(codebook: &Codebook) -> Self {
        Self {
            sectors: codebook.sector_list(),
            pos: 0,
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Frames still to send after the current one.
    pub fn remaining(&self) -> usize {
        self.sectors.len().saturating_sub(self.pos)
    }

    /// Apply the next sector to the chain and return it with its countdown.
    /// `None` once the sweep is exhausted.
    pub fn next(&mut self, chain: &mut RfChain) -> CodebookResult<Option<(AntennaId, SectorId, u16)>> {
        if self.pos >= self.sectors.len() {
            return Ok(None);
        }
        let (antenna, sector) = self.sectors[self.pos];
        chain.set_active_tx_sector(antenna, sector)?;
        let cdown = (self.sectors.len() - 1 - self.pos) as u16;
        self.pos += 1;
        Ok(Some((antenna, sector, cdown)))
    }
}

// ── Sector-level sweep ──────────────────────────────────────────────────────

/// Per-sector measurements collected while listening quasi-omni.
#[derive(Debug, Clone, Default)]
struct SweepObservations {
    entries: Vec<(AntennaId, SectorId, f64)>,
}

impl SweepObservations {
    fn record(&mut self, antenna: AntennaId, sector: SectorId, snr_db: f64) {
        self.entries.push((antenna, sector, snr_db));
    }

    fn best(&self) -> Option<SectorChoice> {
        self.entries
            .iter()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            .map(|&(antenna, sector, snr_db)| SectorChoice {
                antenna,
                sector,
                snr_db,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlsPhase {
    Idle,
    InitiatorSweep,
    AwaitRss,
    AwaitAck,
    Done,
}

/// Initiator side of a TXSS sector-level sweep.
///
/// Flow: sweep own sectors (ISS) while the responder listens quasi-omni;
/// listen quasi-omni through the responder's sweep (RSS), which also carries
/// the responder's verdict on the ISS; send feedback with the responder's
/// best sector; the ACK completes the phase.
#[derive(Debug)]
pub struct SlsInitiator {
    own: StationId,
    peer: StationId,
    phase: SlsPhase,
    sweep: TxSectorSweep,
    observed: SweepObservations,
    /// The responder's verdict on our sweep, carried in RSS frames.
    own_best: Option<SectorChoice>,
}

impl SlsInitiator {
    pub fn new(own: StationId, peer: StationId, codebook: &Codebook) -> Self {
        Self {
            own,
            peer,
            phase: SlsPhase::Idle,
            sweep: TxSectorSweep::new(codebook),
            observed: SweepObservations::default(),
            own_best: None,
        }
    }

    pub fn start(&mut self) {
        self.phase = SlsPhase::InitiatorSweep;
        self.sweep.reset();
        self.observed = SweepObservations::default();
        self.own_best = None;
    }

    pub fn is_done(&self) -> bool {
        self.phase == SlsPhase::Done
    }

    /// Next ISS probe, stepping the chain's Tx sector. `None` ends the ISS;
    /// the chain flips to quasi-omni listening for the RSS.
    pub fn next_ssw(&mut self, chain: &mut RfChain) -> CodebookResult<Option<SswFrame>> {
        if self.phase != SlsPhase::InitiatorSweep {
            return Ok(None);
        }
        match self.sweep.next(chain)? {
            Some((antenna, sector, cdown)) => Ok(Some(SswFrame {
                source: self.own,
                dest: self.peer,
                direction: SweepDirection::Iss,
                antenna,
                sector,
                cdown,
                feedback: None,
            })),
            None => {
                self.phase = SlsPhase::AwaitRss;
                chain.start_receiving_in_quasi_omni_mode()?;
                Ok(None)
            }
        }
    }

    /// An RSS probe arrived with its measured SNR.
    pub fn record_rss(&mut self, frame: &SswFrame, snr_db: f64) {
        if frame.direction != SweepDirection::Rss || frame.source != self.peer {
            return;
        }
        self.observed.record(frame.antenna, frame.sector, snr_db);
        if let Some(feedback) = frame.feedback {
            self.own_best = Some(feedback);
        }
    }

    /// The RSS ended: build the feedback frame carrying the responder's best
    /// sector. `None` if nothing was received (benign; retry next interval).
    pub fn build_feedback(&mut self) -> Option<SswFeedback> {
        let best = self.observed.best()?;
        self.phase = SlsPhase::AwaitAck;
        Some(SswFeedback {
            source: self.own,
            dest: self.peer,
            best,
        })
    }

    /// SSW-ACK received: apply the winning Tx sector and report completion.
    pub fn on_ack(&mut self, chain: &mut RfChain) -> CodebookResult<Option<TrainingEvent>> {
        if self.phase != SlsPhase::AwaitAck {
            return Ok(None);
        }
        let Some(best) = self.own_best else {
            return Ok(None);
        };
        chain.set_active_tx_sector(best.antenna, best.sector)?;
        self.phase = SlsPhase::Done;
        debug!(peer = ?self.peer, sector = ?best.sector, "SLS completed (initiator)");
        Ok(Some(TrainingEvent::SlsCompleted {
            peer: self.peer,
            role: TrainingRole::Initiator,
            antenna: best.antenna,
            sector: best.sector,
            snr_db: best.snr_db,
        }))
    }
}

/// Responder side of a TXSS sector-level sweep.
#[derive(Debug)]
pub struct SlsResponder {
    own: StationId,
    peer: StationId,
    sweep: TxSectorSweep,
    observed: SweepObservations,
}

impl SlsResponder {
    pub fn new(own: StationId, peer: StationId, codebook: &Codebook) -> Self {
        Self {
            own,
            peer,
            sweep: TxSectorSweep::new(codebook),
            observed: SweepObservations::default(),
        }
    }

    /// An ISS probe arrived while listening quasi-omni.
    pub fn record_iss(&mut self, frame: &SswFrame, snr_db: f64) {
        if frame.direction != SweepDirection::Iss || frame.source != self.peer {
            return;
        }
        self.observed.record(frame.antenna, frame.sector, snr_db);
    }

    /// The initiator's best sector as measured here.
    pub fn best_initiator_sector(&self) -> Option<SectorChoice> {
        self.observed.best()
    }

    /// Next RSS probe: steps the own Tx sweep and embeds the ISS verdict in
    /// every frame so the initiator learns it even if some probes are lost.
    pub fn next_rss_ssw(&mut self, chain: &mut RfChain) -> CodebookResult<Option<SswFrame>> {
        let feedback = self.best_initiator_sector();
        match self.sweep.next(chain)? {
            Some((antenna, sector, cdown)) => Ok(Some(SswFrame {
                source: self.own,
                dest: self.peer,
                direction: SweepDirection::Rss,
                antenna,
                sector,
                cdown,
                feedback,
            })),
            None => {
                chain.start_receiving_in_quasi_omni_mode()?;
                Ok(None)
            }
        }
    }

    /// Feedback received: apply our winning Tx sector, produce the ACK and
    /// the responder-side completion event.
    pub fn on_feedback(
        &mut self,
        feedback: &SswFeedback,
        chain: &mut RfChain,
    ) -> CodebookResult<Option<TrainingEvent>> {
        if feedback.source != self.peer {
            return Ok(None);
        }
        let best = feedback.best;
        chain.set_active_tx_sector(best.antenna, best.sector)?;
        debug!(peer = ?self.peer, sector = ?best.sector, "SLS completed (responder)");
        Ok(Some(TrainingEvent::SlsCompleted {
            peer: self.peer,
            role: TrainingRole::Responder,
            antenna: best.antenna,
            sector: best.sector,
            snr_db: best.snr_db,
        }))
    }
}

// ── Beam refinement (BRP) ───────────────────────────────────────────────────

/// AWV sweep over a winning sector. The chain's remaining-AWV counter tells
/// the driver when the refinement round is complete.
#[derive(Debug)]
pub struct BrpRefinement {
    peer: StationId,
    antenna: AntennaId,
    sector: SectorId,
    next_awv: u8,
    measurements: Vec<(AwvId, f64)>,
    started: bool,
}

impl BrpRefinement {
    pub fn new(peer: StationId, antenna: AntennaId, sector: SectorId) -> Self {
        Self {
            peer,
            antenna,
            sector,
            next_awv: 0,
            measurements: Vec::new(),
            started: false,
        }
    }

    /// Apply the next AWV of the refinement sweep. The first call locks the
    /// chain onto the trained sector. `None` when every AWV was tried.
    pub fn next_awv(&mut self, chain: &mut RfChain) -> CodebookResult<Option<AwvId>> {
        if !self.started {
            chain.set_active_tx_sector(self.antenna, self.sector)?;
            self.started = true;
        }
        if chain.remaining_awv_count() == 0 && self.next_awv > 0 {
            return Ok(None);
        }
        let awv = AwvId(self.next_awv);
        match chain.set_active_tx_awv(awv) {
            Ok(()) => {
                self.next_awv += 1;
                Ok(Some(awv))
            }
            // Sector with no AWVs configured: nothing to refine.
            Err(_) => Ok(None),
        }
    }

    pub fn record(&mut self, awv: AwvId, snr_db: f64) {
        self.measurements.push((awv, snr_db));
    }

    /// Pick the winner, apply it and report completion. Falls back to the
    /// plain sector when no AWV beat it or none was measured.
    pub fn complete(&mut self, chain: &mut RfChain) -> CodebookResult<Option<TrainingEvent>> {
        let best = self
            .measurements
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .copied();
        let Some((awv, snr_db)) = best else {
            return Ok(None);
        };
        chain.set_active_tx_sector(self.antenna, self.sector)?;
        chain.set_active_tx_awv(awv)?;
        Ok(Some(TrainingEvent::BrpCompleted {
            peer: self.peer,
            antenna: self.antenna,
            sector: self.sector,
            awv,
            snr_db,
        }))
    }
}

// ── MIMO training ───────────────────────────────────────────────────────────

/// One candidate configuration with its measured per-stream SNRs.
#[derive(Debug, Clone)]
struct MimoMeasurement {
    antenna: AntennaId,
    sector: SectorId,
    awv: Option<AwvId>,
    stream_snrs_db: Vec<f64>,
}

/// MIMO training over the codebook's MIMO sweep cursors: iterates candidate
/// sectors (optionally crossed with AWVs), collects per-stream SNR vectors,
/// and selects one configuration per stream.
#[derive(Debug)]
pub struct MimoTraining {
    peer: StationId,
    candidates: Vec<(AntennaId, SectorId)>,
    awvs: Vec<AwvId>,
    yielded: usize,
    current_sector: Option<(AntennaId, SectorId)>,
    measurements: Vec<MimoMeasurement>,
}

impl MimoTraining {
    pub fn new(
        peer: StationId,
        candidates: Vec<(AntennaId, SectorId)>,
        awvs: Vec<AwvId>,
    ) -> Self {
        Self {
            peer,
            candidates,
            awvs,
            yielded: 0,
            current_sector: None,
            measurements: Vec::new(),
        }
    }

    /// Configure the chain's MIMO cursors for this sweep.
    pub fn setup(&mut self, chain: &mut RfChain) -> CodebookResult<()> {
        self.yielded = 0;
        self.current_sector = None;
        self.measurements.clear();
        chain.set_up_mimo_sector_sweeping(self.candidates.clone(), self.awvs.clone())
    }

    /// Total number of sounding configurations in the sweep.
    pub fn total_configs(&self) -> usize {
        self.candidates.len() * self.awvs.len().max(1)
    }

    /// Step to the next sounding configuration, driving the chain cursors.
    /// The wrap signal from the AWV cursor advances the outer sector cursor.
    pub fn next_config(
        &mut self,
        chain: &mut RfChain,
    ) -> CodebookResult<Option<(AntennaId, SectorId, Option<AwvId>)>> {
        if self.yielded >= self.total_configs() {
            return Ok(None);
        }
        if self.current_sector.is_none() {
            self.current_sector = Some(chain.next_mimo_sector()?);
        }
        let (antenna, sector) = self.current_sector.expect("sector cursor primed");

        let awv = if self.awvs.is_empty() {
            None
        } else {
            let idx = self.yielded % self.awvs.len();
            let wrapped = chain.next_awv_with_combinations()?;
            if wrapped {
                // End of the AWV list: the next yield starts a new sector.
                self.current_sector = None;
            }
            Some(self.awvs[idx])
        };
        if self.awvs.is_empty() {
            self.current_sector = None;
        }
        self.yielded += 1;
        Ok(Some((antenna, sector, awv)))
    }

    /// Record per-stream SNRs for a sounding configuration.
    pub fn record(
        &mut self,
        antenna: AntennaId,
        sector: SectorId,
        awv: Option<AwvId>,
        stream_snrs_db: &[f64],
    ) {
        self.measurements.push(MimoMeasurement {
            antenna,
            sector,
            awv,
            stream_snrs_db: stream_snrs_db.to_vec(),
        });
    }

    /// Pick one configuration per stream: for each stream index, the
    /// candidate with the highest SNR on that stream, distinct sectors
    /// preferred so streams do not collapse onto one beam.
    pub fn complete(&self, num_streams: usize) -> Option<TrainingEvent> {
        if self.measurements.is_empty() {
            return None;
        }
        let mut selections: Vec<(AntennaId, SectorId, f64)> = Vec::with_capacity(num_streams);
        for stream in 0..num_streams {
            let mut ranked: Vec<&MimoMeasurement> = self
                .measurements
                .iter()
                .filter(|m| m.stream_snrs_db.len() > stream)
                .collect();
            ranked.sort_by(|a, b| {
                b.stream_snrs_db[stream]
                    .partial_cmp(&a.stream_snrs_db[stream])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let pick = ranked
                .iter()
                .find(|m| !selections.iter().any(|s| s.0 == m.antenna && s.1 == m.sector))
                .or_else(|| ranked.first())?;
            selections.push((pick.antenna, pick.sector, pick.stream_snrs_db[stream]));
        }
        Some(TrainingEvent::MimoCompleted {
            peer: self.peer,
            selections,
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::Codebook;

    const INITIATOR: StationId = StationId(1);
    const RESPONDER: StationId = StationId(2);

    fn codebook() -> Codebook {
        Codebook::uniform(1, 8, 2).unwrap()
    }

    /// Synthetic channel: sector 5 is the winner in both directions.
    fn synthetic_snr(sector: SectorId) -> f64 {
        if sector == SectorId(5) {
            22.0
        } else {
            3.0 + sector.0 as f64 * 0.1
        }
    }

    #[test]
    fn test_tx_sweep_covers_all_sectors_with_cdown() {
        let cb = codebook();
        let mut chain = cb.chains()[0].clone();
        let mut sweep = TxSectorSweep::new(&cb);
        assert_eq!(sweep.len(), 8);

        let mut seen = Vec::new();
        let mut last_cdown = None;
        while let Some((antenna, sector, cdown)) = sweep.next(&mut chain).unwrap() {
            assert_eq!(antenna, AntennaId(1));
            assert_eq!(
                chain.active_tx_pattern().unwrap().pattern_index(),
                sector.0
            );
            seen.push(sector);
            last_cdown = Some(cdown);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(last_cdown, Some(0), "countdown ends at zero");
    }

    #[test]
    fn test_full_sls_exchange_completes_both_sides() {
        let cb_i = codebook();
        let cb_r = codebook();
        let mut chain_i = cb_i.chains()[0].clone();
        let mut chain_r = cb_r.chains()[0].clone();

        let mut initiator = SlsInitiator::new(INITIATOR, RESPONDER, &cb_i);
        let mut responder = SlsResponder::new(RESPONDER, INITIATOR, &cb_r);
        initiator.start();

        // ISS: responder hears every probe quasi-omni.
        while let Some(frame) = initiator.next_ssw(&mut chain_i).unwrap() {
            responder.record_iss(&frame, synthetic_snr(frame.sector));
        }

        // RSS: initiator hears every probe, each carrying the ISS verdict.
        while let Some(frame) = responder.next_rss_ssw(&mut chain_r).unwrap() {
            initiator.record_rss(&frame, synthetic_snr(frame.sector));
        }

        // Feedback + ACK close the exchange.
        let feedback = initiator.build_feedback().unwrap();
        assert_eq!(feedback.best.sector, SectorId(5));

        let responder_event = responder.on_feedback(&feedback, &mut chain_r).unwrap().unwrap();
        let initiator_event = initiator.on_ack(&mut chain_i).unwrap().unwrap();

        match initiator_event {
            TrainingEvent::SlsCompleted {
                role,
                sector,
                antenna,
                ..
            } => {
                assert_eq!(role, TrainingRole::Initiator);
                assert_eq!(sector, SectorId(5));
                assert_eq!(antenna, AntennaId(1));
            }
            other => panic!("unexpected event {other:?}"),
        }
        match responder_event {
            TrainingEvent::SlsCompleted { role, sector, .. } => {
                assert_eq!(role, TrainingRole::Responder);
                assert_eq!(sector, SectorId(5));
            }
            other => panic!("unexpected event {other:?}"),
        }

        // Both chains now transmit on the winning sector.
        assert_eq!(chain_i.active_tx_pattern().unwrap().pattern_index(), 5);
        assert_eq!(chain_r.active_tx_pattern().unwrap().pattern_index(), 5);
        assert!(initiator.is_done());
    }

    #[test]
    fn test_sls_feedback_without_rss_is_none() {
        let cb = codebook();
        let mut chain = cb.chains()[0].clone();
        let mut initiator = SlsInitiator::new(INITIATOR, RESPONDER, &cb);
        initiator.start();
        while initiator.next_ssw(&mut chain).unwrap().is_some() {}
        // No RSS probes arrived: nothing to feed back, retry next interval.
        assert!(initiator.build_feedback().is_none());
    }

    #[test]
    fn test_brp_refines_to_best_awv() {
        let cb = codebook();
        let mut chain = cb.chains()[0].clone();
        let mut brp = BrpRefinement::new(RESPONDER, AntennaId(1), SectorId(5));

        let mut count = 0;
        while let Some(awv) = brp.next_awv(&mut chain).unwrap() {
            // Second AWV measures better.
            let snr = if awv == AwvId(1) { 25.0 } else { 21.0 };
            brp.record(awv, snr);
            count += 1;
        }
        assert_eq!(count, 2);

        match brp.complete(&mut chain).unwrap().unwrap() {
            TrainingEvent::BrpCompleted { awv, snr_db, .. } => {
                assert_eq!(awv, AwvId(1));
                assert!((snr_db - 25.0).abs() < 1e-12);
            }
            other => panic!("unexpected event {other:?}"),
        }
        // The chain ends in AWV mode on the winner.
        assert!(chain.is_tx_in_awv_mode());
        assert_eq!(chain.active_tx_pattern().unwrap().pattern_index(), 1);
    }

    #[test]
    fn test_brp_without_awvs_yields_nothing() {
        let cb = Codebook::uniform(1, 4, 0).unwrap();
        let mut chain = cb.chains()[0].clone();
        let mut brp = BrpRefinement::new(RESPONDER, AntennaId(1), SectorId(2));
        assert!(brp.next_awv(&mut chain).unwrap().is_none());
        assert!(brp.complete(&mut chain).unwrap().is_none());
    }

    #[test]
    fn test_mimo_training_iterates_cross_product() {
        let cb = Codebook::uniform(2, 4, 2).unwrap();
        let mut chain = cb.chains()[0].clone();
        let candidates = vec![
            (AntennaId(1), SectorId(1)),
            (AntennaId(1), SectorId(2)),
            (AntennaId(2), SectorId(3)),
        ];
        let mut training = MimoTraining::new(
            RESPONDER,
            candidates.clone(),
            vec![AwvId(0), AwvId(1)],
        );
        training.setup(&mut chain).unwrap();
        assert_eq!(training.total_configs(), 6);

        let mut configs = Vec::new();
        while let Some(config) = training.next_config(&mut chain).unwrap() {
            configs.push(config);
        }
        assert_eq!(configs.len(), 6);
        // Each candidate sector appears once per AWV.
        for &(antenna, sector) in &candidates {
            assert_eq!(
                configs
                    .iter()
                    .filter(|c| c.0 == antenna && c.1 == sector)
                    .count(),
                2
            );
        }
    }

    #[test]
    fn test_mimo_selection_prefers_distinct_sectors() {
        let mut training = MimoTraining::new(RESPONDER, vec![], vec![]);
        training.record(AntennaId(1), SectorId(1), None, &[20.0, 15.0]);
        training.record(AntennaId(1), SectorId(2), None, &[19.0, 18.0]);

        match training.complete(2).unwrap() {
            TrainingEvent::MimoCompleted { selections, .. } => {
                assert_eq!(selections.len(), 2);
                assert_eq!(selections[0].1, SectorId(1), "stream 0 takes its best");
                assert_eq!(selections[1].1, SectorId(2), "stream 1 avoids the taken sector");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
