//! Interference accounting and SNR computation
//!
//! Converts the set of signals concurrently in flight at a receiver into an
//! SNR (or a vector of per-stream SNRs for MIMO) usable to evaluate payload,
//! PHY-header and TRN-subfield success probabilities.
//!
//! The engine keeps the classic sweep-line structure: every registered signal
//! contributes a power delta at its start and end times into a time-ordered
//! change list ([`NiChange`]); the cumulative sum between two query times
//! gives the total received power in that interval, from which any one
//! event's own contribution is subtracted to obtain its interference.
//!
//! The transmit-side antenna configuration is snapshotted into the
//! [`TxVector`] when the signal is registered: the transmitter may well have
//! switched sectors for its next sweep step before this signal's reception
//! completes, so engines must never read live RF-chain state at reception
//! time.

use crate::codebook::ActivePattern;
use crate::error_model::{ErrorModelResult, ErrorRateModel};
use crate::sim_time::SimTime;
use crate::types::Mcs;
use std::time::Duration;

/// Boltzmann constant (J/K).
const BOLTZMANN: f64 = 1.380649e-23;
/// Reference temperature for thermal noise (K).
const T0_KELVIN: f64 = 290.0;

/// Per-PPDU transmit parameters, snapshotted at transmission time.
#[derive(Debug, Clone, PartialEq)]
pub struct TxVector {
    pub mcs: Mcs,
    /// MCS the PHY header is modulated with (control PHY).
    pub header_mcs: Mcs,
    pub channel_width_mhz: f64,
    pub num_streams: usize,
    /// Active Tx pattern per stream at the instant of transmission.
    pub tx_patterns: Vec<ActivePattern>,
    /// Short training field + channel estimation field airtime.
    pub preamble_duration: Duration,
    /// PHY header airtime (transmitted at `header_mcs`).
    pub header_duration: Duration,
}

impl TxVector {
    /// DMG single-carrier preamble: 1.89 us STF+CE, 0.58 us header.
    pub fn dmg(mcs: Mcs, tx_patterns: Vec<ActivePattern>) -> Self {
        let num_streams = tx_patterns.len().max(1);
        Self {
            mcs,
            header_mcs: Mcs::CONTROL,
            channel_width_mhz: 2160.0,
            num_streams,
            tx_patterns,
            preamble_duration: Duration::from_nanos(1891),
            header_duration: Duration::from_nanos(582),
        }
    }

    /// Placeholder vector for unmodelled (foreign) interferers.
    fn foreign() -> Self {
        Self {
            mcs: Mcs::CONTROL,
            header_mcs: Mcs::CONTROL,
            channel_width_mhz: 2160.0,
            num_streams: 1,
            tx_patterns: Vec::new(),
            preamble_duration: Duration::ZERO,
            header_duration: Duration::ZERO,
        }
    }
}

/// An immutable record of one PPDU's arrival at the receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub id: u64,
    pub tx_vector: TxVector,
    pub start: SimTime,
    pub duration: Duration,
    /// Total received power (W). For MIMO this is the sum across streams.
    pub rx_power_w: f64,
    /// Per-stream received power (W); empty for SISO.
    pub mimo_rx_power_w: Vec<f64>,
}

impl SignalEvent {
    pub fn end(&self) -> SimTime {
        self.start + self.duration
    }
}

/// SNR and packet-error-rate for one PHY sub-portion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnrPer {
    pub snr_db: f64,
    pub per: f64,
}

/// One entry of the noise-plus-interference change list: a power delta that
/// takes effect at `time`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct NiChange {
    time: SimTime,
    delta_w: f64,
}

/// The interference engine for one receiver.
#[derive(Debug, Clone)]
pub struct InterferenceEngine {
    noise_figure_db: f64,
    events: Vec<SignalEvent>,
    ni_changes: Vec<NiChange>,
    next_id: u64,
}

impl InterferenceEngine {
    pub fn new(noise_figure_db: f64) -> Self {
        Self {
            noise_figure_db,
            events: Vec::new(),
            ni_changes: Vec::new(),
            next_id: 0,
        }
    }

    /// Thermal noise floor scaled by the configured noise figure for a
    /// channel width.
    pub fn noise_floor_w(&self, channel_width_mhz: f64) -> f64 {
        let bandwidth_hz = channel_width_mhz * 1e6;
        BOLTZMANN * T0_KELVIN * bandwidth_hz * 10.0_f64.powf(self.noise_figure_db / 10.0)
    }

    fn insert_change(&mut self, change: NiChange) {
        // Stable insertion after any equal-time entry, preserving
        // registration order for same-instant changes.
        let pos = self
            .ni_changes
            .partition_point(|c| c.time <= change.time);
        self.ni_changes.insert(pos, change);
    }

    /// Register a new signal. Returns the immutable event record callers
    /// hold for the duration of reception.
    pub fn add(
        &mut self,
        tx_vector: TxVector,
        start: SimTime,
        duration: Duration,
        rx_power_w: f64,
        mimo_rx_power_w: Vec<f64>,
    ) -> SignalEvent {
        let total_power = if mimo_rx_power_w.is_empty() {
            rx_power_w
        } else {
            mimo_rx_power_w.iter().sum()
        };
        let event = SignalEvent {
            id: self.next_id,
            tx_vector,
            start,
            duration,
            rx_power_w: total_power,
            mimo_rx_power_w,
        };
        self.next_id += 1;
        self.insert_change(NiChange {
            time: start,
            delta_w: total_power,
        });
        self.insert_change(NiChange {
            time: event.end(),
            delta_w: -total_power,
        });
        self.events.push(event.clone());
        event
    }

    /// Register an unmodelled interferer: it raises the noise floor but is
    /// never itself evaluated for reception.
    pub fn add_foreign_signal(&mut self, start: SimTime, duration: Duration, rx_power_w: f64) {
        let _ = self.add(TxVector::foreign(), start, duration, rx_power_w, Vec::new());
    }

    /// Drop events that ended at or before `now` and rebuild the change
    /// list from the survivors.
    pub fn erase_expired(&mut self, now: SimTime) {
        self.events.retain(|e| e.end() > now);
        self.ni_changes.clear();
        let changes: Vec<(SimTime, f64, SimTime)> = self
            .events
            .iter()
            .map(|e| (e.start, e.rx_power_w, e.end()))
            .collect();
        for (start, power, end) in changes {
            self.insert_change(NiChange {
                time: start,
                delta_w: power,
            });
            self.insert_change(NiChange {
                time: end,
                delta_w: -power,
            });
        }
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Time-weighted average of total received power over `[t1, t2)`.
    fn average_total_power_w(&self, t1: SimTime, t2: SimTime) -> f64 {
        let span = (t2 - t1).as_secs_f64();
        if span <= 0.0 {
            // Point query: cumulative power at t1.
            return self
                .ni_changes
                .iter()
                .take_while(|c| c.time <= t1)
                .map(|c| c.delta_w)
                .sum();
        }

        let mut cum = 0.0;
        let mut boundaries: Vec<(SimTime, f64)> = Vec::new();
        for c in &self.ni_changes {
            if c.time <= t1 {
                cum += c.delta_w;
            } else if c.time < t2 {
                boundaries.push((c.time, c.delta_w));
            }
        }

        let mut energy = 0.0;
        let mut level = cum;
        let mut cursor = t1;
        for (time, delta) in boundaries {
            energy += level * (time - cursor).as_secs_f64();
            level += delta;
            cursor = time;
        }
        energy += level * (t2 - cursor).as_secs_f64();
        energy / span
    }

    /// Interference seen by `event` over `[t1, t2)`: everything on the
    /// medium except the event's own power.
    fn interference_w(&self, event: &SignalEvent, t1: SimTime, t2: SimTime) -> f64 {
        let total = self.average_total_power_w(t1, t2);
        let span = (t2 - t1).as_secs_f64();
        let own = if span <= 0.0 {
            if event.start <= t1 && t1 < event.end() {
                event.rx_power_w
            } else {
                0.0
            }
        } else {
            let overlap_start = t1.max(event.start);
            let overlap_end = t2.min(event.end());
            let overlap = overlap_end.saturating_since(overlap_start).as_secs_f64();
            event.rx_power_w * overlap / span
        };
        (total - own).max(0.0)
    }

    /// SNR (linear) of `event` over its full lifetime. With a quiet medium
    /// this degenerates to signal power over the thermal noise floor.
    pub fn calculate_snr(&self, event: &SignalEvent) -> f64 {
        let noise = self.noise_floor_w(event.tx_vector.channel_width_mhz);
        let ni = self.interference_w(event, event.start, event.end());
        event.rx_power_w / (noise + ni)
    }

    /// SNR of `event` in dB.
    pub fn calculate_snr_db(&self, event: &SignalEvent) -> f64 {
        10.0 * self.calculate_snr(event).log10()
    }

    /// Per-stream SNRs for a MIMO event: each stream's noise is the thermal
    /// floor plus external interference plus the power of all *other*
    /// concurrently active streams at this receiver.
    pub fn calculate_per_stream_snr(&self, event: &SignalEvent) -> Vec<f64> {
        if event.mimo_rx_power_w.is_empty() {
            return vec![self.calculate_snr(event)];
        }
        let noise = self.noise_floor_w(event.tx_vector.channel_width_mhz);
        let external = self.interference_w(event, event.start, event.end());
        let total: f64 = event.mimo_rx_power_w.iter().sum();
        event
            .mimo_rx_power_w
            .iter()
            .map(|&p| {
                let cross = total - p;
                p / (noise + external + cross)
            })
            .collect()
    }

    /// Core SNR/PER computation for one sub-portion `[t1, t2)` of `event`
    /// modulated at `mcs`: integrates the success probability across the
    /// constant-interference chunks within the window.
    fn snr_per_for_window(
        &self,
        event: &SignalEvent,
        model: &dyn ErrorRateModel,
        mcs: Mcs,
        t1: SimTime,
        t2: SimTime,
    ) -> ErrorModelResult<SnrPer> {
        let noise = self.noise_floor_w(event.tx_vector.channel_width_mhz);
        let rate_bps = mcs.data_rate_mbps().unwrap_or(27.5) * 1e6;

        // Chunk boundaries: every interference change inside the window.
        let mut cuts: Vec<SimTime> = vec![t1];
        for c in &self.ni_changes {
            if c.time > t1 && c.time < t2 {
                cuts.push(c.time);
            }
        }
        cuts.push(t2);
        cuts.dedup();

        let mut psr = 1.0;
        for pair in cuts.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let ni = self.interference_w(event, a, b);
            let snr = event.rx_power_w / (noise + ni);
            let snr_db = 10.0 * snr.log10();
            let bits = (rate_bps * (b - a).as_secs_f64()).ceil() as u64;
            if bits > 0 {
                psr *= model.chunk_success_rate(mcs, snr_db, bits)?;
            }
        }

        let avg_ni = self.interference_w(event, t1, t2);
        let snr_db = 10.0 * (event.rx_power_w / (noise + avg_ni)).log10();
        Ok(SnrPer {
            snr_db,
            per: 1.0 - psr,
        })
    }

    /// SNR/PER of the payload portion (everything after preamble + header)
    /// at the payload MCS.
    pub fn calculate_payload_snr_per(
        &self,
        event: &SignalEvent,
        model: &dyn ErrorRateModel,
    ) -> ErrorModelResult<SnrPer> {
        let t1 = event.start
            + event.tx_vector.preamble_duration
            + event.tx_vector.header_duration;
        self.snr_per_for_window(event, model, event.tx_vector.mcs, t1.min(event.end()), event.end())
    }

    /// SNR/PER of the DMG PHY header, transmitted at the control MCS right
    /// after the preamble.
    pub fn calculate_dmg_phy_header_snr_per(
        &self,
        event: &SignalEvent,
        model: &dyn ErrorRateModel,
    ) -> ErrorModelResult<SnrPer> {
        let t1 = event.start + event.tx_vector.preamble_duration;
        let t2 = t1 + event.tx_vector.header_duration;
        self.snr_per_for_window(
            event,
            model,
            event.tx_vector.header_mcs,
            t1.min(event.end()),
            t2.min(event.end()),
        )
    }

    /// Legacy (non-HT duplicate) header window: same control-rate treatment
    /// as the DMG header but spanning preamble start, as non-DMG receivers
    /// decode it.
    pub fn calculate_non_ht_phy_header_snr_per(
        &self,
        event: &SignalEvent,
        model: &dyn ErrorRateModel,
    ) -> ErrorModelResult<SnrPer> {
        let t2 = event.start
            + event.tx_vector.preamble_duration
            + event.tx_vector.header_duration;
        self.snr_per_for_window(
            event,
            model,
            event.tx_vector.header_mcs,
            event.start,
            t2.min(event.end()),
        )
    }

    /// HT-style header window: the legacy fields plus the extra HT
    /// signaling field, all at the control rate.
    pub fn calculate_ht_phy_header_snr_per(
        &self,
        event: &SignalEvent,
        model: &dyn ErrorRateModel,
    ) -> ErrorModelResult<SnrPer> {
        let t2 = event.start
            + event.tx_vector.preamble_duration
            + event.tx_vector.header_duration
            + event.tx_vector.header_duration;
        self.snr_per_for_window(
            event,
            model,
            event.tx_vector.header_mcs,
            event.start,
            t2.min(event.end()),
        )
    }

    /// SNR for TRN (training) subfields appended to the PPDU. SISO sounding
    /// may assume an interference-free channel; otherwise the plain SNR path
    /// applies.
    pub fn calculate_plcp_trn_snr(&self, event: &SignalEvent, interference_free: bool) -> f64 {
        if interference_free {
            let noise = self.noise_floor_w(event.tx_vector.channel_width_mhz);
            event.rx_power_w / noise
        } else {
            self.calculate_snr(event)
        }
    }

    /// Per-stream TRN SNRs for MIMO sounding: with explicit inter-stream
    /// interference, or thermal-noise-only when `interference_free`.
    pub fn calculate_mimo_trn_snr(
        &self,
        event: &SignalEvent,
        interference_free: bool,
    ) -> Vec<f64> {
        if interference_free {
            let noise = self.noise_floor_w(event.tx_vector.channel_width_mhz);
            if event.mimo_rx_power_w.is_empty() {
                vec![event.rx_power_w / noise]
            } else {
                event.mimo_rx_power_w.iter().map(|&p| p / noise).collect()
            }
        } else {
            self.calculate_per_stream_snr(event)
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
