//! Quasi-deterministic (ray-traced) propagation engine
//!
//! Supplies externally generated multipath parameters — per-path delay, path
//! loss, phase and departure/arrival angles — between node pairs, and
//! projects them through each endpoint's *currently active* antenna pattern
//! to produce a per-subcarrier power gain.
//!
//! ## Trace files
//!
//! One text file per ordered `(tx, rx)` station pair, named `Tx<t>Rx<r>.txt`
//! inside the configured directory. For every time step, then for every
//! `(txAntenna, rxAntenna)` combination:
//!
//! ```text
//! <path count>
//! delay_0,delay_1,...            (seconds)
//! pathloss_0,...                 (dB)
//! phase_0,...                    (radians)
//! aod_elevation_0,...            (degrees)
//! aod_azimuth_0,...              (degrees)
//! aoa_elevation_0,...            (degrees)
//! aoa_azimuth_0,...              (degrees)
//! ```
//!
//! The seven value lines are present only when the path count is nonzero.
//! Files are parsed in full on first use for that pair and cached for the
//! simulation's lifetime. Ray-tracer angles are in the global frame; they
//! are rotated into each array's local frame once at load time.

use crate::codebook::{ActivePattern, Codebook, Orientation};
use crate::sim_time::SimTime;
use crate::types::{db_to_amplitude, AntennaId, StationId};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Result type for propagation-engine operations.
pub type QdResult<T> = Result<T, QdChannelError>;

/// Propagation-engine failures. Malformed trace files and unregistered
/// stations are configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QdChannelError {
    #[error("failed to read trace file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("malformed trace file {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("station {0} has no registered codebook")]
    UnregisteredStation(StationId),

    #[error("no antenna combination ({tx_antenna}, {rx_antenna}) in trace for pair ({tx}, {rx})")]
    UnknownAntennaPair {
        tx: StationId,
        rx: StationId,
        tx_antenna: AntennaId,
        rx_antenna: AntennaId,
    },
}

/// One multipath component with angles pre-rotated into each endpoint
/// array's local frame.
#[derive(Debug, Clone)]
pub struct PathParams {
    pub delay_s: f64,
    pub path_loss_db: f64,
    pub phase_rad: f64,
    /// Angle of departure in the Tx array's local frame (azimuth, elevation).
    pub aod_local: (f64, f64),
    /// Angle of arrival in the Rx array's local frame (azimuth, elevation).
    pub aoa_local: (f64, f64),
    /// Doppler phase rate (rad/s) for the current trace index; zero in a
    /// static channel.
    pub doppler_rate: f64,
}

/// Multipath key: which cached table a query resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QdChannelId {
    pub tx: StationId,
    pub rx: StationId,
    pub trace_index: usize,
    pub tx_antenna: AntennaId,
    pub rx_antenna: AntennaId,
}

/// All trace steps for one ordered station pair.
#[derive(Debug, Clone, Default)]
struct QdTrace {
    /// `steps[trace_index][(tx_antenna, rx_antenna)]` = multipath components.
    steps: Vec<HashMap<(AntennaId, AntennaId), Vec<PathParams>>>,
}

/// Key of the channel-gain cache: one entry per antenna-configuration pair
/// on a link. The whole cache clears whenever the trace index advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GainKey {
    tx: StationId,
    rx: StationId,
    tx_pattern: ActivePattern,
    rx_pattern: ActivePattern,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdChannelConfig {
    /// Directory holding the per-pair trace files.
    pub directory: PathBuf,
    /// Trace-step duration; `None` means a static channel (single step, no
    /// Doppler).
    pub update_interval: Option<Duration>,
    /// Carrier frequency in Hz.
    pub center_frequency_hz: f64,
    /// Number of active subcarriers the gain is evaluated on.
    pub num_subcarriers: usize,
    /// Subcarrier spacing in Hz.
    pub subcarrier_spacing_hz: f64,
    /// Doppler spread (Hz) used to draw per-path phase rates.
    pub max_doppler_hz: f64,
    /// Seed for the per-trace-index Doppler draws.
    pub seed: u64,
}

impl Default for QdChannelConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("qd-files"),
            update_interval: None,
            center_frequency_hz: 60.48e9,
            num_subcarriers: 32,
            subcarrier_spacing_hz: 5.15625e6,
            max_doppler_hz: 0.0,
            seed: 1,
        }
    }
}

/// The quasi-deterministic propagation engine.
///
/// Owns the multipath tables and the channel-gain cache; the cache has a
/// single writer (this engine) and coarse invalidation: any trace-index
/// advance clears it entirely.
pub struct QdPropagationEngine {
    config: QdChannelConfig,
    start: SimTime,
    trace_index: usize,
    traces: HashMap<(StationId, StationId), QdTrace>,
    orientations: HashMap<(StationId, AntennaId), Orientation>,
    antenna_order: HashMap<StationId, Vec<AntennaId>>,
    gain_cache: HashMap<GainKey, Vec<f64>>,
    cache_invalidations: u64,
    gain_recomputations: u64,
}

impl QdPropagationEngine {
    pub fn new(config: QdChannelConfig) -> Self {
        Self {
            config,
            start: SimTime::ZERO,
            trace_index: 0,
            traces: HashMap::new(),
            orientations: HashMap::new(),
            antenna_order: HashMap::new(),
            gain_cache: HashMap::new(),
            cache_invalidations: 0,
            gain_recomputations: 0,
        }
    }

    /// Register a station's codebook: records antenna orientations (for the
    /// load-time angle rotation) and the antenna enumeration order the trace
    /// files follow.
    pub fn register_station(&mut self, station: StationId, codebook: &Codebook) {
        let mut order = Vec::new();
        for chain in codebook.chains() {
            for antenna in chain.antennas() {
                self.orientations
                    .insert((station, antenna.id), antenna.orientation);
                order.push(antenna.id);
            }
        }
        order.sort();
        self.antenna_order.insert(station, order);
    }

    pub fn current_trace_index(&self) -> usize {
        self.trace_index
    }

    pub fn cache_invalidations(&self) -> u64 {
        self.cache_invalidations
    }

    pub fn gain_recomputations(&self) -> u64 {
        self.gain_recomputations
    }

    /// Recompute the trace index from virtual time. When it advances the
    /// entire gain cache is cleared; the index never runs past the last
    /// recorded step (the channel freezes at its final state).
    pub fn handle_mobility(&mut self, now: SimTime) {
        let Some(interval) = self.config.update_interval else {
            return;
        };
        let elapsed = now.saturating_since(self.start);
        let index = (elapsed.as_nanos() / interval.as_nanos().max(1)) as usize;
        if index != self.trace_index {
            self.trace_index = index;
            self.gain_cache.clear();
            self.cache_invalidations += 1;
            debug!(trace_index = index, "trace index advanced, gain cache cleared");
        }
    }

    // ── Trace loading ───────────────────────────────────────────────────

    fn trace_path(&self, tx: StationId, rx: StationId) -> PathBuf {
        self.config.directory.join(format!("Tx{}Rx{}.txt", tx.0, rx.0))
    }

    fn ensure_loaded(&mut self, tx: StationId, rx: StationId) -> QdResult<()> {
        if self.traces.contains_key(&(tx, rx)) {
            return Ok(());
        }
        let trace = self.load_pair(tx, rx)?;
        self.traces.insert((tx, rx), trace);
        Ok(())
    }

    fn load_pair(&self, tx: StationId, rx: StationId) -> QdResult<QdTrace> {
        let path = self.trace_path(tx, rx);
        let path_str = path.display().to_string();
        let tx_antennas = self
            .antenna_order
            .get(&tx)
            .ok_or(QdChannelError::UnregisteredStation(tx))?
            .clone();
        let rx_antennas = self
            .antenna_order
            .get(&rx)
            .ok_or(QdChannelError::UnregisteredStation(rx))?
            .clone();

        let file = File::open(&path).map_err(|e| QdChannelError::Io {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut next_line = || -> QdResult<Option<String>> {
            for line in lines.by_ref() {
                let line = line.map_err(|e| QdChannelError::Io {
                    path: path_str.clone(),
                    reason: e.to_string(),
                })?;
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    return Ok(Some(trimmed));
                }
            }
            Ok(None)
        };

        let malformed = |reason: String| QdChannelError::Malformed {
            path: self.trace_path(tx, rx).display().to_string(),
            reason,
        };

        // Doppler phase rates are drawn once per (path, trace index); the
        // per-pair seeding keeps runs reproducible.
        let pair_seed = self
            .config
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(((tx.0 as u64) << 16) | rx.0 as u64);
        let mut rng = StdRng::seed_from_u64(pair_seed);
        let doppler_std = self.config.max_doppler_hz.max(0.0);
        let doppler_dist = Normal::new(0.0, (doppler_std + f64::EPSILON).max(1e-12)).unwrap();
        let doppler_enabled = self.config.update_interval.is_some() && doppler_std > 0.0;

        let mut steps = Vec::new();
        'steps: loop {
            let mut step: HashMap<(AntennaId, AntennaId), Vec<PathParams>> = HashMap::new();
            for (combo, (&ta, &ra)) in tx_antennas
                .iter()
                .flat_map(|t| rx_antennas.iter().map(move |r| (t, r)))
                .enumerate()
            {
                let count_line = match next_line()? {
                    Some(line) => line,
                    // EOF is only legal on a step boundary.
                    None if combo == 0 => break 'steps,
                    None => {
                        return Err(malformed("truncated antenna-combination block".into()))
                    }
                };
                let count: usize = count_line
                    .parse()
                    .map_err(|_| malformed(format!("bad path count {count_line:?}")))?;
                if count == 0 {
                    step.insert((ta, ra), Vec::new());
                    continue;
                }

                let mut rows: Vec<Vec<f64>> = Vec::with_capacity(7);
                for field in [
                    "delay", "path loss", "phase", "AoD elevation", "AoD azimuth",
                    "AoA elevation", "AoA azimuth",
                ] {
                    let line = next_line()?
                        .ok_or_else(|| malformed(format!("missing {field} line")))?;
                    let values: Vec<f64> = line
                        .split(',')
                        .map(|tok| {
                            tok.trim()
                                .parse()
                                .map_err(|_| malformed(format!("bad {field} value {tok:?}")))
                        })
                        .collect::<QdResult<_>>()?;
                    if values.len() != count {
                        return Err(malformed(format!(
                            "{field} line carries {} values, expected {count}",
                            values.len()
                        )));
                    }
                    rows.push(values);
                }

                let tx_orientation = self.orientations[&(tx, ta)];
                let rx_orientation = self.orientations[&(rx, ra)];
                let paths = (0..count)
                    .map(|p| {
                        let aod_az = rows[4][p].to_radians();
                        let aod_el = rows[3][p].to_radians();
                        let aoa_az = rows[6][p].to_radians();
                        let aoa_el = rows[5][p].to_radians();
                        let doppler_rate = if doppler_enabled {
                            2.0 * PI * doppler_dist.sample(&mut rng)
                        } else {
                            0.0
                        };
                        PathParams {
                            delay_s: rows[0][p],
                            path_loss_db: rows[1][p],
                            phase_rad: rows[2][p],
                            aod_local: tx_orientation.global_to_local(aod_az, aod_el),
                            aoa_local: rx_orientation.global_to_local(aoa_az, aoa_el),
                            doppler_rate,
                        }
                    })
                    .collect();
                step.insert((ta, ra), paths);
            }
            steps.push(step);
        }

        if steps.is_empty() {
            return Err(malformed("trace file carries no steps".into()));
        }
        debug!(?tx, ?rx, steps = steps.len(), "loaded Q-D trace");
        Ok(QdTrace { steps })
    }

    // ── Gain computation ────────────────────────────────────────────────

    fn resolve_paths(&self, id: QdChannelId) -> QdResult<&[PathParams]> {
        let trace = &self.traces[&(id.tx, id.rx)];
        // Freeze at the last recorded step if the simulation outlives the
        // trace.
        let index = id.trace_index.min(trace.steps.len() - 1);
        trace.steps[index]
            .get(&(id.tx_antenna, id.rx_antenna))
            .map(|v| v.as_slice())
            .ok_or(QdChannelError::UnknownAntennaPair {
                tx: id.tx,
                rx: id.rx,
                tx_antenna: id.tx_antenna,
                rx_antenna: id.rx_antenna,
            })
    }

    /// Per-subcarrier linear power gain |H_k|^2 for a link under the given
    /// Tx/Rx patterns. Zero paths between the antenna pair means a blocked
    /// link: all-zero gain.
    fn compute_gain(
        &self,
        id: QdChannelId,
        tx_codebook: &Codebook,
        rx_codebook: &Codebook,
        tx_pattern: ActivePattern,
        rx_pattern: ActivePattern,
    ) -> QdResult<Vec<f64>> {
        let paths = self.resolve_paths(id)?;
        let n = self.config.num_subcarriers;
        if paths.is_empty() {
            return Ok(vec![0.0; n]);
        }

        // Doppler is evaluated at the step's start so the gain is constant
        // within one trace index (matching the coarse cache invalidation).
        let step_time = self
            .config
            .update_interval
            .map(|iv| id.trace_index as f64 * iv.as_secs_f64())
            .unwrap_or(0.0);

        let mut gains = Vec::with_capacity(n);
        for k in 0..n {
            // Baseband subcarrier offset from the carrier.
            let f_k = (k as f64 - n as f64 / 2.0) * self.config.subcarrier_spacing_hz;
            let mut sum = Complex64::new(0.0, 0.0);
            for path in paths {
                let amp = db_to_amplitude(-path.path_loss_db);
                let tx_gain = db_to_amplitude(
                    tx_codebook.gain_dbi(tx_pattern, path.aod_local.0, path.aod_local.1)
                        .map_err(|_| QdChannelError::UnregisteredStation(id.tx))?,
                );
                let rx_gain = db_to_amplitude(
                    rx_codebook.gain_dbi(rx_pattern, path.aoa_local.0, path.aoa_local.1)
                        .map_err(|_| QdChannelError::UnregisteredStation(id.rx))?,
                );
                let phase = path.phase_rad
                    + 2.0 * PI * f_k * path.delay_s
                    + path.doppler_rate * step_time;
                sum += Complex64::from_polar(amp * tx_gain * rx_gain, phase);
            }
            gains.push(sum.norm_sqr());
        }
        Ok(gains)
    }

    /// Cached per-subcarrier gain between two stations for the given
    /// pattern pair, using each pattern's owning antenna for the multipath
    /// lookup.
    pub fn channel_gain(
        &mut self,
        tx: StationId,
        rx: StationId,
        tx_codebook: &Codebook,
        rx_codebook: &Codebook,
        tx_pattern: ActivePattern,
        rx_pattern: ActivePattern,
        now: SimTime,
    ) -> QdResult<Vec<f64>> {
        self.handle_mobility(now);
        self.ensure_loaded(tx, rx)?;

        let key = GainKey {
            tx,
            rx,
            tx_pattern,
            rx_pattern,
        };
        if let Some(cached) = self.gain_cache.get(&key) {
            return Ok(cached.clone());
        }

        let id = QdChannelId {
            tx,
            rx,
            trace_index: self.trace_index,
            tx_antenna: tx_pattern.antenna(),
            rx_antenna: rx_pattern.antenna(),
        };
        let gains = self.compute_gain(id, tx_codebook, rx_codebook, tx_pattern, rx_pattern)?;
        self.gain_recomputations += 1;
        self.gain_cache.insert(key, gains.clone());
        Ok(gains)
    }

    /// Apply the link gain to a transmit PSD (one entry per subcarrier).
    pub fn rx_psd(
        &mut self,
        tx_psd: &[f64],
        tx: StationId,
        rx: StationId,
        tx_codebook: &Codebook,
        rx_codebook: &Codebook,
        tx_pattern: ActivePattern,
        rx_pattern: ActivePattern,
        now: SimTime,
    ) -> QdResult<Vec<f64>> {
        let gains =
            self.channel_gain(tx, rx, tx_codebook, rx_codebook, tx_pattern, rx_pattern, now)?;
        Ok(tx_psd
            .iter()
            .zip(gains.iter())
            .map(|(&p, &g)| p * g)
            .collect())
    }

    /// Total received power for a transmit power spread evenly across the
    /// active subcarriers.
    pub fn rx_power_w(
        &mut self,
        tx_power_w: f64,
        tx: StationId,
        rx: StationId,
        tx_codebook: &Codebook,
        rx_codebook: &Codebook,
        tx_pattern: ActivePattern,
        rx_pattern: ActivePattern,
        now: SimTime,
    ) -> QdResult<f64> {
        let n = self.config.num_subcarriers.max(1);
        let per_subcarrier = tx_power_w / n as f64;
        let gains =
            self.channel_gain(tx, rx, tx_codebook, rx_codebook, tx_pattern, rx_pattern, now)?;
        Ok(gains.iter().map(|g| per_subcarrier * g).sum())
    }

    /// Received power for every combination of the Tx codebook's active
    /// Tx patterns and the Rx codebook's active Rx patterns: one entry per
    /// `(tx_pattern, rx_pattern)` pair, in cross-product order. Each
    /// combination's gain curve is cached independently, so SU/MU-MIMO can
    /// evaluate many simultaneous streams without re-deriving ray geometry.
    #[allow(clippy::too_many_arguments)]
    pub fn calc_mimo_rx_power(
        &mut self,
        tx_power_w: f64,
        tx: StationId,
        rx: StationId,
        tx_codebook: &Codebook,
        rx_codebook: &Codebook,
        now: SimTime,
    ) -> QdResult<Vec<f64>> {
        let tx_patterns = tx_codebook
            .active_tx_pattern_list()
            .map_err(|_| QdChannelError::UnregisteredStation(tx))?;
        let rx_patterns = rx_codebook
            .active_rx_pattern_list()
            .map_err(|_| QdChannelError::UnregisteredStation(rx))?;
        let mut powers = Vec::with_capacity(tx_patterns.len() * rx_patterns.len());
        for &tp in &tx_patterns {
            for &rp in &rx_patterns {
                powers.push(
                    self.rx_power_w(tx_power_w, tx, rx, tx_codebook, rx_codebook, tp, rp, now)?,
                );
            }
        }
        Ok(powers)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SectorId;
    use std::io::Write;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn temp_trace_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wigig-qd-{}-{}", std::process::id(), tag));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// One 1x1-antenna pair, two steps: a single boresight path, then a
    /// blocked link.
    fn write_two_step_trace(dir: &PathBuf, tx: StationId, rx: StationId) {
        let mut f = File::create(dir.join(format!("Tx{}Rx{}.txt", tx.0, rx.0))).unwrap();
        // Step 0: one path, 80 dB loss, AoD toward +22.5 deg azimuth.
        writeln!(f, "1").unwrap();
        writeln!(f, "1.0e-8").unwrap();
        writeln!(f, "80.0").unwrap();
        writeln!(f, "0.0").unwrap();
        writeln!(f, "0.0").unwrap();
        writeln!(f, "22.5").unwrap();
        writeln!(f, "0.0").unwrap();
        writeln!(f, "-157.5").unwrap();
        // Step 1: blocked.
        writeln!(f, "0").unwrap();
    }

    fn setup() -> (QdPropagationEngine, Codebook, Codebook, PathBuf) {
        let dir = temp_trace_dir("basic");
        let tx = StationId(1);
        let rx = StationId(2);
        write_two_step_trace(&dir, tx, rx);

        let config = QdChannelConfig {
            directory: dir.clone(),
            update_interval: Some(Duration::from_millis(100)),
            num_subcarriers: 8,
            ..Default::default()
        };
        let mut engine = QdPropagationEngine::new(config);
        let tx_cb = Codebook::uniform(1, 8, 0).unwrap();
        let rx_cb = Codebook::uniform(1, 8, 0).unwrap();
        engine.register_station(tx, &tx_cb);
        engine.register_station(rx, &rx_cb);
        (engine, tx_cb, rx_cb, dir)
    }

    fn boresight_pattern() -> ActivePattern {
        // Sector 5 of the 8-sector fan covers [0, 45) degrees azimuth.
        ActivePattern::Sector {
            antenna: AntennaId(1),
            sector: SectorId(5),
        }
    }

    fn quasi_omni() -> ActivePattern {
        ActivePattern::QuasiOmni {
            antenna: AntennaId(1),
        }
    }

    #[test]
    fn test_single_path_gain() {
        let (mut engine, tx_cb, rx_cb, _dir) = setup();
        let gains = engine
            .channel_gain(
                StationId(1),
                StationId(2),
                &tx_cb,
                &rx_cb,
                boresight_pattern(),
                quasi_omni(),
                SimTime::ZERO,
            )
            .unwrap();
        assert_eq!(gains.len(), 8);

        // Single path: |H|^2 = (10^(-80/20) * g_tx * g_rx)^2 at every
        // subcarrier, independent of the per-subcarrier delay phase.
        let shape = tx_cb.pattern_shape(boresight_pattern()).unwrap();
        let expected = (db_to_amplitude(-80.0) * db_to_amplitude(shape.peak_gain_dbi)).powi(2);
        for &g in &gains {
            assert!(approx_eq(g, expected, expected * 1e-9), "gain {g} != {expected}");
        }
    }

    #[test]
    fn test_mismatched_sector_sees_floor_gain() {
        let (mut engine, tx_cb, rx_cb, _dir) = setup();
        // Sector 1 points away from the path's departure angle.
        let wrong = ActivePattern::Sector {
            antenna: AntennaId(1),
            sector: SectorId(1),
        };
        let good = engine
            .channel_gain(
                StationId(1),
                StationId(2),
                &tx_cb,
                &rx_cb,
                boresight_pattern(),
                quasi_omni(),
                SimTime::ZERO,
            )
            .unwrap();
        let bad = engine
            .channel_gain(
                StationId(1),
                StationId(2),
                &tx_cb,
                &rx_cb,
                wrong,
                quasi_omni(),
                SimTime::ZERO,
            )
            .unwrap();
        assert!(bad[0] < good[0] / 100.0, "mismatched beam should be well down");
    }

    #[test]
    fn test_blocked_link_after_trace_advance() {
        let (mut engine, tx_cb, rx_cb, _dir) = setup();
        let at_step1 = SimTime::from_millis(150);
        let gains = engine
            .channel_gain(
                StationId(1),
                StationId(2),
                &tx_cb,
                &rx_cb,
                boresight_pattern(),
                quasi_omni(),
                at_step1,
            )
            .unwrap();
        assert!(gains.iter().all(|&g| g == 0.0), "blocked link has zero gain");
    }

    #[test]
    fn test_cache_and_invalidation() {
        let (mut engine, tx_cb, rx_cb, _dir) = setup();
        let query = |e: &mut QdPropagationEngine, t| {
            e.channel_gain(
                StationId(1),
                StationId(2),
                &tx_cb,
                &rx_cb,
                boresight_pattern(),
                quasi_omni(),
                t,
            )
            .unwrap()
        };
        query(&mut engine, SimTime::ZERO);
        query(&mut engine, SimTime::ZERO);
        assert_eq!(engine.gain_recomputations(), 1, "second query is cached");

        query(&mut engine, SimTime::from_millis(150));
        assert_eq!(engine.cache_invalidations(), 1);
        assert_eq!(engine.gain_recomputations(), 2, "advance recomputes");
    }

    #[test]
    fn test_trace_freezes_at_last_step() {
        let (mut engine, tx_cb, rx_cb, _dir) = setup();
        // Far beyond the 2-step trace: index clamps to the final (blocked)
        // step instead of failing.
        let gains = engine
            .channel_gain(
                StationId(1),
                StationId(2),
                &tx_cb,
                &rx_cb,
                boresight_pattern(),
                quasi_omni(),
                SimTime::from_secs_f64(30.0),
            )
            .unwrap();
        assert!(gains.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = temp_trace_dir("missing");
        let config = QdChannelConfig {
            directory: dir,
            ..Default::default()
        };
        let mut engine = QdPropagationEngine::new(config);
        let cb = Codebook::uniform(1, 4, 0).unwrap();
        engine.register_station(StationId(7), &cb);
        engine.register_station(StationId(8), &cb);
        let err = engine
            .channel_gain(
                StationId(7),
                StationId(8),
                &cb,
                &cb,
                ActivePattern::Sector {
                    antenna: AntennaId(1),
                    sector: SectorId(1),
                },
                ActivePattern::QuasiOmni {
                    antenna: AntennaId(1),
                },
                SimTime::ZERO,
            )
            .unwrap_err();
        assert!(matches!(err, QdChannelError::Io { .. }));
    }

    #[test]
    fn test_truncated_file_is_malformed() {
        let dir = temp_trace_dir("truncated");
        let tx = StationId(3);
        let rx = StationId(4);
        let mut f = File::create(dir.join(format!("Tx{}Rx{}.txt", tx.0, rx.0))).unwrap();
        writeln!(f, "2").unwrap();
        writeln!(f, "1e-8,2e-8").unwrap();
        // Missing the remaining six lines.
        drop(f);

        let config = QdChannelConfig {
            directory: dir,
            ..Default::default()
        };
        let mut engine = QdPropagationEngine::new(config);
        let cb = Codebook::uniform(1, 4, 0).unwrap();
        engine.register_station(tx, &cb);
        engine.register_station(rx, &cb);
        let err = engine
            .channel_gain(
                tx,
                rx,
                &cb,
                &cb,
                ActivePattern::Sector {
                    antenna: AntennaId(1),
                    sector: SectorId(1),
                },
                ActivePattern::QuasiOmni {
                    antenna: AntennaId(1),
                },
                SimTime::ZERO,
            )
            .unwrap_err();
        assert!(matches!(err, QdChannelError::Malformed { .. }));
    }

    #[test]
    fn test_mimo_cross_product_size() {
        let dir = temp_trace_dir("mimo");
        let tx = StationId(5);
        let rx = StationId(6);
        // 2x2 antennas: four combination blocks per step.
        let mut f = File::create(dir.join(format!("Tx{}Rx{}.txt", tx.0, rx.0))).unwrap();
        for _ in 0..4 {
            writeln!(f, "1").unwrap();
            writeln!(f, "1.0e-8").unwrap();
            writeln!(f, "85.0").unwrap();
            writeln!(f, "0.0").unwrap();
            writeln!(f, "0.0").unwrap();
            writeln!(f, "0.0").unwrap();
            writeln!(f, "0.0").unwrap();
            writeln!(f, "180.0").unwrap();
        }
        drop(f);

        let config = QdChannelConfig {
            directory: dir,
            num_subcarriers: 4,
            ..Default::default()
        };
        let mut engine = QdPropagationEngine::new(config);
        let tx_cb = Codebook::uniform_mimo(2, 1, 4, 0).unwrap();
        let rx_cb = Codebook::uniform_mimo(2, 1, 4, 0).unwrap();
        engine.register_station(tx, &tx_cb);
        engine.register_station(rx, &rx_cb);

        let powers = engine
            .calc_mimo_rx_power(0.1, tx, rx, &tx_cb, &rx_cb, SimTime::ZERO)
            .unwrap();
        // 2 active Tx patterns x 2 active Rx patterns.
        assert_eq!(powers.len(), 4);
        assert!(powers.iter().all(|&p| p >= 0.0));
    }
}
