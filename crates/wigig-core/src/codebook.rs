//! Antenna codebook and RF-chain model
//!
//! Single source of truth for "which antenna pattern is currently applied"
//! at a station, and the cursor API the beamforming training protocols use to
//! step through sector and AWV sweeps.
//!
//! ## Model
//!
//! - An [`AntennaArray`] is a phased array with an orientation, a fan of
//!   directional [`Sector`]s and a quasi-omni pattern for discovery reception.
//! - A [`Sector`] carries an ordered list of [`Awv`] refinements: narrower
//!   beams layered inside the sector's coarse lobe.
//! - An [`RfChain`] owns one or more arrays and holds exactly one active
//!   antenna/sector/AWV configuration per direction (Tx, Rx) at any simulated
//!   instant. Training protocols mutate this cursor; the propagation and
//!   interference engines only ever read the resolved [`ActivePattern`].
//! - A [`Codebook`] is the per-station collection of RF chains.
//!
//! Sweep cursors are explicit `(index, length)` pairs into owned vectors, so
//! mutating a sweep list between steps cannot invalidate a cursor.

use crate::types::{AntennaId, AwvId, SectorId};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Result type for codebook operations.
pub type CodebookResult<T> = Result<T, CodebookError>;

/// Errors raised by codebook configuration and cursor operations.
///
/// These are configuration/programming errors: a simulation scenario that
/// triggers one is mis-built, and callers are expected to fail the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodebookError {
    #[error("antenna array {0} is already connected to an RF chain")]
    ArrayAlreadyConnected(AntennaId),

    #[error("antenna {0} is already present on this RF chain")]
    DuplicateAntenna(AntennaId),

    #[error("unknown antenna {0}")]
    UnknownAntenna(AntennaId),

    #[error("unknown sector {sector} on antenna {antenna}")]
    UnknownSector { antenna: AntennaId, sector: SectorId },

    #[error("AWV index {1:?} out of range for sector {0}")]
    UnknownAwv(SectorId, AwvId),

    #[error("no sector is active; select a sector before an AWV")]
    NoSectorActive,

    #[error("RF chain has no connected antenna arrays")]
    NoAntennas,

    #[error("MIMO sector sweep has not been configured")]
    MimoSweepNotConfigured,

    #[error("sweep list must not be empty")]
    EmptySweepList,
}

// ── Orientation ─────────────────────────────────────────────────────────────

/// Array mounting orientation as intrinsic Euler angles (radians):
/// `psi` about z (azimuth), `theta` about y (tilt), `phi` about x (roll).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub psi: f64,
    pub theta: f64,
    pub phi: f64,
}

impl Orientation {
    pub fn new(psi: f64, theta: f64, phi: f64) -> Self {
        Self { psi, theta, phi }
    }

    /// Rotate a global-frame direction `(azimuth, elevation)` into this
    /// array's local frame. Used once per antenna pair at trace-load time;
    /// pattern evaluation then works purely in local coordinates.
    pub fn global_to_local(&self, az: f64, el: f64) -> (f64, f64) {
        // Direction as a unit vector.
        let (x, y, z) = (el.cos() * az.cos(), el.cos() * az.sin(), el.sin());

        let (sp, cp) = self.psi.sin_cos();
        let (st, ct) = self.theta.sin_cos();
        let (sr, cr) = self.phi.sin_cos();

        // Rows of R = Rz(psi) * Ry(theta) * Rx(phi); local = R^T * global.
        let r00 = cp * ct;
        let r01 = cp * st * sr - sp * cr;
        let r02 = cp * st * cr + sp * sr;
        let r10 = sp * ct;
        let r11 = sp * st * sr + cp * cr;
        let r12 = sp * st * cr - cp * sr;
        let r20 = -st;
        let r21 = ct * sr;
        let r22 = ct * cr;

        let lx = r00 * x + r10 * y + r20 * z;
        let ly = r01 * x + r11 * y + r21 * z;
        let lz = r02 * x + r12 * y + r22 * z;

        (ly.atan2(lx), lz.clamp(-1.0, 1.0).asin())
    }
}

// ── Patterns ────────────────────────────────────────────────────────────────

/// Parametric directional pattern: a cone-style main lobe with a flat
/// side/back-lobe floor. Angles are in the owning array's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternShape {
    /// Main-lobe azimuth (radians).
    pub boresight_az: f64,
    /// Main-lobe elevation (radians).
    pub boresight_el: f64,
    /// Full main-lobe width (radians).
    pub beamwidth: f64,
    /// Gain inside the main lobe (dBi).
    pub peak_gain_dbi: f64,
    /// Gain outside the main lobe (dBi).
    pub floor_gain_dbi: f64,
}

impl PatternShape {
    /// A unity-gain pattern covering the full sphere, used for quasi-omni
    /// reception during discovery.
    pub fn quasi_omni() -> Self {
        Self {
            boresight_az: 0.0,
            boresight_el: 0.0,
            beamwidth: 2.0 * PI,
            peak_gain_dbi: 0.0,
            floor_gain_dbi: 0.0,
        }
    }

    /// Angular separation between this pattern's boresight and a direction.
    fn off_axis_angle(&self, az: f64, el: f64) -> f64 {
        let dot = self.boresight_el.cos() * el.cos() * (az - self.boresight_az).cos()
            + self.boresight_el.sin() * el.sin();
        dot.clamp(-1.0, 1.0).acos()
    }

    /// Directivity toward `(az, el)` in dBi.
    pub fn gain_dbi(&self, az: f64, el: f64) -> f64 {
        if self.off_axis_angle(az, el) <= self.beamwidth / 2.0 {
            self.peak_gain_dbi
        } else {
            self.floor_gain_dbi
        }
    }
}

/// A fine AWV refinement inside a sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Awv {
    pub shape: PatternShape,
}

/// A coarse directional sector plus its ordered AWV refinements.
/// Immutable once constructed by configuration load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub shape: PatternShape,
    pub awvs: Vec<Awv>,
}

/// One physical phased array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaArray {
    pub id: AntennaId,
    pub orientation: Orientation,
    pub sectors: Vec<Sector>,
    pub quasi_omni: PatternShape,
    /// Set once when the array is bound to an RF chain.
    connected: bool,
}

impl AntennaArray {
    pub fn new(id: AntennaId, orientation: Orientation, sectors: Vec<Sector>) -> Self {
        Self {
            id,
            orientation,
            sectors,
            quasi_omni: PatternShape::quasi_omni(),
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn sector_index(&self, sector: SectorId) -> Option<usize> {
        self.sectors.iter().position(|s| s.id == sector)
    }
}

/// The exact pattern in use for one direction, as the propagation and
/// interference engines query it. For sector mode the pattern index is the
/// sector ID; for custom-AWV mode it is the AWV index within that sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivePattern {
    Sector { antenna: AntennaId, sector: SectorId },
    Custom { antenna: AntennaId, sector: SectorId, awv: AwvId },
    QuasiOmni { antenna: AntennaId },
}

impl ActivePattern {
    pub fn antenna(&self) -> AntennaId {
        match *self {
            ActivePattern::Sector { antenna, .. }
            | ActivePattern::Custom { antenna, .. }
            | ActivePattern::QuasiOmni { antenna } => antenna,
        }
    }

    /// The pattern index the engines key caches by: sector ID when in sector
    /// mode, AWV index when a custom AWV is applied.
    pub fn pattern_index(&self) -> u8 {
        match *self {
            ActivePattern::Sector { sector, .. } => sector.0,
            ActivePattern::Custom { awv, .. } => awv.0,
            ActivePattern::QuasiOmni { .. } => 0,
        }
    }
}

// ── RF chain ────────────────────────────────────────────────────────────────

/// Per-direction cursor state. At most one of sector mode / AWV mode is in
/// force: selecting a sector clears the AWV, selecting an AWV requires a
/// sector.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DirectionState {
    sector: usize,
    awv: Option<usize>,
    quasi_omni: bool,
}

impl DirectionState {
    fn sector_mode(sector: usize) -> Self {
        Self {
            sector,
            awv: None,
            quasi_omni: false,
        }
    }
}

/// Cursor state for a MIMO candidate-sector sweep: a list of `(antenna,
/// sector)` candidates optionally crossed with a list of AWVs, stepped in
/// list order with wraparound.
#[derive(Debug, Clone)]
struct MimoSweep {
    sectors: Vec<(AntennaId, SectorId)>,
    awvs: Vec<AwvId>,
    sector_pos: usize,
    awv_pos: usize,
}

/// The active-configuration cursor over one station's antenna hardware.
///
/// Created once at device setup, [`reset`](RfChain::reset) at initialization,
/// mutated continuously by training logic as sweeps progress.
#[derive(Debug, Clone)]
pub struct RfChain {
    antennas: Vec<AntennaArray>,
    active_antenna: usize,
    tx: DirectionState,
    rx: DirectionState,
    /// Quasi-omni discovery cursor: index of the antenna currently listening.
    quasi_cursor: usize,
    mimo_sweep: Option<MimoSweep>,
    pattern_switches: u64,
}

impl Default for RfChain {
    fn default() -> Self {
        Self::new()
    }
}

impl RfChain {
    pub fn new() -> Self {
        Self {
            antennas: Vec::new(),
            active_antenna: 0,
            tx: DirectionState::sector_mode(0),
            rx: DirectionState {
                sector: 0,
                awv: None,
                quasi_omni: true,
            },
            quasi_cursor: 0,
            mimo_sweep: None,
            pattern_switches: 0,
        }
    }

    /// Bind an antenna array to this chain. One-time: an array already
    /// connected (here or elsewhere) is a configuration error.
    pub fn connect_antenna_array(&mut self, mut array: AntennaArray) -> CodebookResult<()> {
        if array.connected {
            return Err(CodebookError::ArrayAlreadyConnected(array.id));
        }
        if self.antennas.iter().any(|a| a.id == array.id) {
            return Err(CodebookError::DuplicateAntenna(array.id));
        }
        array.connected = true;
        self.antennas.push(array);
        // Keep sweeps in antenna-ID order regardless of connection order.
        self.antennas.sort_by_key(|a| a.id);
        Ok(())
    }

    /// Reset to the initial configuration: first antenna, first Tx sector,
    /// quasi-omni reception. Called once at device initialization.
    pub fn reset(&mut self) -> CodebookResult<()> {
        if self.antennas.is_empty() {
            return Err(CodebookError::NoAntennas);
        }
        self.active_antenna = 0;
        self.tx = DirectionState::sector_mode(0);
        self.rx = DirectionState {
            sector: 0,
            awv: None,
            quasi_omni: true,
        };
        self.quasi_cursor = 0;
        self.mimo_sweep = None;
        Ok(())
    }

    pub fn antennas(&self) -> &[AntennaArray] {
        &self.antennas
    }

    pub fn antenna_count(&self) -> usize {
        self.antennas.len()
    }

    pub fn active_antenna_id(&self) -> CodebookResult<AntennaId> {
        self.antennas
            .get(self.active_antenna)
            .map(|a| a.id)
            .ok_or(CodebookError::NoAntennas)
    }

    fn lookup(&self, antenna: AntennaId, sector: SectorId) -> CodebookResult<(usize, usize)> {
        let aidx = self
            .antennas
            .iter()
            .position(|a| a.id == antenna)
            .ok_or(CodebookError::UnknownAntenna(antenna))?;
        let sidx = self.antennas[aidx]
            .sector_index(sector)
            .ok_or(CodebookError::UnknownSector { antenna, sector })?;
        Ok((aidx, sidx))
    }

    /// Switch the active antenna and Tx sector together. Clears any custom
    /// AWV so no intermediate inconsistent state is observable.
    pub fn set_active_tx_sector(
        &mut self,
        antenna: AntennaId,
        sector: SectorId,
    ) -> CodebookResult<()> {
        let (aidx, sidx) = self.lookup(antenna, sector)?;
        self.active_antenna = aidx;
        self.tx = DirectionState::sector_mode(sidx);
        self.pattern_switches += 1;
        Ok(())
    }

    /// Switch the active antenna and Rx sector together, leaving quasi-omni
    /// mode. Clears any custom Rx AWV.
    pub fn set_active_rx_sector(
        &mut self,
        antenna: AntennaId,
        sector: SectorId,
    ) -> CodebookResult<()> {
        let (aidx, sidx) = self.lookup(antenna, sector)?;
        self.active_antenna = aidx;
        self.rx = DirectionState::sector_mode(sidx);
        self.pattern_switches += 1;
        Ok(())
    }

    /// Select a fine AWV inside the currently active Tx sector.
    pub fn set_active_tx_awv(&mut self, awv: AwvId) -> CodebookResult<()> {
        let antenna = &self.antennas[self.active_antenna];
        let sector = &antenna.sectors[self.tx.sector];
        if (awv.0 as usize) >= sector.awvs.len() {
            return Err(CodebookError::UnknownAwv(sector.id, awv));
        }
        self.tx.awv = Some(awv.0 as usize);
        self.pattern_switches += 1;
        Ok(())
    }

    /// Select a fine AWV inside the currently active Rx sector. Requires a
    /// sector (not quasi-omni) to already be active.
    pub fn set_active_rx_awv(&mut self, awv: AwvId) -> CodebookResult<()> {
        if self.rx.quasi_omni {
            return Err(CodebookError::NoSectorActive);
        }
        let antenna = &self.antennas[self.active_antenna];
        let sector = &antenna.sectors[self.rx.sector];
        if (awv.0 as usize) >= sector.awvs.len() {
            return Err(CodebookError::UnknownAwv(sector.id, awv));
        }
        self.rx.awv = Some(awv.0 as usize);
        self.pattern_switches += 1;
        Ok(())
    }

    fn direction_pattern(&self, dir: &DirectionState) -> CodebookResult<ActivePattern> {
        let antenna = self
            .antennas
            .get(self.active_antenna)
            .ok_or(CodebookError::NoAntennas)?;
        if dir.quasi_omni {
            return Ok(ActivePattern::QuasiOmni { antenna: antenna.id });
        }
        let sector = &antenna.sectors[dir.sector];
        Ok(match dir.awv {
            Some(awv) => ActivePattern::Custom {
                antenna: antenna.id,
                sector: sector.id,
                awv: AwvId(awv as u8),
            },
            None => ActivePattern::Sector {
                antenna: antenna.id,
                sector: sector.id,
            },
        })
    }

    /// The exact Tx pattern in use right now. Engines query this, not the
    /// sector/AWV fields separately.
    pub fn active_tx_pattern(&self) -> CodebookResult<ActivePattern> {
        self.direction_pattern(&self.tx)
    }

    /// The exact Rx pattern in use right now.
    pub fn active_rx_pattern(&self) -> CodebookResult<ActivePattern> {
        self.direction_pattern(&self.rx)
    }

    pub fn is_tx_in_awv_mode(&self) -> bool {
        self.tx.awv.is_some()
    }

    pub fn is_rx_in_awv_mode(&self) -> bool {
        !self.rx.quasi_omni && self.rx.awv.is_some()
    }

    /// Diagnostic: how many times the active configuration changed.
    pub fn pattern_switch_count(&self) -> u64 {
        self.pattern_switches
    }

    // ── Quasi-omni discovery cursor ─────────────────────────────────────

    /// Begin quasi-omni reception, starting the antenna cycle at the first
    /// connected antenna (antenna-ID order).
    pub fn start_receiving_in_quasi_omni_mode(&mut self) -> CodebookResult<()> {
        if self.antennas.is_empty() {
            return Err(CodebookError::NoAntennas);
        }
        self.rx = DirectionState {
            sector: 0,
            awv: None,
            quasi_omni: true,
        };
        self.quasi_cursor = 0;
        self.active_antenna = 0;
        Ok(())
    }

    /// Advance the quasi-omni cursor to the next antenna. Returns `false`
    /// exactly when wrapping back to the first antenna, signalling one full
    /// sweep pass is complete.
    pub fn switch_to_next_quasi_pattern(&mut self) -> CodebookResult<bool> {
        if self.antennas.is_empty() {
            return Err(CodebookError::NoAntennas);
        }
        self.quasi_cursor += 1;
        if self.quasi_cursor >= self.antennas.len() {
            self.quasi_cursor = 0;
            self.active_antenna = 0;
            Ok(false)
        } else {
            self.active_antenna = self.quasi_cursor;
            Ok(true)
        }
    }

    // ── MIMO sector-sweep cursor ────────────────────────────────────────

    /// Configure a MIMO candidate sweep over `sectors`, optionally crossed
    /// with `awvs`. Cursors start at the head of each list.
    pub fn set_up_mimo_sector_sweeping(
        &mut self,
        sectors: Vec<(AntennaId, SectorId)>,
        awvs: Vec<AwvId>,
    ) -> CodebookResult<()> {
        if sectors.is_empty() {
            return Err(CodebookError::EmptySweepList);
        }
        for &(antenna, sector) in &sectors {
            self.lookup(antenna, sector)?;
        }
        self.mimo_sweep = Some(MimoSweep {
            sectors,
            awvs,
            sector_pos: 0,
            awv_pos: 0,
        });
        Ok(())
    }

    /// Apply and return the next candidate sector in list order, wrapping to
    /// the start when exhausted.
    pub fn next_mimo_sector(&mut self) -> CodebookResult<(AntennaId, SectorId)> {
        let sweep = self
            .mimo_sweep
            .as_mut()
            .ok_or(CodebookError::MimoSweepNotConfigured)?;
        let (antenna, sector) = sweep.sectors[sweep.sector_pos];
        sweep.sector_pos = (sweep.sector_pos + 1) % sweep.sectors.len();
        self.set_active_tx_sector(antenna, sector)?;
        Ok((antenna, sector))
    }

    /// Apply the next AWV from the sweep's AWV list to the active sector and
    /// advance the AWV cursor. Returns `true` when the AWV list wrapped,
    /// telling the caller to also advance the outer sector cursor. With an
    /// empty AWV list every step reports a wrap.
    pub fn next_awv_with_combinations(&mut self) -> CodebookResult<bool> {
        let sweep = self
            .mimo_sweep
            .as_mut()
            .ok_or(CodebookError::MimoSweepNotConfigured)?;
        if sweep.awvs.is_empty() {
            return Ok(true);
        }
        let awv = sweep.awvs[sweep.awv_pos];
        let wrapped = sweep.awv_pos + 1 >= sweep.awvs.len();
        sweep.awv_pos = (sweep.awv_pos + 1) % sweep.awvs.len();
        self.set_active_tx_awv(awv)?;
        Ok(wrapped)
    }

    /// AWVs of the active Tx sector not yet tried in the current refinement
    /// sweep. Callers use this to detect the end of a BRP round.
    pub fn remaining_awv_count(&self) -> usize {
        let Some(antenna) = self.antennas.get(self.active_antenna) else {
            return 0;
        };
        let sector = &antenna.sectors[self.tx.sector];
        match self.tx.awv {
            None => sector.awvs.len(),
            Some(idx) => sector.awvs.len().saturating_sub(idx + 1),
        }
    }
}

// ── Codebook ────────────────────────────────────────────────────────────────

/// Serde-facing codebook description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebookConfig {
    pub antennas: Vec<AntennaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntennaConfig {
    /// Euler angles in degrees (psi, theta, phi).
    pub orientation_deg: (f64, f64, f64),
    pub sectors: Vec<SectorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorConfig {
    pub boresight_az_deg: f64,
    pub boresight_el_deg: f64,
    pub beamwidth_deg: f64,
    pub gain_dbi: f64,
    #[serde(default)]
    pub awvs: Vec<AwvConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwvConfig {
    pub offset_az_deg: f64,
    pub offset_el_deg: f64,
    pub beamwidth_deg: f64,
    pub gain_dbi: f64,
}

/// Side/back-lobe floor applied to generated directional patterns.
const SECTOR_FLOOR_DBI: f64 = -15.0;

/// The per-station collection of RF chains with pattern resolution for the
/// propagation and interference engines.
#[derive(Debug, Clone, Default)]
pub struct Codebook {
    chains: Vec<RfChain>,
}

impl Codebook {
    pub fn new(chains: Vec<RfChain>) -> Self {
        Self { chains }
    }

    /// Build a single-chain codebook with `num_antennas` arrays, each with an
    /// even fan of `sectors_per_antenna` sectors covering its share of the
    /// azimuth circle, and `awvs_per_sector` refinements per sector.
    pub fn uniform(
        num_antennas: usize,
        sectors_per_antenna: usize,
        awvs_per_sector: usize,
    ) -> CodebookResult<Self> {
        Self::uniform_mimo(1, num_antennas, sectors_per_antenna, awvs_per_sector)
    }

    /// Multi-chain variant of [`uniform`](Codebook::uniform): antennas are
    /// numbered consecutively across chains.
    pub fn uniform_mimo(
        num_chains: usize,
        antennas_per_chain: usize,
        sectors_per_antenna: usize,
        awvs_per_sector: usize,
    ) -> CodebookResult<Self> {
        if num_chains == 0 || antennas_per_chain == 0 || sectors_per_antenna == 0 {
            return Err(CodebookError::EmptySweepList);
        }
        let total_antennas = num_chains * antennas_per_chain;
        // Each antenna covers an equal share of the azimuth circle.
        let antenna_arc = 2.0 * PI / total_antennas as f64;
        let sector_bw = antenna_arc / sectors_per_antenna as f64;
        // Planar directivity approximation with a fixed pi/2 elevation lobe.
        let sector_gain = 10.0 * (4.0 * PI / (sector_bw * PI / 2.0)).log10();

        let mut antenna_no = 0u8;
        let mut chains = Vec::with_capacity(num_chains);
        for _ in 0..num_chains {
            let mut chain = RfChain::new();
            for _ in 0..antennas_per_chain {
                let base_az = -PI + antenna_no as f64 * antenna_arc;
                let mut sectors = Vec::with_capacity(sectors_per_antenna);
                for s in 0..sectors_per_antenna {
                    let boresight = base_az + (s as f64 + 0.5) * sector_bw;
                    let shape = PatternShape {
                        boresight_az: boresight,
                        boresight_el: 0.0,
                        beamwidth: sector_bw,
                        peak_gain_dbi: sector_gain,
                        floor_gain_dbi: SECTOR_FLOOR_DBI,
                    };
                    let awv_bw = sector_bw / awvs_per_sector.max(1) as f64;
                    let awvs = (0..awvs_per_sector)
                        .map(|j| {
                            let offset = (j as f64 + 0.5) * awv_bw - sector_bw / 2.0;
                            Awv {
                                shape: PatternShape {
                                    boresight_az: boresight + offset,
                                    boresight_el: 0.0,
                                    beamwidth: awv_bw,
                                    peak_gain_dbi: sector_gain
                                        + 10.0 * (awvs_per_sector as f64).log10(),
                                    floor_gain_dbi: SECTOR_FLOOR_DBI,
                                },
                            }
                        })
                        .collect();
                    sectors.push(Sector {
                        id: SectorId(s as u8 + 1),
                        shape,
                        awvs,
                    });
                }
                antenna_no += 1;
                chain.connect_antenna_array(AntennaArray::new(
                    AntennaId(antenna_no),
                    Orientation::default(),
                    sectors,
                ))?;
            }
            chain.reset()?;
            chains.push(chain);
        }
        Ok(Self { chains })
    }

    /// Build a single-chain codebook from a configuration description.
    pub fn from_config(config: &CodebookConfig) -> CodebookResult<Self> {
        let mut chain = RfChain::new();
        for (i, antenna) in config.antennas.iter().enumerate() {
            let (psi, theta, phi) = antenna.orientation_deg;
            let sectors = antenna
                .sectors
                .iter()
                .enumerate()
                .map(|(s, sc)| {
                    let shape = PatternShape {
                        boresight_az: sc.boresight_az_deg.to_radians(),
                        boresight_el: sc.boresight_el_deg.to_radians(),
                        beamwidth: sc.beamwidth_deg.to_radians(),
                        peak_gain_dbi: sc.gain_dbi,
                        floor_gain_dbi: SECTOR_FLOOR_DBI,
                    };
                    let awvs = sc
                        .awvs
                        .iter()
                        .map(|ac| Awv {
                            shape: PatternShape {
                                boresight_az: shape.boresight_az + ac.offset_az_deg.to_radians(),
                                boresight_el: shape.boresight_el + ac.offset_el_deg.to_radians(),
                                beamwidth: ac.beamwidth_deg.to_radians(),
                                peak_gain_dbi: ac.gain_dbi,
                                floor_gain_dbi: SECTOR_FLOOR_DBI,
                            },
                        })
                        .collect();
                    Sector {
                        id: SectorId(s as u8 + 1),
                        shape,
                        awvs,
                    }
                })
                .collect();
            chain.connect_antenna_array(AntennaArray::new(
                AntennaId(i as u8 + 1),
                Orientation::new(psi.to_radians(), theta.to_radians(), phi.to_radians()),
                sectors,
            ))?;
        }
        chain.reset()?;
        Ok(Self {
            chains: vec![chain],
        })
    }

    pub fn chains(&self) -> &[RfChain] {
        &self.chains
    }

    pub fn chain(&self, index: usize) -> Option<&RfChain> {
        self.chains.get(index)
    }

    pub fn chain_mut(&mut self, index: usize) -> Option<&mut RfChain> {
        self.chains.get_mut(index)
    }

    fn find_antenna(&self, antenna: AntennaId) -> CodebookResult<&AntennaArray> {
        self.chains
            .iter()
            .flat_map(|c| c.antennas.iter())
            .find(|a| a.id == antenna)
            .ok_or(CodebookError::UnknownAntenna(antenna))
    }

    /// Mounting orientation of an antenna array.
    pub fn orientation(&self, antenna: AntennaId) -> CodebookResult<Orientation> {
        Ok(self.find_antenna(antenna)?.orientation)
    }

    /// Resolve an [`ActivePattern`] to its pattern shape.
    pub fn pattern_shape(&self, pattern: ActivePattern) -> CodebookResult<PatternShape> {
        let antenna = self.find_antenna(pattern.antenna())?;
        match pattern {
            ActivePattern::QuasiOmni { .. } => Ok(antenna.quasi_omni),
            ActivePattern::Sector { sector, .. } => {
                let idx = antenna.sector_index(sector).ok_or(
                    CodebookError::UnknownSector {
                        antenna: antenna.id,
                        sector,
                    },
                )?;
                Ok(antenna.sectors[idx].shape)
            }
            ActivePattern::Custom { sector, awv, .. } => {
                let idx = antenna.sector_index(sector).ok_or(
                    CodebookError::UnknownSector {
                        antenna: antenna.id,
                        sector,
                    },
                )?;
                antenna.sectors[idx]
                    .awvs
                    .get(awv.0 as usize)
                    .map(|a| a.shape)
                    .ok_or(CodebookError::UnknownAwv(sector, awv))
            }
        }
    }

    /// Directivity of a pattern toward a direction given in the owning
    /// array's local frame.
    pub fn gain_dbi(&self, pattern: ActivePattern, az: f64, el: f64) -> CodebookResult<f64> {
        Ok(self.pattern_shape(pattern)?.gain_dbi(az, el))
    }

    /// Active Tx patterns across all chains, one per concurrent stream.
    pub fn active_tx_pattern_list(&self) -> CodebookResult<Vec<ActivePattern>> {
        self.chains.iter().map(|c| c.active_tx_pattern()).collect()
    }

    /// Active Rx patterns across all chains.
    pub fn active_rx_pattern_list(&self) -> CodebookResult<Vec<ActivePattern>> {
        self.chains.iter().map(|c| c.active_rx_pattern()).collect()
    }

    /// Every `(antenna, sector)` pair across all chains, in antenna-ID order
    /// then sector order: the canonical transmit-sector-sweep sequence.
    pub fn sector_list(&self) -> Vec<(AntennaId, SectorId)> {
        let mut list: Vec<(AntennaId, SectorId)> = self
            .chains
            .iter()
            .flat_map(|c| c.antennas.iter())
            .flat_map(|a| a.sectors.iter().map(move |s| (a.id, s.id)))
            .collect();
        list.sort();
        list
    }

    pub fn total_sector_count(&self) -> usize {
        self.chains
            .iter()
            .flat_map(|c| c.antennas.iter())
            .map(|a| a.sectors.len())
            .sum()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn two_antenna_chain() -> RfChain {
        let cb = Codebook::uniform(2, 4, 2).unwrap();
        cb.chains[0].clone()
    }

    #[test]
    fn test_connect_twice_is_error() {
        let mut chain = RfChain::new();
        let array = AntennaArray::new(AntennaId(1), Orientation::default(), vec![]);
        let mut already = array.clone();
        already.connected = true;
        assert!(chain.connect_antenna_array(array).is_ok());
        assert_eq!(
            chain.connect_antenna_array(already),
            Err(CodebookError::ArrayAlreadyConnected(AntennaId(1)))
        );
    }

    #[test]
    fn test_duplicate_antenna_rejected() {
        let mut chain = RfChain::new();
        chain
            .connect_antenna_array(AntennaArray::new(AntennaId(1), Orientation::default(), vec![]))
            .unwrap();
        let dup = AntennaArray::new(AntennaId(1), Orientation::default(), vec![]);
        assert_eq!(
            chain.connect_antenna_array(dup),
            Err(CodebookError::DuplicateAntenna(AntennaId(1)))
        );
    }

    #[test]
    fn test_reset_state() {
        let mut chain = two_antenna_chain();
        chain.set_active_tx_sector(AntennaId(2), SectorId(3)).unwrap();
        chain.set_active_tx_awv(AwvId(1)).unwrap();
        chain.reset().unwrap();
        assert_eq!(chain.active_antenna_id().unwrap(), AntennaId(1));
        assert_eq!(
            chain.active_tx_pattern().unwrap(),
            ActivePattern::Sector {
                antenna: AntennaId(1),
                sector: SectorId(1)
            }
        );
        assert_eq!(
            chain.active_rx_pattern().unwrap(),
            ActivePattern::QuasiOmni {
                antenna: AntennaId(1)
            }
        );
    }

    #[test]
    fn test_sector_switch_clears_awv() {
        let mut chain = two_antenna_chain();
        chain.set_active_tx_sector(AntennaId(1), SectorId(2)).unwrap();
        chain.set_active_tx_awv(AwvId(0)).unwrap();
        assert!(chain.is_tx_in_awv_mode());
        chain.set_active_tx_sector(AntennaId(1), SectorId(3)).unwrap();
        assert!(!chain.is_tx_in_awv_mode());
    }

    #[test]
    fn test_rx_awv_requires_sector() {
        let mut chain = two_antenna_chain();
        chain.start_receiving_in_quasi_omni_mode().unwrap();
        assert_eq!(
            chain.set_active_rx_awv(AwvId(0)),
            Err(CodebookError::NoSectorActive)
        );
        chain.set_active_rx_sector(AntennaId(1), SectorId(1)).unwrap();
        assert!(chain.set_active_rx_awv(AwvId(0)).is_ok());
    }

    // Randomized sequences never leave both sector mode and AWV mode
    // inconsistently set; a sector switch always drops AWV mode.
    #[test]
    fn test_mode_exclusivity_fuzz() {
        let mut chain = two_antenna_chain();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            match rng.gen_range(0..3) {
                0 => {
                    let antenna = AntennaId(rng.gen_range(1..=2));
                    let sector = SectorId(rng.gen_range(1..=4));
                    chain.set_active_tx_sector(antenna, sector).unwrap();
                    assert!(!chain.is_tx_in_awv_mode());
                }
                1 => {
                    let _ = chain.set_active_tx_awv(AwvId(rng.gen_range(0..2)));
                }
                _ => {
                    let pattern = chain.active_tx_pattern().unwrap();
                    match pattern {
                        ActivePattern::Custom { .. } => assert!(chain.is_tx_in_awv_mode()),
                        ActivePattern::Sector { .. } => assert!(!chain.is_tx_in_awv_mode()),
                        ActivePattern::QuasiOmni { .. } => panic!("tx never quasi-omni"),
                    }
                }
            }
        }
    }

    #[test]
    fn test_quasi_omni_sweep_completeness() {
        let cb = Codebook::uniform(3, 2, 0).unwrap();
        let mut chain = cb.chains[0].clone();
        chain.start_receiving_in_quasi_omni_mode().unwrap();

        let mut visited = vec![chain.active_antenna_id().unwrap()];
        let mut wraps = 0;
        for _ in 0..3 {
            if chain.switch_to_next_quasi_pattern().unwrap() {
                visited.push(chain.active_antenna_id().unwrap());
            } else {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1, "exactly one wrap in N calls");
        assert_eq!(visited, vec![AntennaId(1), AntennaId(2), AntennaId(3)]);
        // After the wrap the cursor is back on the first antenna.
        assert_eq!(chain.active_antenna_id().unwrap(), AntennaId(1));
    }

    #[test]
    fn test_mimo_sector_cursor_wraps_in_order() {
        let mut chain = two_antenna_chain();
        let list = vec![
            (AntennaId(1), SectorId(2)),
            (AntennaId(2), SectorId(1)),
            (AntennaId(2), SectorId(4)),
        ];
        chain
            .set_up_mimo_sector_sweeping(list.clone(), vec![])
            .unwrap();
        for expected in list.iter().chain(list.iter()) {
            assert_eq!(chain.next_mimo_sector().unwrap(), *expected);
        }
    }

    #[test]
    fn test_mimo_awv_combination_signal() {
        let mut chain = two_antenna_chain();
        chain
            .set_up_mimo_sector_sweeping(
                vec![(AntennaId(1), SectorId(1))],
                vec![AwvId(0), AwvId(1)],
            )
            .unwrap();
        chain.next_mimo_sector().unwrap();
        assert!(!chain.next_awv_with_combinations().unwrap());
        assert!(chain.next_awv_with_combinations().unwrap(), "wrap on last AWV");
        assert!(!chain.next_awv_with_combinations().unwrap());
    }

    #[test]
    fn test_remaining_awv_count() {
        let mut chain = two_antenna_chain();
        chain.set_active_tx_sector(AntennaId(1), SectorId(1)).unwrap();
        assert_eq!(chain.remaining_awv_count(), 2);
        chain.set_active_tx_awv(AwvId(0)).unwrap();
        assert_eq!(chain.remaining_awv_count(), 1);
        chain.set_active_tx_awv(AwvId(1)).unwrap();
        assert_eq!(chain.remaining_awv_count(), 0);
    }

    #[test]
    fn test_pattern_gain_peak_and_floor() {
        let cb = Codebook::uniform(1, 8, 0).unwrap();
        let sectors = cb.sector_list();
        assert_eq!(sectors.len(), 8);
        let (antenna, sector) = sectors[0];
        let shape = cb
            .pattern_shape(ActivePattern::Sector { antenna, sector })
            .unwrap();
        let peak = shape.gain_dbi(shape.boresight_az, 0.0);
        let away = shape.gain_dbi(shape.boresight_az + PI, 0.0);
        assert!(peak > 9.0, "8-sector fan should exceed 9 dBi, got {peak}");
        assert_eq!(away, SECTOR_FLOOR_DBI);
    }

    #[test]
    fn test_orientation_rotation_identity_and_quarter_turn() {
        let id = Orientation::default();
        let (az, el) = id.global_to_local(0.7, 0.2);
        assert!((az - 0.7).abs() < 1e-12 && (el - 0.2).abs() < 1e-12);

        // Array rotated +90 degrees in azimuth sees a global +90 direction
        // as its local boresight.
        let turned = Orientation::new(PI / 2.0, 0.0, 0.0);
        let (az, el) = turned.global_to_local(PI / 2.0, 0.0);
        assert!(az.abs() < 1e-12 && el.abs() < 1e-12);
    }

    #[test]
    fn test_sector_list_order() {
        let cb = Codebook::uniform(2, 3, 0).unwrap();
        let list = cb.sector_list();
        assert_eq!(list.len(), 6);
        assert_eq!(list[0], (AntennaId(1), SectorId(1)));
        assert_eq!(list[3], (AntennaId(2), SectorId(1)));
    }

    #[test]
    fn test_config_round_trip() {
        let config = CodebookConfig {
            antennas: vec![AntennaConfig {
                orientation_deg: (90.0, 0.0, 0.0),
                sectors: vec![SectorConfig {
                    boresight_az_deg: 0.0,
                    boresight_el_deg: 0.0,
                    beamwidth_deg: 30.0,
                    gain_dbi: 12.0,
                    awvs: vec![AwvConfig {
                        offset_az_deg: -7.5,
                        offset_el_deg: 0.0,
                        beamwidth_deg: 15.0,
                        gain_dbi: 15.0,
                    }],
                }],
            }],
        };
        let cb = Codebook::from_config(&config).unwrap();
        assert_eq!(cb.total_sector_count(), 1);
        let shape = cb
            .pattern_shape(ActivePattern::Custom {
                antenna: AntennaId(1),
                sector: SectorId(1),
                awv: AwvId(0),
            })
            .unwrap();
        assert!((shape.peak_gain_dbi - 15.0).abs() < 1e-12);
        assert!((cb.orientation(AntennaId(1)).unwrap().psi - PI / 2.0).abs() < 1e-12);
    }
}
