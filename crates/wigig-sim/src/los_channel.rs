//! Geometric line-of-sight channel
//!
//! A closed-form single-ray alternative to the Q-D trace engine for
//! scenarios without ray-tracer output: free-space path loss at the carrier
//! frequency plus each endpoint's directional gain toward the other, with
//! the departure/arrival azimuths derived from node positions.

use wigig_core::codebook::{ActivePattern, Codebook};
use wigig_core::types::{db_to_linear, dbm_to_watts};

/// Speed of light in m/s.
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Station position on the simulation plane, metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    /// Azimuth of the bearing from `self` toward `other`.
    pub fn azimuth_to(&self, other: &Position) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

/// Free-space path loss in dB.
pub fn fspl_db(distance_m: f64, frequency_hz: f64) -> f64 {
    let d = distance_m.max(0.1);
    20.0 * (4.0 * std::f64::consts::PI * d * frequency_hz / SPEED_OF_LIGHT).log10()
}

/// Line-of-sight channel model.
#[derive(Debug, Clone)]
pub struct LosChannel {
    pub frequency_hz: f64,
}

impl LosChannel {
    pub fn new(frequency_hz: f64) -> Self {
        Self { frequency_hz }
    }

    /// Received power in watts for a transmission between two stations with
    /// the given active patterns. Angles are evaluated in each array's local
    /// frame via the codebook orientation.
    #[allow(clippy::too_many_arguments)]
    pub fn rx_power_w(
        &self,
        tx_power_dbm: f64,
        tx_pos: Position,
        rx_pos: Position,
        tx_codebook: &Codebook,
        rx_codebook: &Codebook,
        tx_pattern: ActivePattern,
        rx_pattern: ActivePattern,
    ) -> f64 {
        let distance = tx_pos.distance_to(&rx_pos);
        let departure_az = tx_pos.azimuth_to(&rx_pos);
        let arrival_az = rx_pos.azimuth_to(&tx_pos);

        let tx_orientation = tx_codebook
            .orientation(tx_pattern.antenna())
            .unwrap_or_default();
        let rx_orientation = rx_codebook
            .orientation(rx_pattern.antenna())
            .unwrap_or_default();
        let (tx_az, tx_el) = tx_orientation.global_to_local(departure_az, 0.0);
        let (rx_az, rx_el) = rx_orientation.global_to_local(arrival_az, 0.0);

        let tx_gain = tx_codebook.gain_dbi(tx_pattern, tx_az, tx_el).unwrap_or(0.0);
        let rx_gain = rx_codebook.gain_dbi(rx_pattern, rx_az, rx_el).unwrap_or(0.0);

        let loss = fspl_db(distance, self.frequency_hz);
        dbm_to_watts(tx_power_dbm) * db_to_linear(tx_gain + rx_gain - loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wigig_core::types::{AntennaId, SectorId};
    use wigig_core::Codebook;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_fspl_increases_with_distance_and_frequency() {
        assert!(fspl_db(10.0, 60.48e9) > fspl_db(1.0, 60.48e9));
        assert!(fspl_db(10.0, 60.48e9) > fspl_db(10.0, 5.18e9));
        // 60 GHz at 1 m is about 68 dB.
        assert!(approx_eq(fspl_db(1.0, 60.48e9), 68.0, 0.5));
    }

    #[test]
    fn test_aligned_sector_beats_misaligned() {
        let channel = LosChannel::new(60.48e9);
        let cb = Codebook::uniform(1, 8, 0).unwrap();
        let tx_pos = Position::new(0.0, 0.0);
        let rx_pos = Position::new(5.0, 1.0); // bearing ~11 degrees

        let quasi = ActivePattern::QuasiOmni {
            antenna: AntennaId(1),
        };
        // Sector 5 covers [0, 45) degrees; sector 1 points the other way.
        let aligned = ActivePattern::Sector {
            antenna: AntennaId(1),
            sector: SectorId(5),
        };
        let misaligned = ActivePattern::Sector {
            antenna: AntennaId(1),
            sector: SectorId(1),
        };

        let good = channel.rx_power_w(10.0, tx_pos, rx_pos, &cb, &cb, aligned, quasi);
        let bad = channel.rx_power_w(10.0, tx_pos, rx_pos, &cb, &cb, misaligned, quasi);
        assert!(good > bad * 100.0, "aligned {good} vs misaligned {bad}");
    }

    #[test]
    fn test_reciprocal_bearing() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 3.0);
        let forward = a.azimuth_to(&b);
        let reverse = b.azimuth_to(&a);
        assert!(approx_eq((forward - reverse).abs(), std::f64::consts::PI, 1e-12));
    }
}
