//! SNR-to-BER error models for the DMG PHY
//!
//! The DMG error model interpolates link-level SNR→BER curves loaded from a
//! text table, one curve per MCS. Outside a curve's tabulated range the BER
//! clamps to the boundary value; inside, it interpolates linearly between the
//! two bracketing points. Tables may be tabulated on a lattice with an
//! arbitrary offset from zero; the offset is recovered once at load time.
//!
//! ## Table file format
//!
//! ```text
//! <number of MCS tables>
//! <decimal places used for SNR hash keys>
//! <SNR spacing between tabulated points>
//! then per MCS, one value per line:
//!   <mcs index> <snr_min> <snr_max> <ber_min> <ber_max> <point count N>
//! followed by two comma-separated lines of N SNR values and N BER values.
//! ```

use crate::types::Mcs;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Result type for error-model operations.
pub type ErrorModelResult<T> = Result<T, ErrorModelError>;

/// Error-model failures. All of these are configuration errors: a malformed
/// table or an MCS outside the loaded set means the scenario is mis-built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorModelError {
    #[error("failed to read table file: {0}")]
    Io(String),

    #[error("malformed table file: {0}")]
    Malformed(String),

    #[error("no SNR-BER table configured for MCS {0}")]
    UnknownMcs(u8),

    #[error("table for MCS {mcs} declares {declared} points but carries {actual}")]
    PointCountMismatch { mcs: u8, declared: usize, actual: usize },
}

/// A model that converts a chunk's SNR into a success probability.
///
/// `nbits` is 64-bit: at multi-gigabit DMG rates a single aggregate can carry
/// more bits than a 32-bit count can hold over long chunks.
pub trait ErrorRateModel {
    /// Probability that `nbits` consecutive bits at `snr_db` are all received
    /// correctly.
    fn chunk_success_rate(&self, mcs: Mcs, snr_db: f64, nbits: u64) -> ErrorModelResult<f64>;
}

// ── Per-MCS table ───────────────────────────────────────────────────────────

/// One MCS's tabulated SNR→BER curve.
#[derive(Debug, Clone)]
struct SnrBerTable {
    snr_min: f64,
    snr_max: f64,
    ber_min: f64,
    ber_max: f64,
    /// Offset of the tabulation lattice from zero, in `[0, spacing)`.
    offset: f64,
    /// BER keyed by the SNR scaled to an integer (avoids float equality).
    points: HashMap<i64, f64>,
}

impl SnrBerTable {
    /// Integer hash key for an SNR value: truncate to `decimal_places` and
    /// scale to an integer.
    fn key(snr: f64, scale: f64) -> i64 {
        (snr * scale).round() as i64
    }

    /// Find the lattice offset by scanning from `snr_min` in `spacing` steps
    /// until crossing zero or landing within tolerance of it.
    fn determine_snr_offset(snr_min: f64, spacing: f64) -> f64 {
        const TOL: f64 = 1e-9;
        let mut x = snr_min;
        while x < -TOL {
            x += spacing;
        }
        if x.abs() < TOL {
            0.0
        } else {
            x % spacing
        }
    }

    fn lookup(&self, snr: f64, scale: f64) -> Option<f64> {
        self.points.get(&Self::key(snr, scale)).copied()
    }

    /// BER at `snr`, clamped outside the tabulated range, linearly
    /// interpolated between the bracketing lattice points inside it.
    fn bit_error_rate(&self, snr: f64, spacing: f64, scale: f64) -> f64 {
        if snr <= self.snr_min {
            return self.ber_min;
        }
        if snr >= self.snr_max {
            return self.ber_max;
        }
        // Snap onto the tabulation lattice: points lie at offset + k*spacing.
        let k = ((snr - self.offset) / spacing).floor();
        let lower = self.offset + k * spacing;
        let upper = lower + spacing;
        let lower = lower.max(self.snr_min);
        let upper = upper.min(self.snr_max);

        let ber_lo = match self.lookup(lower, scale) {
            Some(b) => b,
            None => return self.ber_max,
        };
        if (upper - lower).abs() < f64::EPSILON {
            return ber_lo;
        }
        let ber_hi = match self.lookup(upper, scale) {
            Some(b) => b,
            None => return ber_lo,
        };
        let w = (snr - lower) / (upper - lower);
        ber_lo + (ber_hi - ber_lo) * w
    }
}

// ── DMG error model ─────────────────────────────────────────────────────────

/// Table-driven DMG error model.
#[derive(Debug, Clone)]
pub struct DmgErrorModel {
    tables: HashMap<u8, SnrBerTable>,
    spacing: f64,
    /// `10^decimal_places`, the hash-key scale factor.
    key_scale: f64,
}

impl DmgErrorModel {
    /// Load the model from a table file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ErrorModelResult<Self> {
        let file = File::open(path.as_ref()).map_err(|e| ErrorModelError::Io(e.to_string()))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load the model from any reader carrying the table format.
    pub fn from_reader<R: Read>(reader: BufReader<R>) -> ErrorModelResult<Self> {
        let mut lines = reader.lines().map(|l| l.map_err(|e| ErrorModelError::Io(e.to_string())));

        let mut next_line = move || -> ErrorModelResult<String> {
            loop {
                match lines.next() {
                    Some(line) => {
                        let line = line?;
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            return Ok(trimmed.to_string());
                        }
                    }
                    None => {
                        return Err(ErrorModelError::Malformed("unexpected end of file".into()))
                    }
                }
            }
        };

        fn scalar<T: std::str::FromStr>(s: &str, what: &str) -> ErrorModelResult<T> {
            s.parse()
                .map_err(|_| ErrorModelError::Malformed(format!("bad {what}: {s:?}")))
        }

        let num_tables: usize = scalar(&next_line()?, "table count")?;
        let decimal_places: u32 = scalar(&next_line()?, "decimal places")?;
        let spacing: f64 = scalar(&next_line()?, "SNR spacing")?;
        if spacing <= 0.0 {
            return Err(ErrorModelError::Malformed("SNR spacing must be positive".into()));
        }
        let key_scale = 10.0_f64.powi(decimal_places as i32);

        let mut tables = HashMap::with_capacity(num_tables);
        for _ in 0..num_tables {
            let mcs: u8 = scalar(&next_line()?, "MCS index")?;
            let snr_min: f64 = scalar(&next_line()?, "snr_min")?;
            let snr_max: f64 = scalar(&next_line()?, "snr_max")?;
            let ber_min: f64 = scalar(&next_line()?, "ber_min")?;
            let ber_max: f64 = scalar(&next_line()?, "ber_max")?;
            let count: usize = scalar(&next_line()?, "point count")?;

            let parse_csv = |line: String, what: &str| -> ErrorModelResult<Vec<f64>> {
                line.split(',')
                    .map(|tok| scalar(tok.trim(), what))
                    .collect()
            };
            let snrs = parse_csv(next_line()?, "SNR value")?;
            let bers = parse_csv(next_line()?, "BER value")?;
            if snrs.len() != count || bers.len() != count {
                return Err(ErrorModelError::PointCountMismatch {
                    mcs,
                    declared: count,
                    actual: snrs.len().min(bers.len()),
                });
            }

            let points = snrs
                .iter()
                .zip(bers.iter())
                .map(|(&s, &b)| (SnrBerTable::key(s, key_scale), b))
                .collect();

            tables.insert(
                mcs,
                SnrBerTable {
                    snr_min,
                    snr_max,
                    ber_min,
                    ber_max,
                    offset: SnrBerTable::determine_snr_offset(snr_min, spacing),
                    points,
                },
            );
        }

        Ok(Self {
            tables,
            spacing,
            key_scale,
        })
    }

    /// Whether a curve is loaded for `mcs`.
    pub fn has_mcs(&self, mcs: Mcs) -> bool {
        self.tables.contains_key(&mcs.0)
    }

    /// BER at `snr_db` for `mcs`. Unknown MCS is a configuration error.
    pub fn bit_error_rate(&self, mcs: Mcs, snr_db: f64) -> ErrorModelResult<f64> {
        let table = self
            .tables
            .get(&mcs.0)
            .ok_or(ErrorModelError::UnknownMcs(mcs.0))?;
        Ok(table.bit_error_rate(snr_db, self.spacing, self.key_scale))
    }
}

impl ErrorRateModel for DmgErrorModel {
    fn chunk_success_rate(&self, mcs: Mcs, snr_db: f64, nbits: u64) -> ErrorModelResult<f64> {
        let ber = self.bit_error_rate(mcs, snr_db)?;
        Ok((1.0 - ber).powf(nbits as f64))
    }
}

// ── Sensitivity model ───────────────────────────────────────────────────────

/// Threshold-based alternative: a frame succeeds iff its SNR clears the
/// MCS's receiver sensitivity margin. Useful when no link-level curves are
/// available for a PHY configuration.
#[derive(Debug, Clone)]
pub struct SensitivityModel {
    /// Required SNR (dB) per MCS index.
    thresholds: HashMap<u8, f64>,
}

impl SensitivityModel {
    pub fn new(thresholds: HashMap<u8, f64>) -> Self {
        Self { thresholds }
    }

    /// Sensitivity thresholds for the DMG control + SC MCS set, derived from
    /// the receive-sensitivity column of the 802.11ad PHY tables with a
    /// standard 10 dB noise figure and 5 dB implementation loss.
    pub fn dmg_defaults() -> Self {
        let entries = [
            (0u8, -3.0f64),
            (1, 2.0),
            (2, 4.0),
            (3, 5.0),
            (4, 6.0),
            (5, 7.0),
            (6, 8.0),
            (7, 9.5),
            (8, 11.0),
            (9, 12.0),
            (10, 13.5),
            (11, 15.5),
            (12, 17.5),
        ];
        Self {
            thresholds: entries.into_iter().collect(),
        }
    }
}

impl ErrorRateModel for SensitivityModel {
    fn chunk_success_rate(&self, mcs: Mcs, snr_db: f64, _nbits: u64) -> ErrorModelResult<f64> {
        let threshold = self
            .thresholds
            .get(&mcs.0)
            .ok_or(ErrorModelError::UnknownMcs(mcs.0))?;
        Ok(if snr_db >= *threshold { 1.0 } else { 0.0 })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
