//! Virtual-time instants for the discrete-event model
//!
//! The simulation runs on a single virtual clock with nanosecond resolution.
//! [`SimTime`] is an instant on that clock; spans are ordinary
//! [`std::time::Duration`] values, so arithmetic between the two composes with
//! the standard library.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

/// An instant of virtual time, counted in nanoseconds from simulation start.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SimTime(u64);

impl SimTime {
    /// The simulation epoch.
    pub const ZERO: SimTime = SimTime(0);

    pub fn from_nanos(ns: u64) -> Self {
        SimTime(ns)
    }

    pub fn from_micros(us: u64) -> Self {
        SimTime(us * 1_000)
    }

    pub fn from_millis(ms: u64) -> Self {
        SimTime(ms * 1_000_000)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        SimTime((secs * 1e9).round() as u64)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Span since `earlier`, saturating to zero if `earlier` is in the future.
    pub fn saturating_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    pub fn min(self, other: SimTime) -> SimTime {
        SimTime(self.0.min(other.0))
    }

    pub fn max(self, other: SimTime) -> SimTime {
        SimTime(self.0.max(other.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0 + rhs.as_nanos() as u64)
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.as_nanos() as u64;
    }
}

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.as_nanos() as u64))
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_conversion() {
        assert_eq!(SimTime::from_micros(5).as_nanos(), 5_000);
        assert_eq!(SimTime::from_millis(2).as_nanos(), 2_000_000);
        assert!((SimTime::from_secs_f64(1.5).as_secs_f64() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic() {
        let t = SimTime::from_micros(10) + Duration::from_micros(5);
        assert_eq!(t.as_nanos(), 15_000);
        assert_eq!(t - SimTime::from_micros(10), Duration::from_micros(5));
    }

    #[test]
    fn test_saturating_since() {
        let early = SimTime::from_micros(1);
        let late = SimTime::from_micros(4);
        assert_eq!(late.saturating_since(early), Duration::from_micros(3));
        assert_eq!(early.saturating_since(late), Duration::ZERO);
    }

    #[test]
    fn test_ordering() {
        assert!(SimTime::ZERO < SimTime::from_nanos(1));
        assert_eq!(
            SimTime::from_nanos(7).max(SimTime::from_nanos(3)),
            SimTime::from_nanos(7)
        );
    }
}
