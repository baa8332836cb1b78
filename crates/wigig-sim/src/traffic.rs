//! Application traffic generators
//!
//! Constant-rate OnOff and saturating Bulk sources feeding the coordinator
//! queues. Generators are pure: they compute arrival times for a window and
//! the simulation layer turns those into enqueue events.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use wigig_core::types::Packet;
use wigig_core::SimTime;

/// Source activity pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrafficPattern {
    /// Alternate `on`/`off` phases; packets arrive at the data rate during
    /// `on` phases only.
    OnOff { on: Duration, off: Duration },
    /// Always on: packets arrive back-to-back at the data rate.
    Bulk,
}

/// A traffic source.
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    pub pattern: TrafficPattern,
    pub data_rate_mbps: f64,
    pub payload_size: usize,
    next_uid: u64,
}

impl TrafficGenerator {
    pub fn on_off(data_rate_mbps: f64, payload_size: usize, on: Duration, off: Duration) -> Self {
        Self {
            pattern: TrafficPattern::OnOff { on, off },
            data_rate_mbps,
            payload_size,
            next_uid: 0,
        }
    }

    pub fn bulk(data_rate_mbps: f64, payload_size: usize) -> Self {
        Self {
            pattern: TrafficPattern::Bulk,
            data_rate_mbps,
            payload_size,
            next_uid: 0,
        }
    }

    /// Inter-arrival spacing at the configured rate.
    pub fn packet_interval(&self) -> Duration {
        let bits = self.payload_size as f64 * 8.0;
        Duration::from_secs_f64(bits / (self.data_rate_mbps * 1e6))
    }

    /// Whether the source is in an on-phase at `t` (measured from its own
    /// start).
    fn is_on(&self, offset: Duration) -> bool {
        match self.pattern {
            TrafficPattern::Bulk => true,
            TrafficPattern::OnOff { on, off } => {
                let cycle = on + off;
                if cycle.is_zero() {
                    return true;
                }
                let into = Duration::from_nanos(
                    (offset.as_nanos() % cycle.as_nanos()) as u64,
                );
                into < on
            }
        }
    }

    /// Arrival times and packets in `[from, until)`, relative to a source
    /// started at `start`.
    pub fn arrivals(
        &mut self,
        start: SimTime,
        from: SimTime,
        until: SimTime,
    ) -> Vec<(SimTime, Packet)> {
        let interval = self.packet_interval();
        if interval.is_zero() {
            return Vec::new();
        }
        let mut out = Vec::new();
        // First arrival at or after `from`, on the source's arrival lattice.
        let elapsed = from.saturating_since(start);
        let ticks = (elapsed.as_nanos() + interval.as_nanos() - 1) / interval.as_nanos();
        let mut t = start + Duration::from_nanos((ticks as u64) * interval.as_nanos() as u64);
        while t < until {
            if self.is_on(t.saturating_since(start)) {
                out.push((t, Packet::new(self.payload_size, self.next_uid)));
                self.next_uid += 1;
            }
            t += interval;
        }
        out
    }

    pub fn packets_generated(&self) -> u64 {
        self.next_uid
    }
}
