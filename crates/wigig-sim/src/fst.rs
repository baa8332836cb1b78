//! Fast Session Transfer between bands
//!
//! Models an FST session for a dual-band device pair: data flows on the
//! active band, and at a scheduled instant the session transfers to the
//! other band (link-loss timeout zero: the switch is immediate). The point
//! of the model is throughput continuity: delivery must not gap across the
//! transfer.

use crate::event_queue::EventQueue;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use wigig_core::SimTime;

/// Operating band of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    /// 60 GHz DMG link.
    Dmg60GHz,
    /// 5 GHz OFDM fallback link.
    Ofdm5GHz,
}

/// FST session parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FstConfig {
    /// Throughput of the 60 GHz link in Mb/s.
    pub rate_60ghz_mbps: f64,
    /// Throughput of the 5 GHz link in Mb/s.
    pub rate_5ghz_mbps: f64,
    /// Application payload size in bytes.
    pub payload_size: usize,
    /// Link-loss timeout before the transfer takes effect.
    pub llt: Duration,
}

impl Default for FstConfig {
    fn default() -> Self {
        Self {
            rate_60ghz_mbps: 1000.0,
            rate_5ghz_mbps: 300.0,
            payload_size: 1448,
            llt: Duration::ZERO,
        }
    }
}

/// One delivered packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delivery {
    pub at: SimTime,
    pub bytes: usize,
    pub band: Band,
}

#[derive(Debug)]
enum FstEvent {
    Deliver,
    Transfer,
}

/// A running FST session.
#[derive(Debug)]
pub struct FstSession {
    config: FstConfig,
    band: Band,
    transfer_at: Option<SimTime>,
    deliveries: Vec<Delivery>,
}

impl FstSession {
    /// A session starts on the 60 GHz band.
    pub fn new(config: FstConfig) -> Self {
        Self {
            config,
            band: Band::Dmg60GHz,
            transfer_at: None,
            deliveries: Vec::new(),
        }
    }

    pub fn active_band(&self) -> Band {
        self.band
    }

    /// Schedule the session transfer: at `at` (plus the configured LLT) the
    /// data session moves to the other band.
    pub fn establish_fst_session(&mut self, at: SimTime) {
        self.transfer_at = Some(at + self.config.llt);
    }

    fn interval_on(&self, band: Band) -> Duration {
        let rate = match band {
            Band::Dmg60GHz => self.config.rate_60ghz_mbps,
            Band::Ofdm5GHz => self.config.rate_5ghz_mbps,
        };
        Duration::from_secs_f64(self.config.payload_size as f64 * 8.0 / (rate * 1e6))
    }

    /// Run the data session until `until`, recording every delivery.
    pub fn run(&mut self, until: SimTime) {
        let mut queue: EventQueue<FstEvent> = EventQueue::new();
        queue.schedule(SimTime::ZERO + self.interval_on(self.band), FstEvent::Deliver);
        if let Some(at) = self.transfer_at {
            queue.schedule(at, FstEvent::Transfer);
        }

        while let Some((at, event)) = queue.pop() {
            if at > until {
                break;
            }
            match event {
                FstEvent::Deliver => {
                    self.deliveries.push(Delivery {
                        at,
                        bytes: self.config.payload_size,
                        band: self.band,
                    });
                    queue.schedule(at + self.interval_on(self.band), FstEvent::Deliver);
                }
                FstEvent::Transfer => {
                    let from = self.band;
                    self.band = match self.band {
                        Band::Dmg60GHz => Band::Ofdm5GHz,
                        Band::Ofdm5GHz => Band::Dmg60GHz,
                    };
                    info!(?from, to = ?self.band, at = %at, "fast session transfer");
                }
            }
        }
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Delivered bytes inside a window.
    pub fn bytes_between(&self, from: SimTime, until: SimTime) -> u64 {
        self.deliveries
            .iter()
            .filter(|d| d.at >= from && d.at < until)
            .map(|d| d.bytes as u64)
            .sum()
    }

    /// The longest gap between consecutive deliveries.
    pub fn max_delivery_gap(&self) -> Duration {
        self.deliveries
            .windows(2)
            .map(|w| w[1].at - w[0].at)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// The band a delivery at or after `t` used.
    pub fn band_at(&self, t: SimTime) -> Option<Band> {
        self.deliveries.iter().find(|d| d.at >= t).map(|d| d.band)
    }
}
