//! End-to-end fast session transfer
//!
//! A dual-band session scheduled to transfer at t = 5 s must switch bands at
//! that instant and keep delivering data with no multi-second gap across the
//! switch.

use std::time::Duration;
use wigig_core::SimTime;
use wigig_sim::{Band, FstConfig, FstSession};

#[test]
fn session_transfers_at_five_seconds() {
    let mut session = FstSession::new(FstConfig::default());
    session.establish_fst_session(SimTime::from_secs_f64(5.0));
    session.run(SimTime::from_secs_f64(10.0));

    assert_eq!(
        session.band_at(SimTime::from_secs_f64(4.99)).unwrap(),
        Band::Dmg60GHz
    );
    assert_eq!(
        session.band_at(SimTime::from_secs_f64(5.01)).unwrap(),
        Band::Ofdm5GHz
    );
}

#[test]
fn throughput_is_continuous_across_transfer() {
    let mut session = FstSession::new(FstConfig::default());
    session.establish_fst_session(SimTime::from_secs_f64(5.0));
    session.run(SimTime::from_secs_f64(10.0));

    assert!(
        session.max_delivery_gap() < Duration::from_secs(1),
        "no multi-second gap across the band switch"
    );

    // Every 500 ms window of the run moves data.
    for tenth in 0..19u64 {
        let from = SimTime::from_millis(tenth * 500);
        let until = SimTime::from_millis((tenth + 1) * 500);
        assert!(
            session.bytes_between(from, until) > 0,
            "delivery stalled in window starting {from}"
        );
    }
}
