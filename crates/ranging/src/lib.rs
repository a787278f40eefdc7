//! # Ranging
//!
//! Two-way travel-time ranging from device counters.
//!
//! Each side of a pair transmits once and receives the other's signal once.
//! The difference between the two round-trip intervals, measured on each
//! device's own clock, is twice the one-way propagation time, so clock
//! offsets between devices cancel out.

use contracts::{RangingConfig, TimeSample};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RangingError {
    #[error("sound speed must be a positive finite number, got {0}")]
    InvalidSoundSpeed(f64),
}

pub type Result<T> = std::result::Result<T, RangingError>;

/// Ticks from `start` to `end` on a wrapping 32-bit counter.
///
/// A wrapped interval is counted as `end + (u32::MAX - start)`.
#[inline]
pub fn calc_delta(start: u32, end: u32) -> u32 {
    if end < start {
        end + (u32::MAX - start)
    } else {
        end - start
    }
}

/// Counters captured right after a device transmitted and right after it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideTimes {
    pub send: TimeSample,
    pub receive: TimeSample,
}

/// Active and passive counters of one two-way exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPairMeasurement {
    pub active: SideTimes,
    pub passive: SideTimes,
}

/// Persisted form of one two-way exchange.
///
/// Round telemetry cannot stand in for this: during a synchronization round
/// only the active device transmits, so a passive `tx` counter is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangingRecord {
    pub active: String,
    pub passive: String,
    pub reference_samples: u32,
    pub measurement: SessionPairMeasurement,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    /// Active: own transmission to detection of the reply
    pub delta_active: u32,
    /// Passive: detection of the active signal to own transmission
    pub delta_passive: u32,
    pub propagation_us: f64,
    pub distance_m: f64,
}

/// Estimate the distance between the two devices of a measurement.
pub fn calc_distance(
    measurement: &SessionPairMeasurement,
    params: &RangingConfig,
) -> Result<DistanceEstimate> {
    if !params.sound_speed_mps.is_finite() || params.sound_speed_mps <= 0.0 {
        return Err(RangingError::InvalidSoundSpeed(params.sound_speed_mps));
    }
    let reference = params.reference_samples;
    let active = &measurement.active;
    let passive = &measurement.passive;

    // The detection point is a counter value too: `rx - reference` wraps
    // modulo 2^32 instead of going negative. A receive counter that wrapped
    // within the reference window is therefore not treated as a wrapped interval.
    let delta_active = calc_delta(
        active.send.tx,
        active.receive.rx.wrapping_sub(reference),
    );
    let delta_passive = calc_delta(
        passive.receive.rx.wrapping_sub(reference),
        passive.send.tx,
    );

    let propagation_us = (delta_active as f64 - delta_passive as f64) / 2.0;
    let distance_m = propagation_us / 1_000_000.0 * params.sound_speed_mps;

    Ok(DistanceEstimate {
        delta_active,
        delta_passive,
        propagation_us,
        distance_m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(sound_speed_mps: f64) -> RangingConfig {
        RangingConfig {
            sound_speed_mps,
            reference_samples: 16_384,
        }
    }

    fn measurement(offset: u32) -> SessionPairMeasurement {
        let at = |tx: u32, rx: u32| TimeSample {
            current: 0,
            tx: tx.wrapping_add(offset),
            rx: rx.wrapping_add(offset),
            syncin: 0,
        };
        SessionPairMeasurement {
            active: SideTimes {
                send: at(1_000_000, 0),
                receive: at(1_000_000, 3_000_000),
            },
            passive: SideTimes {
                send: at(2_900_000, 1_800_000),
                receive: at(0, 1_800_000),
            },
        }
    }

    #[test]
    fn test_calc_delta_examples() {
        assert_eq!(calc_delta(100, 50), 4_294_967_245);
        assert_eq!(calc_delta(100, 200), 100);
        assert_eq!(calc_delta(7, 7), 0);
        assert_eq!(calc_delta(u32::MAX, 0), 0);
    }

    #[test]
    fn test_distance_example() {
        let estimate = calc_distance(&measurement(0), &params(340.0)).unwrap();
        assert_eq!(estimate.delta_active, 1_983_616);
        assert_eq!(estimate.delta_passive, 1_116_384);
        assert_eq!(estimate.propagation_us, 433_616.0);
        assert!((estimate.distance_m - 147.429_44).abs() < 1e-9);
    }

    #[test]
    fn test_distance_scales_with_sound_speed() {
        let air = calc_distance(&measurement(0), &params(340.0)).unwrap();
        let water = calc_distance(&measurement(0), &params(1450.0)).unwrap();
        assert!((water.distance_m / air.distance_m - 1450.0 / 340.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_sound_speed() {
        assert!(calc_distance(&measurement(0), &params(0.0)).is_err());
        assert!(calc_distance(&measurement(0), &params(f64::NAN)).is_err());
    }

    #[test]
    fn test_offset_without_wrap_is_invariant() {
        let base = calc_distance(&measurement(0), &params(1450.0)).unwrap();
        let shifted = calc_distance(&measurement(1_000_000_000), &params(1450.0)).unwrap();
        assert_eq!(base, shifted);
    }

    #[test]
    fn test_reference_subtraction_wraps_with_counter() {
        // the counter wrapped 1_000 ticks before the active heard the reply
        let measurement = SessionPairMeasurement {
            active: SideTimes {
                send: TimeSample::new(0, u32::MAX - 20_000, 0, 0),
                receive: TimeSample::new(0, 0, 1_000, 0),
            },
            passive: SideTimes {
                send: TimeSample::new(0, 30_000, 0, 0),
                receive: TimeSample::new(0, 0, 26_384, 0),
            },
        };
        let estimate = calc_distance(&measurement, &params(1500.0)).unwrap();

        // detection at u32::MAX - 15_383, i.e. 4_617 ticks after the transmission
        assert_eq!(estimate.delta_active, 4_617);
        assert_eq!(estimate.delta_passive, 20_000);
    }

    proptest! {
        #[test]
        fn calc_delta_matches_counter_arithmetic(start in any::<u32>(), end in any::<u32>()) {
            let delta = calc_delta(start, end);
            if end >= start {
                prop_assert_eq!(delta, end - start);
            } else {
                // wrapped intervals come out one tick short of the modular difference
                prop_assert_eq!(delta, end.wrapping_sub(start).wrapping_sub(1));
            }
        }

        #[test]
        fn calc_delta_never_panics_near_wrap(start in (u32::MAX - 1000)..=u32::MAX, end in 0u32..1000) {
            let delta = calc_delta(start, end);
            prop_assert!(delta < 2000);
        }
    }
}
