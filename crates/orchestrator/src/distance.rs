//! Two-way ranging between one active and one passive session
//!
//! The passive side listens while the active side transmits, then the roles
//! swap. Each side reports its device counters right after transmitting and
//! right after receiving; `ranging::calc_distance` turns them into a range.

use contracts::{ModemSettings, RangingConfig, ReplyKind, SyncBlueprint, TimeSample, Transport};
use observability::ScenarioLogger;
use ranging::{calc_distance, DistanceEstimate, SessionPairMeasurement, SideTimes};
use session::Session;
use tracing::{info, instrument};

use crate::error::{Result, SessionFailure};
use crate::phase::{InPhase, RoundPhase};

/// Samples captured after detection on the listening side.
pub const RANGING_RECEIVE_SAMPLES: u32 = 1024;

#[derive(Debug, Clone)]
pub struct RangingScenario {
    pub signal_file: String,
    pub reference_file: Option<String>,
    pub receive_samples: u32,
    pub usbl_samples: u32,
    pub ranging: RangingConfig,
}

impl RangingScenario {
    pub fn from_blueprint(blueprint: &SyncBlueprint) -> Self {
        Self {
            signal_file: blueprint.run.signal_file.clone(),
            reference_file: blueprint.run.reference_file.clone(),
            receive_samples: RANGING_RECEIVE_SAMPLES,
            usbl_samples: blueprint.modem.usbl.samples,
            ranging: blueprint.ranging,
        }
    }
}

/// Data captured by the listening side of one exchange.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    pub samples: Vec<i16>,
    pub usbl: Vec<Vec<i16>>,
}

#[derive(Debug, Clone)]
pub struct DistanceReport {
    pub measurement: SessionPairMeasurement,
    pub estimate: DistanceEstimate,
    /// What the active side heard from the passive side
    pub active_capture: Capture,
    /// What the passive side heard from the active side
    pub passive_capture: Capture,
}

/// Configure a session for ranging and upload the signal as its detection reference.
pub async fn prepare_ranging_session<T: Transport>(
    session: &mut Session<T>,
    modem: &ModemSettings,
    signal_file: &str,
) -> Result<()> {
    let id = session.id().clone();
    session
        .send_config(&modem.config)
        .await
        .in_phase(&id, RoundPhase::Configure)?;
    session
        .send_usbl_config(&modem.usbl)
        .await
        .in_phase(&id, RoundPhase::Configure)?;
    session
        .send_ref_file(signal_file)
        .await
        .in_phase(&id, RoundPhase::Configure)?;
    Ok(())
}

/// Run both exchanges and estimate the distance between the two devices.
#[instrument(name = "measure_distance", skip_all, fields(active = %active.id(), passive = %passive.id()))]
pub async fn measure_distance<T: Transport>(
    active: &mut Session<T>,
    passive: &mut Session<T>,
    scenario: &RangingScenario,
    logger: &ScenarioLogger,
) -> Result<DistanceReport> {
    let forward = exchange(active, passive, scenario, logger).await?;
    let backward = exchange(passive, active, scenario, logger).await?;

    let measurement = SessionPairMeasurement {
        active: SideTimes {
            send: forward.send_time,
            receive: backward.receive_time,
        },
        passive: SideTimes {
            send: backward.send_time,
            receive: forward.receive_time,
        },
    };
    let estimate = calc_distance(&measurement, &scenario.ranging)?;

    let pair = format!("{}-{}", active.id(), passive.id());
    observability::record_distance(&pair, estimate.distance_m);
    info!(
        pair = %pair,
        delta_active = estimate.delta_active,
        delta_passive = estimate.delta_passive,
        propagation_us = estimate.propagation_us,
        distance_m = estimate.distance_m,
        "distance measured"
    );
    logger.note(format_args!(
        "{:.2} us, distance {:.2} m",
        estimate.propagation_us, estimate.distance_m
    ));

    Ok(DistanceReport {
        measurement,
        estimate,
        active_capture: backward.capture,
        passive_capture: forward.capture,
    })
}

struct Exchange {
    send_time: TimeSample,
    receive_time: TimeSample,
    capture: Capture,
}

/// `receiver` listens, `sender` transmits. Failed sessions are stopped.
async fn exchange<T: Transport>(
    sender: &mut Session<T>,
    receiver: &mut Session<T>,
    scenario: &RangingScenario,
    logger: &ScenarioLogger,
) -> Result<Exchange> {
    let result = exchange_steps(sender, receiver, scenario, logger).await;
    if let Err(failure) = &result {
        if receiver.is_receiving() || failure.session == *receiver.id() {
            receiver.abort().await;
        }
        if failure.session == *sender.id() {
            sender.abort().await;
        }
    }
    result.map_err(Into::into)
}

async fn exchange_steps<T: Transport>(
    sender: &mut Session<T>,
    receiver: &mut Session<T>,
    scenario: &RangingScenario,
    logger: &ScenarioLogger,
) -> std::result::Result<Exchange, SessionFailure> {
    let rx_id = receiver.id().clone();
    let tx_id = sender.id().clone();

    logger.note(format_args!("{}: listening for {}", rx_id, tx_id));
    receiver
        .add_sink_membuf()
        .in_phase(&rx_id, RoundPhase::ArmReceive)?;
    receiver
        .send_rx(scenario.receive_samples)
        .await
        .in_phase(&rx_id, RoundPhase::ArmReceive)?;

    logger.note(format_args!("{}: transmitting", tx_id));
    sender
        .send_signal_file(&scenario.signal_file, scenario.reference_file.as_deref())
        .await
        .in_phase(&tx_id, RoundPhase::TransmitSignal)?;
    let send_time = sender
        .receive_systime()
        .await
        .in_phase(&tx_id, RoundPhase::FetchSystime)?;

    receiver
        .expect(ReplyKind::Stop, None)
        .await
        .in_phase(&rx_id, RoundPhase::WaitData)?;
    let samples = receiver
        .get_membuf()
        .in_phase(&rx_id, RoundPhase::WaitData)?;
    let usbl = receiver
        .receive_usbl_data(scenario.usbl_samples, None)
        .await
        .in_phase(&rx_id, RoundPhase::CollectUsbl)?;
    let receive_time = receiver
        .receive_systime()
        .await
        .in_phase(&rx_id, RoundPhase::FetchSystime)?;
    logger.note(format_args!(
        "{}: received {} samples, {} usbl channels",
        rx_id,
        samples.len(),
        usbl.len()
    ));

    Ok(Exchange {
        send_time,
        receive_time,
        capture: Capture { samples, usbl },
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use contracts::{ModemConfig, Role, SessionId, SimulatedDevice, SimulationConfig, UsblConfig};
    use observability::LogMask;
    use session::{SimulatedLink, SimulatedMedium};

    use super::*;

    fn signal_file(dir: &std::path::Path) -> String {
        let path = dir.join("signal.raw");
        let mut file = std::fs::File::create(&path).unwrap();
        for i in 0..512i16 {
            file.write_all(&(i * 16).to_le_bytes()).unwrap();
        }
        format!("raw:{}", path.display())
    }

    fn modem() -> ModemSettings {
        ModemSettings {
            config: ModemConfig {
                threshold: 200,
                gain: 0,
                source_level: 3,
                preamp_gain: 1,
            },
            usbl: UsblConfig {
                delay: 0,
                samples: 2048,
                gain: 3,
                sample_rate: 5,
            },
            usbl_heads: 5,
            ..ModemSettings::default()
        }
    }

    async fn pair(
        medium: &SimulatedMedium,
        signal: &str,
    ) -> (Session<SimulatedLink>, Session<SimulatedLink>) {
        let timeout = Duration::from_millis(2000);
        let mut active = Session::connect(medium, "active", "10.0.0.1", 4200, Role::Active, timeout)
            .await
            .unwrap();
        let mut passive =
            Session::connect(medium, "passive", "10.0.0.2", 4200, Role::Passive, timeout)
                .await
                .unwrap();
        for session in [&mut active, &mut passive] {
            session.set_usbl_heads(5).unwrap();
            prepare_ranging_session(session, &modem(), signal).await.unwrap();
        }
        (active, passive)
    }

    fn simulation(distance_m: f64, passive_offset: u32) -> SimulationConfig {
        SimulationConfig {
            sound_speed_mps: 1500.0,
            sync_period_ms: 0,
            extra_stops: 1,
            devices: vec![
                SimulatedDevice {
                    host: "10.0.0.1".into(),
                    position_m: 0.0,
                    clock_offset: 0,
                },
                SimulatedDevice {
                    host: "10.0.0.2".into(),
                    position_m: distance_m,
                    clock_offset: passive_offset,
                },
            ],
        }
    }

    fn scenario(signal: String) -> RangingScenario {
        RangingScenario {
            signal_file: signal,
            reference_file: None,
            receive_samples: RANGING_RECEIVE_SAMPLES,
            usbl_samples: 2048,
            ranging: RangingConfig {
                sound_speed_mps: 1500.0,
                reference_samples: 16_384,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_distance_simulated() {
        let dir = tempfile::tempdir().unwrap();
        let signal = signal_file(dir.path());
        let medium = SimulatedMedium::new(&simulation(150.0, 7_000_000), 16_384);
        let (mut active, mut passive) = pair(&medium, &signal).await;

        let report = measure_distance(
            &mut active,
            &mut passive,
            &scenario(signal),
            &ScenarioLogger::new(LogMask::default()),
        )
        .await
        .unwrap();

        assert!((report.estimate.propagation_us - 100_000.0).abs() <= 1.0);
        assert!((report.estimate.distance_m - 150.0).abs() < 0.01);
        assert_eq!(report.passive_capture.samples.len(), 1024);
        assert_eq!(report.active_capture.usbl.len(), 5);
        assert!(report.active_capture.usbl.iter().all(|ch| ch.len() == 2048));
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_distance_across_counter_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let signal = signal_file(dir.path());
        let medium = SimulatedMedium::new(&simulation(300.0, u32::MAX - 50_000), 16_384);
        let (mut active, mut passive) = pair(&medium, &signal).await;

        let report = measure_distance(&mut active, &mut passive, &scenario(signal), &ScenarioLogger::default())
            .await
            .unwrap();

        assert!((report.estimate.distance_m - 300.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out_and_stops_listener() {
        let dir = tempfile::tempdir().unwrap();
        let signal = signal_file(dir.path());
        // 5 km at 1 m/s: the signal cannot arrive before the timeout
        let mut config = simulation(0.0, 0);
        config.devices[1].position_m = 5_000.0;
        config.sound_speed_mps = 1.0;
        let medium = SimulatedMedium::new(&config, 16_384);
        let (mut active, mut passive) = pair(&medium, &signal).await;

        let err = measure_distance(&mut active, &mut passive, &scenario(signal), &ScenarioLogger::default())
            .await
            .unwrap_err();

        assert_eq!(err.failed_sessions(), vec![SessionId::from("passive")]);
        assert!(!passive.is_receiving());
    }
}
