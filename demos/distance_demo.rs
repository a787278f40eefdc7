//! Distance Demo
//!
//! Two simulated modems at a known distance exchange signals in both
//! directions; the range is estimated from the device counters alone.
//!
//! Run with: cargo run -p sdm_sync_demos --bin distance_demo [distance_m]

use std::io::Write;
use std::time::Duration;

use contracts::{
    ModemSettings, RangingConfig, Role, SimulatedDevice, SimulationConfig, UsblConfig,
};
use observability::{LogMask, ScenarioLogger};
use orchestrator::{
    measure_distance, prepare_ranging_session, RangingScenario, RANGING_RECEIVE_SAMPLES,
};
use session::{Session, SimulatedMedium};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let distance_m: f64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 425.0,
    };
    tracing::info!(distance_m, "Starting distance demo");

    let dir = std::env::temp_dir().join("sdm-sync-distance");
    std::fs::create_dir_all(&dir)?;
    let signal_path = dir.join("signal.raw");
    let mut file = std::fs::File::create(&signal_path)?;
    for i in 0..2048i32 {
        let value = (((i as f64) * 0.3).sin() * 12_000.0) as i16;
        file.write_all(&value.to_le_bytes())?;
    }
    let signal = format!("raw:{}", signal_path.display());

    let ranging = RangingConfig {
        sound_speed_mps: 1450.0,
        reference_samples: 16_384,
    };
    let medium = SimulatedMedium::new(
        &SimulationConfig {
            sound_speed_mps: ranging.sound_speed_mps,
            sync_period_ms: 0,
            extra_stops: 2,
            devices: vec![
                SimulatedDevice {
                    host: "10.0.0.1".into(),
                    position_m: 0.0,
                    clock_offset: 123_456_789,
                },
                SimulatedDevice {
                    host: "10.0.0.2".into(),
                    position_m: distance_m,
                    clock_offset: u32::MAX - 250_000,
                },
            ],
        },
        ranging.reference_samples,
    );

    let modem = ModemSettings {
        usbl: UsblConfig {
            samples: 2048,
            ..UsblConfig::default()
        },
        usbl_heads: 5,
        ..ModemSettings::default()
    };

    let timeout = Duration::from_millis(modem.timeout_ms);
    let mut active =
        Session::connect(&medium, "buoy", "10.0.0.1", modem.port, Role::Active, timeout).await?;
    let mut passive =
        Session::connect(&medium, "rov", "10.0.0.2", modem.port, Role::Passive, timeout).await?;
    for session in [&mut active, &mut passive] {
        session.set_usbl_heads(modem.usbl_heads)?;
        prepare_ranging_session(session, &modem, &signal).await?;
    }

    let scenario = RangingScenario {
        signal_file: signal,
        reference_file: None,
        receive_samples: RANGING_RECEIVE_SAMPLES,
        usbl_samples: modem.usbl.samples,
        ranging,
    };
    let logger = ScenarioLogger::new(LogMask::default() | LogMask::NOTE);
    let report = measure_distance(&mut active, &mut passive, &scenario, &logger).await?;

    println!(
        "configured {:.2} m, measured {:.2} m ({:.1} us one way)",
        distance_m, report.estimate.distance_m, report.estimate.propagation_us
    );
    println!(
        "active heard {} samples on {} usbl channels",
        report.active_capture.samples.len(),
        report.active_capture.usbl.len()
    );
    Ok(())
}
