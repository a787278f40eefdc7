//! Synchronization Demo
//!
//! Runs synchronization rounds against the simulated medium and prints the
//! run statistics. The signal file is generated next to the output directory.
//!
//! Run with: cargo run -p sdm_sync_demos --bin sync_demo [config.toml]

use std::io::Write;
use std::path::Path;

use config_loader::ConfigLoader;
use contracts::{
    ConfigVersion, ExecutionMode, ModemSettings, RangingConfig, RecordSinkConfig, RecordSinkType,
    Role, RunConfig, SessionConfig, SimulatedDevice, SimulationConfig, SyncBlueprint,
};
use observability::{LogMask, ScenarioLogger};
use orchestrator::Synchronizer;
use session::SimulatedMedium;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting synchronization demo");

    // ==== Stage 1: Use default config or load from file ====
    let mut blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading blueprint config");
        ConfigLoader::load_from_path(Path::new(&path))?
    } else {
        create_demo_blueprint()
    };

    // ==== Stage 2: Generate the transmitted signal ====
    let signal_path = blueprint.run.output_dir.join("signal.raw");
    write_chirp(&signal_path, 4096)?;
    blueprint.run.signal_file = format!("raw:{}", signal_path.display());
    ConfigLoader::validate(&blueprint)?;

    // ==== Stage 3: Connect sessions on the simulated medium ====
    let simulation = blueprint
        .simulation
        .clone()
        .ok_or("demo configuration needs a [simulation] section")?;
    let medium = SimulatedMedium::new(&simulation, blueprint.ranging.reference_samples);
    let logger = ScenarioLogger::new(LogMask::default() | LogMask::NOTE);
    let mut synchronizer = Synchronizer::connect(&medium, &blueprint, logger).await?;

    tracing::info!(
        active = %synchronizer.active().id(),
        passives = synchronizer.passives().len(),
        "Sessions connected"
    );

    // ==== Stage 4: Run rounds ====
    let stats = synchronizer.run().await?;
    stats.print_summary();

    tracing::info!("Demo complete");
    Ok(())
}

/// Linear chirp as int16 little endian.
fn write_chirp(path: &Path, samples: usize) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for i in 0..samples {
        let t = i as f64 / samples as f64;
        let phase = 2.0 * std::f64::consts::PI * (50.0 * t + 200.0 * t * t);
        let value = (phase.sin() * 16_000.0) as i16;
        file.write_all(&value.to_le_bytes())?;
    }
    file.flush()
}

/// Create a demo blueprint for testing without config file
fn create_demo_blueprint() -> SyncBlueprint {
    let hosts = [
        ("buoy", "10.0.0.1", Role::Active, 0.0),
        ("rov", "10.0.0.2", Role::Passive, 120.0),
        ("lander", "10.0.0.3", Role::Passive, 260.0),
    ];

    SyncBlueprint {
        version: ConfigVersion::V1,
        run: RunConfig {
            rounds: 3,
            output_dir: std::env::temp_dir().join("sdm-sync-demo"),
            mode: ExecutionMode::Parallel,
            signal_file: String::new(),
            reference_file: None,
            prime_receivers: true,
            prime_duration_ms: 500,
        },
        modem: ModemSettings {
            samples: 8192,
            usbl_heads: 4,
            ..ModemSettings::default()
        },
        ranging: RangingConfig::default(),
        sessions: hosts
            .iter()
            .map(|(name, host, role, _)| SessionConfig {
                name: name.to_string(),
                host: host.to_string(),
                port: None,
                role: *role,
            })
            .collect(),
        records: vec![RecordSinkConfig {
            name: "systime".to_string(),
            sink_type: RecordSinkType::File,
            params: Default::default(),
        }],
        simulation: Some(SimulationConfig {
            sound_speed_mps: 1450.0,
            sync_period_ms: 1000,
            extra_stops: 1,
            devices: hosts
                .iter()
                .enumerate()
                .map(|(i, (_, host, _, position))| SimulatedDevice {
                    host: host.to_string(),
                    position_m: *position,
                    clock_offset: (i as u32).wrapping_mul(1_500_000_000),
                })
                .collect(),
        }),
    }
}
