//! `distance` command implementation.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::RangingConfig;
use observability::ScenarioLogger;
use orchestrator::{measure_distance, prepare_ranging_session, RangingScenario};
use ranging::{calc_distance, DistanceEstimate, RangingRecord};
use serde::Serialize;
use session::{Session, SimulatedMedium};
use tracing::info;

use crate::cli::DistanceArgs;
use crate::error::CliError;
use crate::medium::simulation_for;

/// Distance result for JSON output
#[derive(Debug, Serialize)]
struct DistanceOutput {
    active: String,
    passive: String,
    sound_speed_mps: f64,
    #[serde(flatten)]
    estimate: DistanceEstimate,
}

/// Execute the `distance` command
pub async fn run_distance(args: &DistanceArgs, logger: ScenarioLogger) -> Result<()> {
    let output = match &args.measurement {
        Some(path) if !args.simulate => from_measurement(path, args.sound_speed)?,
        _ => simulated(args, logger).await?,
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialize distance")?;
        println!("{}", json);
    } else {
        println!(
            "{} <-> {}: {:.2} us one way, {:.2} m at {} m/s",
            output.active,
            output.passive,
            output.estimate.propagation_us,
            output.estimate.distance_m,
            output.sound_speed_mps
        );
    }
    Ok(())
}

/// Recompute a saved exchange, possibly with another sound speed.
fn from_measurement(path: &Path, sound_speed_mps: f64) -> Result<DistanceOutput> {
    let record = read_ranging_record(path)?;
    let params = RangingConfig {
        sound_speed_mps,
        reference_samples: record.reference_samples,
    };
    let estimate = calc_distance(&record.measurement, &params)?;
    info!(
        active = %record.active,
        passive = %record.passive,
        distance_m = estimate.distance_m,
        "distance computed from ranging record"
    );
    Ok(DistanceOutput {
        active: record.active,
        passive: record.passive,
        sound_speed_mps,
        estimate,
    })
}

fn read_ranging_record(path: &Path) -> Result<RangingRecord> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::ranging_record(path, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| CliError::ranging_record(path, e.to_string()).into())
}

fn write_ranging_record(path: &Path, record: &RangingRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to serialize ranging record")?;
    std::fs::write(path, json).map_err(|e| CliError::ranging_record(path, e.to_string()))?;
    info!(path = %path.display(), "ranging record saved");
    Ok(())
}

/// Two-way exchange between the active session and the first passive one.
async fn simulated(args: &DistanceArgs, logger: ScenarioLogger) -> Result<DistanceOutput> {
    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }
    let blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let mut simulation = simulation_for(&blueprint, true)?;
    simulation.sync_period_ms = 0;
    let medium = SimulatedMedium::new(&simulation, blueprint.ranging.reference_samples);

    let timeout = Duration::from_millis(blueprint.modem.timeout_ms);
    let active_config = blueprint
        .active()
        .context("configuration has no active session")?;
    let passive_config = blueprint
        .passives()
        .next()
        .context("distance needs at least one passive session")?;

    let mut pair = Vec::with_capacity(2);
    for config in [active_config, passive_config] {
        let mut session = Session::connect(
            &medium,
            &config.name,
            &config.host,
            blueprint.port_of(config),
            config.role,
            timeout,
        )
        .await
        .with_context(|| format!("Failed to connect session '{}'", config.name))?;
        session.set_usbl_heads(blueprint.modem.usbl_heads)?;
        prepare_ranging_session(&mut session, &blueprint.modem, &blueprint.run.signal_file)
            .await?;
        pair.push(session);
    }
    let (active, passive) = pair.split_at_mut(1);

    let scenario = RangingScenario::from_blueprint(&blueprint);
    let report = measure_distance(&mut active[0], &mut passive[0], &scenario, &logger).await?;

    if let Some(path) = &args.save {
        write_ranging_record(
            path,
            &RangingRecord {
                active: active_config.name.clone(),
                passive: passive_config.name.clone(),
                reference_samples: scenario.ranging.reference_samples,
                measurement: report.measurement,
            },
        )?;
    }

    Ok(DistanceOutput {
        active: active_config.name.clone(),
        passive: passive_config.name.clone(),
        sound_speed_mps: scenario.ranging.sound_speed_mps,
        estimate: report.estimate,
    })
}
