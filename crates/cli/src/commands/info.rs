//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ModemConfig, SyncBlueprint, UsblConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    run: RunInfo,
    sessions: Vec<SessionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modem: Option<ModemInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    records: Vec<RecordInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation_devices: Option<usize>,
}

#[derive(Serialize)]
struct RunInfo {
    rounds: u32,
    mode: String,
    output_dir: String,
    signal_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_file: Option<String>,
    prime_receivers: bool,
}

#[derive(Serialize)]
struct SessionInfo {
    name: String,
    role: String,
    address: String,
}

#[derive(Serialize)]
struct ModemInfo {
    timeout_ms: u64,
    samples: u32,
    usbl_heads: u8,
    config: ModemConfig,
    usbl: UsblConfig,
}

#[derive(Serialize)]
struct RecordInfo {
    name: String,
    sink_type: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &SyncBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sessions = blueprint
        .sessions
        .iter()
        .map(|s| SessionInfo {
            name: s.name.clone(),
            role: s.role.to_string(),
            address: format!("{}:{}", s.host, blueprint.port_of(s)),
        })
        .collect();

    let modem = args.modem.then(|| ModemInfo {
        timeout_ms: blueprint.modem.timeout_ms,
        samples: blueprint.modem.samples,
        usbl_heads: blueprint.modem.usbl_heads,
        config: blueprint.modem.config,
        usbl: blueprint.modem.usbl,
    });

    let records = if args.records {
        blueprint
            .records
            .iter()
            .map(|s| RecordInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        run: RunInfo {
            rounds: blueprint.run.rounds,
            mode: blueprint.run.mode.to_string(),
            output_dir: blueprint.run.output_dir.display().to_string(),
            signal_file: blueprint.run.signal_file.clone(),
            reference_file: blueprint.run.reference_file.clone(),
            prime_receivers: blueprint.run.prime_receivers,
        },
        sessions,
        modem,
        records,
        simulation_devices: blueprint.simulation.as_ref().map(|s| s.devices.len()),
    }
}

fn print_config_info(blueprint: &SyncBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 SDM Sync Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let run = &blueprint.run;
    println!("Run");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Rounds: {} ({})", run.rounds, run.mode);
    println!("   ├─ Output: {}", run.output_dir.display());
    println!("   ├─ Signal: {}", run.signal_file);
    match &run.reference_file {
        Some(reference) => println!("   ├─ Reference: {}", reference),
        None => println!("   ├─ Reference: (none)"),
    }
    if run.prime_receivers {
        println!("   └─ Priming: {} ms", run.prime_duration_ms);
    } else {
        println!("   └─ Priming: disabled");
    }

    println!("\nSessions ({})", blueprint.sessions.len());
    for (i, session) in blueprint.sessions.iter().enumerate() {
        let is_last = i == blueprint.sessions.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        println!(
            "   {} {} [{}] {}:{}",
            prefix,
            session.name,
            session.role,
            session.host,
            blueprint.port_of(session)
        );
    }

    if args.modem {
        let modem = &blueprint.modem;
        println!("\nModem");
        println!("   ├─ Timeout: {} ms", modem.timeout_ms);
        println!("   ├─ Receive samples: {}", modem.samples);
        println!("   ├─ USBL heads: {}", modem.usbl_heads);
        println!(
            "   ├─ Config: threshold {}, gain {}, source level {}, preamp {}",
            modem.config.threshold,
            modem.config.gain,
            modem.config.source_level,
            modem.config.preamp_gain
        );
        println!(
            "   └─ USBL: delay {}, samples {}, gain {}, rate {}",
            modem.usbl.delay, modem.usbl.samples, modem.usbl.gain, modem.usbl.sample_rate
        );
    }

    if args.records && !blueprint.records.is_empty() {
        println!("\nRecords ({})", blueprint.records.len());
        for (i, sink) in blueprint.records.iter().enumerate() {
            let is_last = i == blueprint.records.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
        }
    }

    if let Some(simulation) = &blueprint.simulation {
        println!(
            "\nSimulation: {} devices, {} m/s, sync every {} ms",
            simulation.devices.len(),
            simulation.sound_speed_mps,
            simulation.sync_period_ms
        );
    }

    println!();
}
