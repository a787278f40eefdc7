//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::SyncBlueprint;
use observability::ScenarioLogger;
use orchestrator::Synchronizer;
use session::SimulatedMedium;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::medium::simulation_for;

/// Execute the `run` command
pub async fn run_sync(args: &RunArgs, logger: ScenarioLogger) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    apply_overrides(&mut blueprint, args);
    ConfigLoader::validate(&blueprint).context("Invalid command-line override")?;

    info!(
        rounds = blueprint.run.rounds,
        mode = %blueprint.run.mode,
        sessions = blueprint.sessions.len(),
        output_dir = %blueprint.run.output_dir.display(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let simulation = simulation_for(&blueprint, args.simulate)?;
    info!(
        devices = simulation.devices.len(),
        sync_period_ms = simulation.sync_period_ms,
        "Using simulated medium"
    );
    let medium = SimulatedMedium::new(&simulation, blueprint.ranging.reference_samples);

    let mut synchronizer = Synchronizer::connect(&medium, &blueprint, logger)
        .await
        .context("Failed to connect sessions")?;

    let shutdown_signal = setup_shutdown_signal();

    info!("Starting synchronization...");

    let outcome = tokio::select! {
        result = synchronizer.run() => Some(result.map(|_| ())),
        _ = shutdown_signal => None,
    };

    let stats = synchronizer.stats();
    match outcome {
        Some(Ok(())) => {
            info!(
                rounds_completed = stats.metrics.rounds_completed,
                duration_secs = stats.duration.as_secs_f64(),
                "Synchronization completed successfully"
            );
            stats.print_summary();
        }
        Some(Err(e)) => {
            stats.print_summary();
            return Err(e).context("Synchronization failed");
        }
        None => {
            warn!("Received shutdown signal, stopping synchronization...");
        }
    }

    info!("sdm-sync finished");
    Ok(())
}

fn apply_overrides(blueprint: &mut SyncBlueprint, args: &RunArgs) {
    if let Some(rounds) = args.rounds {
        info!(rounds, "Overriding rounds from CLI");
        blueprint.run.rounds = rounds;
    }
    if let Some(ref dir) = args.output_dir {
        info!(output_dir = %dir.display(), "Overriding output directory from CLI");
        blueprint.run.output_dir = dir.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        info!(timeout_ms, "Overriding reply timeout from CLI");
        blueprint.modem.timeout_ms = timeout_ms;
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SyncBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Run:");
    println!("  Rounds: {}", blueprint.run.rounds);
    println!("  Mode: {}", blueprint.run.mode);
    println!("  Output: {}", blueprint.run.output_dir.display());
    println!("  Signal: {}", blueprint.run.signal_file);

    println!("\nSessions ({}):", blueprint.sessions.len());
    for session in &blueprint.sessions {
        println!(
            "  - {} ({}) at {}:{}",
            session.name,
            session.role,
            session.host,
            blueprint.port_of(session)
        );
    }

    if !blueprint.records.is_empty() {
        println!("\nRecords ({}):", blueprint.records.len());
        for sink in &blueprint.records {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("sync.toml"),
            simulate: true,
            rounds: Some(7),
            output_dir: Some(PathBuf::from("/tmp/rounds")),
            timeout_ms: None,
            dry_run: false,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_apply_overrides() {
        let mut blueprint = ConfigLoader::load_from_str(
            r#"
[run]
signal_file = "raw:signal.raw"

[modem]
timeout_ms = 1500

[[sessions]]
name = "buoy"
host = "10.0.0.1"
role = "active"
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        apply_overrides(&mut blueprint, &args());

        assert_eq!(blueprint.run.rounds, 7);
        assert_eq!(blueprint.run.output_dir, PathBuf::from("/tmp/rounds"));
        assert_eq!(blueprint.modem.timeout_ms, 1500);
    }

    #[tokio::test]
    async fn test_missing_config() {
        let mut args = args();
        args.config = PathBuf::from("/nonexistent/sync.toml");
        let err = run_sync(&args, ScenarioLogger::default()).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
