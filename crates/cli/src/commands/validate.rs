//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::SyncBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    rounds: u32,
    mode: String,
    session_count: usize,
    passive_count: usize,
    record_sink_count: usize,
    simulated: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    rounds: blueprint.run.rounds,
                    mode: blueprint.run.mode.to_string(),
                    session_count: blueprint.sessions.len(),
                    passive_count: blueprint.passives().count(),
                    record_sink_count: blueprint.records.len(),
                    simulated: blueprint.simulation.is_some(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &SyncBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.records.is_empty() {
        warnings.push("No record sinks configured - telemetry is only logged".to_string());
    }

    if blueprint.passives().next().is_none() {
        warnings.push("No passive sessions - rounds only record the active device".to_string());
    }

    if blueprint.modem.usbl.samples > blueprint.modem.samples {
        warnings.push(format!(
            "modem.usbl.samples ({}) exceeds modem.samples ({})",
            blueprint.modem.usbl.samples, blueprint.modem.samples
        ));
    }

    if blueprint.modem.config.threshold == 0 {
        warnings.push(
            "modem.config.threshold is 0 - detection is disabled outside rounds".to_string(),
        );
    }

    if !blueprint.run.prime_receivers {
        warnings.push("Receiver priming disabled - first round may see gain settling".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Rounds: {} ({})", summary.rounds, summary.mode);
            println!(
                "  Sessions: {} ({} passive)",
                summary.session_count, summary.passive_count
            );
            println!("  Record sinks: {}", summary.record_sink_count);
            println!("  Simulated: {}", summary.simulated);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID: &str = r#"
[run]
signal_file = "raw:signal.raw"

[[sessions]]
name = "buoy"
host = "10.0.0.1"
role = "active"
"#;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("sync.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_validate_reports_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(&dir, VALID);
        let result = validate_config(&ValidateArgs {
            config,
            json: true,
        });
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("No passive sessions")));
        assert_eq!(result.summary.unwrap().session_count, 1);
    }

    #[test]
    fn test_validate_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(&dir, &VALID.replace("active", "passive"));
        let result = validate_config(&ValidateArgs {
            config,
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("exactly one active"));
    }
}
