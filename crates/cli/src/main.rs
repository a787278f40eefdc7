//! # SDM Sync CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 同步轮次编排
//! - 测距计算

mod cli;
mod commands;
mod error;
mod medium;

use anyhow::Result;
use clap::Parser;
use observability::{ObservabilityConfig, ScenarioLogger};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_distance, run_info, run_sync, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let logger = init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "sdm-sync starting");

    let result = match &cli.command {
        Commands::Run(args) => run_sync(args, logger).await,
        Commands::Distance(args) => run_distance(args, logger).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<ScenarioLogger> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        log_mask: cli.log_mask,
    })
}
