//! # Observability
//!
//! 可观测性模块：Tracing 初始化、场景日志与轮次指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)，`RUST_LOG` 优先
//! - 可选的 Prometheus 指标监听
//! - 轮次/测距指标收集与统计
//! - 场景日志掩码 (`LogMask`)
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{ObservabilityConfig, RoundMetricsAggregator};
//!
//! let logger = observability::init_with_config(ObservabilityConfig::default())?;
//! logger.note(format_args!("round {} started", 1));
//!
//! let mut aggregator = RoundMetricsAggregator::new();
//! aggregator.round_completed(elapsed_ms, Some(active_duration_ms));
//! println!("{}", aggregator.summary());
//! ```

pub mod logger;
pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::logger::{LogMask, ScenarioLogger};
pub use crate::metrics::{
    record_active_duration_ms, record_distance, record_round, record_session_failure,
    MetricsSummary, RoundMetricsAggregator, RunningStats, StatsSummary,
};

/// 以默认配置初始化：紧凑日志、info 级别、不开指标端口
pub fn init() -> Result<ScenarioLogger> {
    init_with_config(ObservabilityConfig::default())
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
    /// `RUST_LOG` 未设置时的过滤级别
    pub default_log_level: String,
    /// 场景日志掩码
    pub log_mask: LogMask,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            metrics_port: None,
            default_log_level: "info".to_string(),
            log_mask: LogMask::default(),
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    #[default]
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// 使用自定义配置初始化，返回按掩码过滤的场景日志
///
/// 全局 subscriber 只能安装一次，重复调用返回错误。
pub fn init_with_config(config: ObservabilityConfig) -> Result<ScenarioLogger> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_prometheus(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        log_mask = %config.log_mask,
        "Observability initialized"
    );

    Ok(ScenarioLogger::new(config.log_mask))
}

/// 仅初始化 Prometheus 指标（不初始化 Tracing）
///
/// 用于 Tracing 已由其他模块初始化的场景。
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(port)
}

fn install_prometheus(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;

    tracing::info!(port, "Prometheus metrics endpoint listening");
    Ok(())
}
