//! 同步轮次指标收集模块
//!
//! 记录轮次结果、阶段耗时与测距结果；轮次指标在内存中聚合以输出摘要。

use std::collections::HashMap;

use metrics::{counter, gauge, histogram};

/// 记录一轮结束
pub fn record_round(success: bool, duration_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!("sdm_sync_rounds_total", "status" => status).increment(1);
    histogram!("sdm_sync_round_duration_ms").record(duration_ms);
}

/// 记录会话在某阶段失败
pub fn record_session_failure(session: &str, phase: &str) {
    counter!(
        "sdm_sync_session_failures_total",
        "session" => session.to_string(),
        "phase" => phase.to_string()
    )
    .increment(1);
}

/// 记录 active 会话的发射到接收间隔
pub fn record_active_duration_ms(duration_ms: u32) {
    histogram!("sdm_sync_active_duration_ms").record(duration_ms as f64);
}

/// 记录测距结果
pub fn record_distance(pair: &str, distance_m: f64) {
    gauge!("sdm_sync_distance_m", "pair" => pair.to_string()).set(distance_m);
    histogram!("sdm_sync_distance_m_hist", "pair" => pair.to_string()).record(distance_m);
}

/// 轮次指标聚合器
#[derive(Debug, Clone, Default)]
pub struct RoundMetricsAggregator {
    /// 成功轮数
    pub rounds_completed: u64,

    /// 失败轮数
    pub rounds_failed: u64,

    /// 每轮耗时统计 (毫秒)
    pub round_duration_stats: RunningStats,

    /// active 发射到接收间隔统计 (毫秒)
    pub active_duration_stats: RunningStats,

    /// 各会话失败次数
    pub session_failures: HashMap<String, u64>,
}

impl RoundMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round_completed(&mut self, duration_ms: f64, active_duration_ms: Option<u32>) {
        self.rounds_completed += 1;
        self.round_duration_stats.push(duration_ms);
        if let Some(active) = active_duration_ms {
            self.active_duration_stats.push(active as f64);
        }
        record_round(true, duration_ms);
        if let Some(active) = active_duration_ms {
            record_active_duration_ms(active);
        }
    }

    pub fn round_failed(&mut self, duration_ms: f64, failed_sessions: &[String]) {
        self.rounds_failed += 1;
        self.round_duration_stats.push(duration_ms);
        for session in failed_sessions {
            *self.session_failures.entry(session.clone()).or_insert(0) += 1;
        }
        record_round(false, duration_ms);
    }

    pub fn summary(&self) -> MetricsSummary {
        let total = self.rounds_completed + self.rounds_failed;
        MetricsSummary {
            rounds_completed: self.rounds_completed,
            rounds_failed: self.rounds_failed,
            success_rate: if total > 0 {
                self.rounds_completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            round_duration_ms: StatsSummary::from(&self.round_duration_stats),
            active_duration_ms: StatsSummary::from(&self.active_duration_stats),
            session_failures: self.session_failures.clone(),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub rounds_completed: u64,
    pub rounds_failed: u64,
    pub success_rate: f64,
    pub round_duration_ms: StatsSummary,
    pub active_duration_ms: StatsSummary,
    pub session_failures: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Round Metrics Summary ===")?;
        writeln!(
            f,
            "Rounds: {} completed, {} failed ({:.2}% success)",
            self.rounds_completed, self.rounds_failed, self.success_rate
        )?;
        writeln!(f, "Round duration (ms): {}", self.round_duration_ms)?;
        writeln!(f, "Active tx->rx (ms): {}", self.active_duration_ms)?;

        if !self.session_failures.is_empty() {
            writeln!(f, "Session failures:")?;
            let mut sessions: Vec<_> = self.session_failures.iter().collect();
            sessions.sort();
            for (session, count) in sessions {
                writeln!(f, "  {}: {}", session, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计 (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_rounds() {
        let mut aggregator = RoundMetricsAggregator::new();
        aggregator.round_completed(120.0, Some(42));
        aggregator.round_completed(80.0, Some(40));
        aggregator.round_failed(30.0, &["p2".to_string()]);

        let summary = aggregator.summary();
        assert_eq!(summary.rounds_completed, 2);
        assert_eq!(summary.rounds_failed, 1);
        assert!((summary.success_rate - 66.666).abs() < 0.01);
        assert_eq!(summary.active_duration_ms.count, 2);
        assert_eq!(summary.session_failures.get("p2"), Some(&1));
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = RoundMetricsAggregator::new();
        aggregator.round_completed(100.0, None);
        let output = aggregator.summary().to_string();
        assert!(output.contains("Rounds: 1 completed, 0 failed (100.00% success)"));
        assert!(output.contains("Active tx->rx (ms): N/A"));
    }
}
