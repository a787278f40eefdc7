//! Run statistics

use std::path::PathBuf;
use std::time::Duration;

use contracts::ExecutionMode;
use observability::RoundMetricsAggregator;

/// Statistics from a synchronization run
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Rounds requested by the configuration
    pub rounds_requested: u32,

    /// Sessions taking part, active included
    pub sessions: usize,

    pub mode: ExecutionMode,

    /// Total duration of the run
    pub duration: Duration,

    /// Directory of the last persisted round
    pub last_round_dir: Option<PathBuf>,

    /// Round metrics aggregator
    pub metrics: RoundMetricsAggregator,
}

impl RunStats {
    pub fn new(rounds_requested: u32, sessions: usize, mode: ExecutionMode) -> Self {
        Self {
            rounds_requested,
            sessions,
            mode,
            duration: Duration::ZERO,
            last_round_dir: None,
            metrics: RoundMetricsAggregator::new(),
        }
    }

    /// Completed rounds per minute
    pub fn rounds_per_minute(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.metrics.rounds_completed as f64 * 60.0 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let summary = self.metrics.summary();

        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  Synchronization Statistics                  ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Mode: {}", self.mode);
        println!("   ├─ Sessions: {}", self.sessions);
        println!(
            "   ├─ Rounds: {}/{} completed, {} failed",
            summary.rounds_completed, self.rounds_requested, summary.rounds_failed
        );
        println!("   └─ Rounds per minute: {:.2}", self.rounds_per_minute());

        println!("\nRound Metrics");
        println!("   ├─ Round duration (ms): {}", summary.round_duration_ms);
        println!("   └─ Active tx->rx (ms): {}", summary.active_duration_ms);

        if !summary.session_failures.is_empty() {
            println!("\nSession Failures");
            let mut failures: Vec<_> = summary.session_failures.iter().collect();
            failures.sort();
            for (session, count) in failures {
                println!("   ├─ {}: {}", session, count);
            }
        }

        if let Some(dir) = &self.last_round_dir {
            println!("\nLast round: {}", dir.display());
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_per_minute() {
        let mut stats = RunStats::new(5, 3, ExecutionMode::Parallel);
        assert_eq!(stats.rounds_per_minute(), 0.0);

        stats.metrics.round_completed(100.0, Some(25));
        stats.metrics.round_completed(100.0, Some(26));
        stats.duration = Duration::from_secs(30);
        assert!((stats.rounds_per_minute() - 4.0).abs() < 1e-9);
    }
}
