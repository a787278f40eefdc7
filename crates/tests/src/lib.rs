//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟介质上的 e2e 测试（无需硬件）

#[cfg(test)]
mod contract_tests {
    use contracts::{Command, TelemetryRecord, TimeSample};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_record_line_snapshot() {
        let record = TelemetryRecord::active("buoy".into(), TimeSample::new(10, 2_000, 252_000, 7));
        assert_eq!(record.to_line(), "buoy;10;2000;252000;7;250");
        assert_eq!(TelemetryRecord::parse(&record.to_line()).unwrap(), record);
    }

    #[test]
    fn test_command_ranges_snapshot() {
        assert!(Command::Rx {
            samples: contracts::MAX_STREAM_SAMPLES
        }
        .validate()
        .is_ok());
        assert!(Command::UsblRx {
            channel: contracts::MAX_USBL_HEADS,
            samples: 1024
        }
        .validate()
        .is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{SyncBlueprint, TelemetryRecord};
    use observability::{LogMask, ScenarioLogger};
    use orchestrator::{
        measure_distance, prepare_ranging_session, OrchestratorError, RangingScenario,
        RoundPhase, Synchronizer,
    };
    use session::{Session, SimulatedMedium};

    fn write_signal(dir: &Path) -> PathBuf {
        let path = dir.join("signal.raw");
        let mut file = std::fs::File::create(&path).unwrap();
        for i in 0..2048i32 {
            let value = ((i % 64) - 32) as i16 * 512;
            file.write_all(&value.to_le_bytes()).unwrap();
        }
        path
    }

    /// One active and two passive devices on a line, 120 m apart.
    fn blueprint(dir: &Path, mode: &str, rounds: u32) -> SyncBlueprint {
        let signal = write_signal(dir);
        let journal = dir.join("journal.txt");
        let content = format!(
            r#"
[run]
rounds = {rounds}
mode = "{mode}"
output_dir = "{output}"
signal_file = "raw:{signal}"
prime_receivers = true
prime_duration_ms = 200

[modem]
timeout_ms = 2000
samples = 8192
usbl_heads = 4

[modem.config]
threshold = 300

[modem.usbl]
samples = 4096

[ranging]
sound_speed_mps = 1500.0

[[sessions]]
name = "buoy"
host = "10.0.0.1"
role = "active"

[[sessions]]
name = "rov"
host = "10.0.0.2"
role = "passive"

[[sessions]]
name = "lander"
host = "10.0.0.3"
role = "passive"

[[records]]
name = "systime"
sink_type = "file"
[records.params]
journal = "{journal}"

[[records]]
name = "console"
sink_type = "log"

[simulation]
sound_speed_mps = 1500.0
sync_period_ms = 400
extra_stops = 1

[[simulation.devices]]
host = "10.0.0.1"
position_m = 0.0
clock_offset = 0

[[simulation.devices]]
host = "10.0.0.2"
position_m = 120.0
clock_offset = 3000000

[[simulation.devices]]
host = "10.0.0.3"
position_m = 240.0
clock_offset = 4294000000
"#,
            output = dir.join("signals").display(),
            signal = signal.display(),
            journal = journal.display(),
        );
        ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap()
    }

    fn medium(bp: &SyncBlueprint) -> SimulatedMedium {
        SimulatedMedium::new(bp.simulation.as_ref().unwrap(), bp.ranging.reference_samples)
    }

    fn round_dirs(output: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(output)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    fn assert_round_dir(dir: &Path, heads: u8, samples: u64, usbl_samples: u64) {
        for name in ["buoy", "rov", "lander"] {
            let rcv = dir.join(format!("rcv-{}.raw", name));
            assert_eq!(std::fs::metadata(&rcv).unwrap().len(), samples * 2);
            for ch in 0..heads {
                let usbl = dir.join(format!("u{}-{}.raw", ch, name));
                assert_eq!(std::fs::metadata(&usbl).unwrap().len(), usbl_samples * 2);
            }
            assert!(!dir.join(format!("u{}-{}.raw", heads, name)).exists());

            let line = std::fs::read_to_string(dir.join(format!("systime-{}.txt", name))).unwrap();
            let record = TelemetryRecord::parse(&line).unwrap();
            assert_eq!(record.session.as_str(), name);
        }
    }

    /// End-to-end: configuration -> sessions on the simulated medium -> rounds -> files
    #[tokio::test(start_paused = true)]
    async fn test_e2e_parallel_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(dir.path(), "parallel", 2);
        let medium = medium(&bp);
        let mut sync = Synchronizer::connect(&medium, &bp, ScenarioLogger::new(LogMask::default()))
            .await
            .unwrap();

        let stats = sync.run().await.unwrap();
        assert_eq!(stats.metrics.rounds_completed, 2);
        assert_eq!(stats.metrics.rounds_failed, 0);
        assert_eq!(stats.sessions, 3);

        let dirs = round_dirs(&dir.path().join("signals"));
        assert_eq!(dirs.len(), 2);
        for round in &dirs {
            assert_round_dir(round, 4, 8192, 4096);
        }

        // active duration: transmit start to receive start, passives zero
        let active = std::fs::read_to_string(dirs[0].join("systime-buoy.txt")).unwrap();
        let active = TelemetryRecord::parse(&active).unwrap();
        assert!(active.duration_ms > 0);
        let passive = std::fs::read_to_string(dirs[0].join("systime-rov.txt")).unwrap();
        assert_eq!(TelemetryRecord::parse(&passive).unwrap().duration_ms, 0);

        let journal = std::fs::read_to_string(dir.path().join("journal.txt")).unwrap();
        assert_eq!(journal.lines().count(), 6);
        assert!(journal.lines().next().unwrap().starts_with("1;buoy;"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_lockstep_round() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(dir.path(), "lockstep", 1);
        let medium = medium(&bp);
        let mut sync = Synchronizer::connect(&medium, &bp, ScenarioLogger::default())
            .await
            .unwrap();

        let stats = sync.run().await.unwrap();
        assert_eq!(stats.metrics.rounds_completed, 1);

        let dirs = round_dirs(&dir.path().join("signals"));
        assert_eq!(dirs.len(), 1);
        assert_round_dir(&dirs[0], 4, 8192, 4096);
    }

    /// A receive outlasting the reply timeout fails the run before any record is written.
    #[tokio::test(start_paused = true)]
    async fn test_e2e_timeout_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = blueprint(dir.path(), "parallel", 3);
        // 16384 samples take ~16 ms on the simulated devices
        bp.modem.timeout_ms = 5;
        bp.modem.samples = 16_384;
        bp.run.prime_receivers = false;
        let medium = medium(&bp);
        let mut sync = Synchronizer::connect(&medium, &bp, ScenarioLogger::default())
            .await
            .unwrap();

        let err = sync.run().await.unwrap_err();
        match &err {
            OrchestratorError::RoundFailed { round, failures } => {
                assert_eq!(*round, 1);
                assert_eq!(failures.len(), 3);
                assert!(failures.iter().all(|f| f.phase == RoundPhase::WaitData));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sync.stats().metrics.rounds_completed, 0);
        assert_eq!(sync.recorder().rounds_written(), 0);

        for round in round_dirs(&dir.path().join("signals")) {
            assert!(!round.join("systime-buoy.txt").exists());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_distance_between_configured_devices() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = blueprint(dir.path(), "parallel", 1);
        if let Some(simulation) = bp.simulation.as_mut() {
            simulation.sync_period_ms = 0;
        }
        let medium = medium(&bp);
        let timeout = std::time::Duration::from_millis(bp.modem.timeout_ms);

        let mut sessions = Vec::new();
        for name in ["buoy", "lander"] {
            let config = bp.sessions.iter().find(|s| s.name == name).unwrap();
            let mut session = Session::connect(
                &medium,
                &config.name,
                &config.host,
                bp.port_of(config),
                config.role,
                timeout,
            )
            .await
            .unwrap();
            session.set_usbl_heads(bp.modem.usbl_heads).unwrap();
            prepare_ranging_session(&mut session, &bp.modem, &bp.run.signal_file)
                .await
                .unwrap();
            sessions.push(session);
        }
        let (active, passive) = sessions.split_at_mut(1);

        let report = measure_distance(
            &mut active[0],
            &mut passive[0],
            &RangingScenario::from_blueprint(&bp),
            &ScenarioLogger::default(),
        )
        .await
        .unwrap();

        // the lander's counter wraps during the exchange
        assert!((report.estimate.distance_m - 240.0).abs() < 0.05);
        assert_eq!(report.active_capture.usbl.len(), 4);
        assert_eq!(report.passive_capture.samples.len(), 1024);
    }
}
