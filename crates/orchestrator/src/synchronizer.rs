//! Synchronizer - drives one active and N passive sessions through rounds
//!
//! In parallel mode every passive session is moved into its own task for the
//! duration of a round and handed back through the join handle. The active
//! session runs on the calling task; its transmission is complete before
//! the passive tasks are joined, and every task is joined before a failure
//! is reported.

use std::time::Duration;

use contracts::{
    Connector, ExecutionMode, ModemSettings, Role, RoundReport, RunConfig, SessionId,
    SyncBlueprint, TelemetryRecord, Transport,
};
use observability::{record_session_failure, ScenarioLogger};
use recorder::Recorder;
use session::Session;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::error::{OrchestratorError, Result, SessionFailure};
use crate::phase::RoundPhase;
use crate::priming::prime_receivers;
use crate::round::{self, RoundPlan};
use crate::stats::RunStats;

pub struct Synchronizer<T: Transport + 'static> {
    /// Active session first, then the passives in configuration order
    sessions: Vec<Session<T>>,
    run: RunConfig,
    modem: ModemSettings,
    recorder: Recorder,
    logger: ScenarioLogger,
    stats: RunStats,
}

impl<T: Transport + 'static> Synchronizer<T> {
    /// Connect every configured session.
    #[instrument(name = "synchronizer_connect", skip_all, fields(sessions = blueprint.sessions.len()))]
    pub async fn connect<C>(
        connector: &C,
        blueprint: &SyncBlueprint,
        logger: ScenarioLogger,
    ) -> Result<Self>
    where
        C: Connector<Link = T>,
    {
        let timeout = Duration::from_millis(blueprint.modem.timeout_ms);
        let mut sessions = Vec::with_capacity(blueprint.sessions.len());
        for config in &blueprint.sessions {
            let session = Session::connect(
                connector,
                &config.name,
                &config.host,
                blueprint.port_of(config),
                config.role,
                timeout,
            )
            .await
            .map_err(|e| {
                OrchestratorError::from(SessionFailure::new(
                    &SessionId::from(config.name.as_str()),
                    RoundPhase::Configure,
                    e,
                ))
            })?;
            sessions.push(session);
        }
        Self::new(sessions, blueprint, logger)
    }

    /// Build from connected sessions. Exactly one of them must be active.
    pub fn new(
        sessions: Vec<Session<T>>,
        blueprint: &SyncBlueprint,
        logger: ScenarioLogger,
    ) -> Result<Self> {
        let (mut ordered, passives): (Vec<_>, Vec<_>) = sessions
            .into_iter()
            .partition(|s| s.role() == Role::Active);
        if ordered.len() != 1 {
            return Err(OrchestratorError::setup(format!(
                "expected exactly one active session, found {}",
                ordered.len()
            )));
        }
        ordered.extend(passives);

        for session in &mut ordered {
            session
                .set_usbl_heads(blueprint.modem.usbl_heads)
                .map_err(|e| OrchestratorError::setup(e.to_string()))?;
        }

        let recorder = Recorder::new(blueprint.run.output_dir.clone(), &blueprint.records)?;
        let stats = RunStats::new(blueprint.run.rounds, ordered.len(), blueprint.run.mode);
        Ok(Self {
            sessions: ordered,
            run: blueprint.run.clone(),
            modem: blueprint.modem.clone(),
            recorder,
            logger,
            stats,
        })
    }

    pub fn active(&self) -> &Session<T> {
        &self.sessions[0]
    }

    pub fn passives(&self) -> &[Session<T>] {
        &self.sessions[1..]
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Configure every session and, if enabled, prime the receivers.
    #[instrument(name = "synchronizer_prepare", skip(self))]
    pub async fn prepare(&mut self) -> Result<()> {
        for session in &mut self.sessions {
            round::configure(session, &self.modem).await?;
        }
        if self.run.prime_receivers {
            prime_receivers(
                &mut self.sessions,
                Duration::from_millis(self.run.prime_duration_ms),
                &self.logger,
            )
            .await?;
        }
        info!(sessions = self.sessions.len(), "sessions prepared");
        Ok(())
    }

    /// Prepare, run every configured round and close the record sinks.
    ///
    /// Stops at the first failed round.
    pub async fn run(&mut self) -> Result<&RunStats> {
        let started = Instant::now();
        let outcome = self.run_rounds().await;
        self.stats.duration = started.elapsed();
        let closed = self.recorder.close().await;
        outcome?;
        closed?;
        Ok(&self.stats)
    }

    async fn run_rounds(&mut self) -> Result<()> {
        self.prepare().await?;
        for round in 1..=self.run.rounds {
            self.run_round(round).await?;
        }
        Ok(())
    }

    /// Run one round and persist its records. No record is written if any session fails.
    #[instrument(name = "synchronizer_round", skip(self), fields(mode = %self.run.mode))]
    pub async fn run_round(&mut self, round: u32) -> Result<RoundReport> {
        let started = Instant::now();
        let layout = self.recorder.begin_round()?;
        let plan = RoundPlan {
            round,
            modem: self.modem.clone(),
            signal_file: self.run.signal_file.clone(),
            reference_file: self.run.reference_file.clone(),
            layout: layout.clone(),
            logger: self.logger,
        };
        self.logger
            .note(format_args!("round {} into {}", round, layout.dir().display()));

        let outcome = match self.run.mode {
            ExecutionMode::Parallel => self.run_parallel(&plan).await,
            ExecutionMode::Lockstep => self.run_lockstep(&plan).await,
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let records = match outcome {
            Ok(records) => records,
            Err(RoundError::Failed(failures)) => {
                for failure in &failures {
                    error!(
                        round,
                        session = %failure.session,
                        phase = %failure.phase,
                        error = %failure.source,
                        "session failed"
                    );
                    record_session_failure(&failure.session, failure.phase.as_str());
                }
                let names: Vec<String> = failures.iter().map(|f| f.session.to_string()).collect();
                self.stats.metrics.round_failed(elapsed_ms, &names);
                return Err(OrchestratorError::RoundFailed { round, failures });
            }
            Err(RoundError::Lost(err)) => {
                let names: Vec<String> = err
                    .failed_sessions()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                self.stats.metrics.round_failed(elapsed_ms, &names);
                return Err(err);
            }
        };

        let active_duration = records.first().map(|r| r.duration_ms);
        let report = self.recorder.persist(round, &layout, records).await?;
        self.stats.metrics.round_completed(elapsed_ms, active_duration);
        self.stats.last_round_dir = Some(report.dir.clone());
        info!(round, elapsed_ms, dir = %report.dir.display(), "round completed");
        Ok(report)
    }

    async fn run_parallel(
        &mut self,
        plan: &RoundPlan,
    ) -> std::result::Result<Vec<TelemetryRecord>, RoundError> {
        let passives = self.sessions.split_off(1);
        let handles: Vec<_> = passives
            .into_iter()
            .map(|session| {
                let id = session.id().clone();
                (id, tokio::spawn(round::drive_owned(session, plan.clone())))
            })
            .collect();

        let mut records = Vec::with_capacity(handles.len() + 1);
        let mut failures = Vec::new();

        let active = &mut self.sessions[0];
        match round::drive(active, plan).await {
            Ok(record) => records.push(record),
            Err(failure) => {
                active.abort().await;
                failures.push(failure);
            }
        }

        let mut lost = None;
        for (id, handle) in handles {
            self.logger
                .note(format_args!("waiting for {} to finish", id));
            match handle.await {
                Ok((session, result)) => {
                    self.sessions.push(session);
                    match result {
                        Ok(record) => records.push(record),
                        Err(failure) => failures.push(failure),
                    }
                }
                Err(e) => {
                    warn!(session = %id, error = %e, "passive task lost its session");
                    lost.get_or_insert(OrchestratorError::TaskJoin {
                        session: id,
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(err) = lost {
            return Err(RoundError::Lost(err));
        }
        if !failures.is_empty() {
            return Err(RoundError::Failed(failures));
        }
        Ok(records)
    }

    async fn run_lockstep(
        &mut self,
        plan: &RoundPlan,
    ) -> std::result::Result<Vec<TelemetryRecord>, RoundError> {
        let result = self.lockstep_phases(plan).await;
        if let Err(failure) = &result {
            for session in &mut self.sessions {
                if session.id() == &failure.session || session.is_receiving() {
                    session.abort().await;
                }
            }
        }
        result.map_err(|failure| RoundError::Failed(vec![failure]))
    }

    /// Every phase is applied to all sessions before the next one starts.
    async fn lockstep_phases(
        &mut self,
        plan: &RoundPlan,
    ) -> std::result::Result<Vec<TelemetryRecord>, SessionFailure> {
        for session in &mut self.sessions {
            round::configure(session, &plan.modem).await?;
        }
        for session in &mut self.sessions {
            round::arm_noise_threshold(session, &plan.modem).await?;
        }
        for session in &mut self.sessions {
            round::wait_sync_event(session, plan).await?;
        }

        let (active, passives) = self.sessions.split_at_mut(1);
        let active = &mut active[0];
        for session in passives.iter_mut() {
            round::arm_receive(session, plan).await?;
        }
        round::transmit_signal(active, plan).await?;
        round::arm_receive(active, plan).await?;
        for session in passives.iter_mut() {
            round::wait_data(session, plan).await?;
        }
        round::wait_data(active, plan).await?;

        let mut records = Vec::with_capacity(self.sessions.len());
        for session in &mut self.sessions {
            round::collect_usbl(session, plan).await?;
            records.push(round::fetch_systime(session, plan).await?);
        }
        Ok(records)
    }
}

enum RoundError {
    Failed(Vec<SessionFailure>),
    Lost(OrchestratorError),
}
