//! Per-session steps of a synchronization round

use contracts::{ModemSettings, Role, TelemetryRecord, TimeSample, Transport};
use observability::ScenarioLogger;
use recorder::RoundLayout;
use session::Session;

use crate::error::SessionFailure;
use crate::phase::{InPhase, RoundPhase};

/// Everything a session needs to run its part of one round.
#[derive(Debug, Clone)]
pub(crate) struct RoundPlan {
    pub round: u32,
    pub modem: ModemSettings,
    pub signal_file: String,
    pub reference_file: Option<String>,
    pub layout: RoundLayout,
    pub logger: ScenarioLogger,
}

pub(crate) async fn configure<T: Transport>(
    session: &mut Session<T>,
    modem: &ModemSettings,
) -> Result<(), SessionFailure> {
    let id = session.id().clone();
    session
        .send_config(&modem.config)
        .await
        .in_phase(&id, RoundPhase::Configure)?;
    session
        .send_usbl_config(&modem.usbl)
        .await
        .in_phase(&id, RoundPhase::Configure)
}

/// Listen to noise: detection threshold 0.
pub(crate) async fn arm_noise_threshold<T: Transport>(
    session: &mut Session<T>,
    modem: &ModemSettings,
) -> Result<(), SessionFailure> {
    let id = session.id().clone();
    session
        .send_config(&modem.config.with_threshold(0))
        .await
        .in_phase(&id, RoundPhase::ArmNoiseThreshold)?;
    session
        .send_usbl_config(&modem.usbl)
        .await
        .in_phase(&id, RoundPhase::ArmNoiseThreshold)
}

pub(crate) async fn wait_sync_event<T: Transport>(
    session: &mut Session<T>,
    plan: &RoundPlan,
) -> Result<(), SessionFailure> {
    let id = session.id().clone();
    plan.logger
        .note(format_args!("{}: round {} waiting for sync pulse", id, plan.round));
    session
        .wait_syncin()
        .await
        .in_phase(&id, RoundPhase::WaitSyncEvent)?;
    plan.logger.note(format_args!("{}: sync pulse received", id));
    Ok(())
}

pub(crate) async fn transmit_signal<T: Transport>(
    session: &mut Session<T>,
    plan: &RoundPlan,
) -> Result<(), SessionFailure> {
    let id = session.id().clone();
    plan.logger.note(format_args!("{}: transmitting signal", id));
    session
        .send_signal_file(&plan.signal_file, plan.reference_file.as_deref())
        .await
        .in_phase(&id, RoundPhase::TransmitSignal)
}

/// Capture the next receive into `rcv-<name>.raw`.
pub(crate) async fn arm_receive<T: Transport>(
    session: &mut Session<T>,
    plan: &RoundPlan,
) -> Result<(), SessionFailure> {
    let id = session.id().clone();
    let path = plan.layout.receive_path(&id);
    plan.logger
        .note(format_args!("{}: arming receive into {}", id, path.display()));
    session
        .add_sink(&path.to_string_lossy())
        .in_phase(&id, RoundPhase::ArmReceive)?;
    session
        .send_rx(plan.modem.samples)
        .await
        .in_phase(&id, RoundPhase::ArmReceive)
}

pub(crate) async fn wait_data<T: Transport>(
    session: &mut Session<T>,
    plan: &RoundPlan,
) -> Result<TimeSample, SessionFailure> {
    let id = session.id().clone();
    plan.logger.note(format_args!("{}: waiting for data", id));
    session
        .wait_data_receive()
        .await
        .in_phase(&id, RoundPhase::WaitData)
}

/// One file per head: `u<ch>-<name>.raw`.
pub(crate) async fn collect_usbl<T: Transport>(
    session: &mut Session<T>,
    plan: &RoundPlan,
) -> Result<(), SessionFailure> {
    let id = session.id().clone();
    let pattern = plan.layout.usbl_pattern(&id);
    plan.logger.note(format_args!("{}: collecting usbl data", id));
    session
        .receive_usbl_data(plan.modem.usbl.samples, Some(&pattern))
        .await
        .in_phase(&id, RoundPhase::CollectUsbl)?;
    Ok(())
}

pub(crate) async fn fetch_systime<T: Transport>(
    session: &mut Session<T>,
    plan: &RoundPlan,
) -> Result<TelemetryRecord, SessionFailure> {
    let id = session.id().clone();
    let time = session
        .receive_systime()
        .await
        .in_phase(&id, RoundPhase::FetchSystime)?;
    let record = match session.role() {
        Role::Active => TelemetryRecord::active(id.clone(), time),
        Role::Passive => TelemetryRecord::passive(id.clone(), time),
    };
    plan.logger.note(format_args!("{}: {}", id, record.to_line()));
    Ok(record)
}

/// Run every phase of one round for a single session.
pub(crate) async fn drive<T: Transport>(
    session: &mut Session<T>,
    plan: &RoundPlan,
) -> Result<TelemetryRecord, SessionFailure> {
    configure(session, &plan.modem).await?;
    arm_noise_threshold(session, &plan.modem).await?;
    wait_sync_event(session, plan).await?;
    if session.role() == Role::Active {
        transmit_signal(session, plan).await?;
    }
    arm_receive(session, plan).await?;
    wait_data(session, plan).await?;
    collect_usbl(session, plan).await?;
    fetch_systime(session, plan).await
}

/// Owned variant of [`drive`] for a spawned task; the session comes back with the result.
pub(crate) async fn drive_owned<T: Transport>(
    mut session: Session<T>,
    plan: RoundPlan,
) -> (Session<T>, Result<TelemetryRecord, SessionFailure>) {
    let result = drive(&mut session, &plan).await;
    if result.is_err() {
        session.abort().await;
    }
    (session, result)
}
