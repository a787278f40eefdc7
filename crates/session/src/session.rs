//! Session - state of one connected modem
//!
//! Every operation takes `&mut self`, so a session never has two commands
//! in flight.

use std::time::Duration;

use contracts::{
    Command, Connector, ModemConfig, ReplyKind, ReportKind, Reply, Role, SessionId, SinkDescriptor,
    TimeSample, Transport, UsblConfig, MAX_USBL_HEADS,
};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SessionError};
use crate::sink::SinkManager;
use crate::stream;

/// Default number of USBL heads.
pub const DEFAULT_USBL_HEADS: u8 = 4;

pub struct Session<T: Transport> {
    id: SessionId,
    address: String,
    role: Role,
    timeout: Duration,
    usbl_heads: u8,
    transport: T,
    pub(crate) sinks: SinkManager,
    pub(crate) last_reply: Option<Reply>,
    pub(crate) last_time: Option<TimeSample>,
}

impl<T: Transport> Session<T> {
    /// Connect to a device and discard whatever it had queued.
    #[instrument(name = "session_connect", skip(connector, timeout), fields(session = %name, host = %host, port))]
    pub async fn connect<C>(
        connector: &C,
        name: &str,
        host: &str,
        port: u16,
        role: Role,
        timeout: Duration,
    ) -> Result<Self>
    where
        C: Connector<Link = T>,
    {
        let transport = connector.connect(host, port).await?;
        let mut session = Self::from_transport(name, transport, role, timeout);
        session.address = format!("{}:{}", host, port);
        let dropped = session.transport.flush().await?;
        if dropped > 0 {
            debug!(session = %session.id, dropped, "stale events flushed");
        }
        info!(session = %session.id, address = %session.address, role = %role, "session connected");
        Ok(session)
    }

    /// Wrap an already established transport.
    pub fn from_transport(name: &str, transport: T, role: Role, timeout: Duration) -> Self {
        let id = SessionId::new(name);
        Self {
            address: transport.peer().to_string(),
            sinks: SinkManager::new(id.clone()),
            id,
            role,
            timeout,
            usbl_heads: DEFAULT_USBL_HEADS,
            transport,
            last_reply: None,
            last_time: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn usbl_heads(&self) -> u8 {
        self.usbl_heads
    }

    pub fn set_usbl_heads(&mut self, heads: u8) -> Result<()> {
        if heads == 0 || heads > MAX_USBL_HEADS {
            return Err(SessionError::invalid_state(
                &self.id,
                format!("usbl head count {} outside 1..={}", heads, MAX_USBL_HEADS),
            ));
        }
        self.usbl_heads = heads;
        Ok(())
    }

    /// Last reply that satisfied an expectation.
    pub fn last_reply(&self) -> Option<&Reply> {
        self.last_reply.as_ref()
    }

    /// Counters from the last SYSTIME reply.
    pub fn last_time(&self) -> Option<TimeSample> {
        self.last_time
    }

    pub fn sink(&self) -> &SinkDescriptor {
        self.sinks.descriptor()
    }

    pub fn is_receiving(&self) -> bool {
        self.sinks.is_receiving()
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Validate and send one command. Stream commands arm the current sink first.
    #[instrument(name = "session_send", skip(self, command), fields(session = %self.id, kind = %command.kind()))]
    pub async fn send(&mut self, command: Command) -> Result<()> {
        command.validate()?;
        match &command {
            Command::Rx { samples } | Command::UsblRx { samples, .. } => {
                self.sinks.begin_receive(*samples)?;
            }
            _ => {}
        }
        debug!(session = %self.id, command = %command, "sending");
        if let Err(e) = self.transport.send(&command).await {
            if command.starts_stream() {
                self.sinks.finish_receive()?;
            }
            return Err(e.into());
        }
        counter!("sdm_sync_commands_total", "kind" => command.kind().as_str()).increment(1);
        Ok(())
    }

    /// Capture the next stream in memory.
    pub fn add_sink_membuf(&mut self) -> Result<()> {
        self.sinks.set_membuf()
    }

    /// Capture the next stream in a file; `%d`/`{ch}` makes a per-channel template.
    pub fn add_sink(&mut self, path: &str) -> Result<()> {
        self.sinks.set_path(path)
    }

    /// Samples captured by the last receive into the memory buffer.
    pub fn get_membuf(&mut self) -> Result<Vec<i16>> {
        self.sinks.take_membuf()
    }

    pub async fn send_config(&mut self, config: &ModemConfig) -> Result<()> {
        self.send(Command::Config(*config)).await?;
        self.expect(ReplyKind::Report, Some(ReportKind::Config)).await?;
        Ok(())
    }

    pub async fn send_usbl_config(&mut self, config: &UsblConfig) -> Result<()> {
        self.send(Command::UsblConfig(*config)).await?;
        self.expect(ReplyKind::Report, Some(ReportKind::UsblConfig))
            .await?;
        Ok(())
    }

    /// Upload the reference waveform.
    pub async fn send_ref(&mut self, samples: Vec<i16>) -> Result<()> {
        self.send(Command::Ref(samples)).await?;
        self.expect(ReplyKind::Report, Some(ReportKind::Ref)).await?;
        Ok(())
    }

    #[instrument(name = "session_send_ref_file", skip(self), fields(session = %self.id))]
    pub async fn send_ref_file(&mut self, path: &str) -> Result<()> {
        let samples = stream::load_samples(path)?;
        info!(session = %self.id, samples = samples.len(), "uploading reference");
        self.send_ref(samples).await
    }

    /// Transmit a waveform and wait until the device reports the end of transmission.
    pub async fn send_signal(&mut self, samples: Vec<i16>) -> Result<()> {
        self.send(Command::Tx(samples)).await?;
        self.expect(ReplyKind::Report, Some(ReportKind::TxStop))
            .await?;
        Ok(())
    }

    /// Transmit a signal file, prefixed by the reference file when given.
    #[instrument(name = "session_send_signal_file", skip(self), fields(session = %self.id))]
    pub async fn send_signal_file(&mut self, path: &str, reference: Option<&str>) -> Result<()> {
        let samples = stream::load_concatenated(reference.into_iter().chain(Some(path)))?;
        info!(session = %self.id, samples = samples.len(), "transmitting signal");
        self.send_signal(samples).await
    }

    /// Arm a receive; complete it with `wait_data_receive`.
    pub async fn send_rx(&mut self, samples: u32) -> Result<()> {
        self.send(Command::Rx { samples }).await
    }

    /// Request one USBL channel; complete it with `expect(STOP)`.
    pub async fn send_usbl_rx(&mut self, channel: u8, samples: u32) -> Result<()> {
        self.send(Command::UsblRx { channel, samples }).await
    }

    /// Abort the current device operation and wait for its STOP.
    pub async fn send_stop(&mut self) -> Result<()> {
        if self.sinks.is_receiving() {
            let received = self.sinks.finish_receive()?;
            debug!(session = %self.id, received, "receive cut short by stop");
        }
        self.send(Command::Stop).await?;
        self.expect(ReplyKind::Stop, None).await?;
        Ok(())
    }

    /// Best-effort STOP used on failure paths; errors are only logged.
    pub async fn abort(&mut self) {
        if let Err(e) = self.send_stop().await {
            warn!(session = %self.id, error = %e, "stop after failure did not complete");
        }
    }

    /// Block until the external sync pulse is reported. Not bounded by the timeout.
    #[instrument(name = "session_wait_syncin", skip(self), fields(session = %self.id))]
    pub async fn wait_syncin(&mut self) -> Result<()> {
        self.expect_unbounded(ReplyKind::SyncIn, None).await?;
        Ok(())
    }
}
