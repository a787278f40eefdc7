//! SinkManager - routes streamed samples of one session
//!
//! Exactly one sink is active. File sinks are one-shot: they are closed
//! when the stream they captured ends, and the session falls back to the
//! memory buffer.

use contracts::{SessionId, SinkDescriptor};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::stream::SampleWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiveState {
    Idle,
    Pending { requested: u32, received: usize },
    /// A stream into the memory buffer has ended
    Completed,
}

pub struct SinkManager {
    session: SessionId,
    descriptor: SinkDescriptor,
    writer: Option<SampleWriter>,
    membuf: Vec<i16>,
    state: ReceiveState,
}

impl SinkManager {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            descriptor: SinkDescriptor::MemoryBuffer,
            writer: None,
            membuf: Vec::new(),
            state: ReceiveState::Idle,
        }
    }

    pub fn descriptor(&self) -> &SinkDescriptor {
        &self.descriptor
    }

    /// Whether a stream-producing command is awaiting its STOP.
    pub fn is_receiving(&self) -> bool {
        matches!(self.state, ReceiveState::Pending { .. })
    }

    fn ensure_idle(&self, action: &str) -> Result<()> {
        if self.is_receiving() {
            return Err(SessionError::invalid_state(
                &self.session,
                format!("cannot {} while a receive is in progress", action),
            ));
        }
        Ok(())
    }

    /// Route the next stream into memory, discarding any previous buffer.
    pub fn set_membuf(&mut self) -> Result<()> {
        self.ensure_idle("change sink")?;
        self.close_writer()?;
        self.descriptor = SinkDescriptor::MemoryBuffer;
        self.membuf.clear();
        self.state = ReceiveState::Idle;
        Ok(())
    }

    /// Route the next stream into a file or, for templates, a per-channel file.
    pub fn set_path(&mut self, path: &str) -> Result<()> {
        self.set_descriptor(SinkDescriptor::parse(path))
    }

    /// Expand the current template for one channel.
    pub fn select_channel(&mut self, channel: u8) -> Result<()> {
        let expanded = self.descriptor.for_channel(channel);
        self.set_descriptor(expanded)
    }

    /// Install a descriptor, opening its file if it names one.
    pub fn set_descriptor(&mut self, descriptor: SinkDescriptor) -> Result<()> {
        self.ensure_idle("change sink")?;
        self.close_writer()?;
        if let SinkDescriptor::File(path) = &descriptor {
            let location = path.to_string_lossy();
            self.writer = Some(SampleWriter::create(&location)?);
        }
        debug!(session = %self.session, sink = %descriptor, "sink selected");
        self.descriptor = descriptor;
        self.state = ReceiveState::Idle;
        Ok(())
    }

    /// Called when a stream-producing command is issued.
    pub fn begin_receive(&mut self, requested: u32) -> Result<()> {
        self.ensure_idle("start another receive")?;
        if let SinkDescriptor::ChannelFileTemplate(pattern) = &self.descriptor {
            return Err(SessionError::invalid_state(
                &self.session,
                format!("sink template '{}' was not expanded for a channel", pattern),
            ));
        }
        self.state = ReceiveState::Pending {
            requested,
            received: 0,
        };
        Ok(())
    }

    /// Route a sample chunk. Returns false when no receive is pending.
    pub fn push(&mut self, samples: &[i16]) -> Result<bool> {
        let ReceiveState::Pending { received, .. } = &mut self.state else {
            warn!(
                session = %self.session,
                samples = samples.len(),
                "samples without a pending receive dropped"
            );
            return Ok(false);
        };
        *received += samples.len();
        match self.writer.as_mut() {
            Some(writer) => writer.write(samples)?,
            None => self.membuf.extend_from_slice(samples),
        }
        Ok(true)
    }

    /// A STOP that arrives before any data of a sized receive belongs to an earlier command.
    pub fn is_residual_stop(&self) -> bool {
        matches!(
            self.state,
            ReceiveState::Pending { requested, received: 0 } if requested > 0
        )
    }

    /// Close the current stream. Returns the number of samples it carried.
    pub fn finish_receive(&mut self) -> Result<usize> {
        let ReceiveState::Pending { received, .. } = self.state else {
            return Ok(0);
        };
        if self.writer.is_some() {
            self.close_writer()?;
            self.descriptor = SinkDescriptor::MemoryBuffer;
            self.membuf.clear();
            self.state = ReceiveState::Idle;
        } else {
            self.state = ReceiveState::Completed;
        }
        Ok(received)
    }

    /// Take the memory buffer filled by the last receive.
    pub fn take_membuf(&mut self) -> Result<Vec<i16>> {
        if !self.descriptor.is_memory() {
            return Err(SessionError::invalid_state(
                &self.session,
                format!("current sink is {}, not a memory buffer", self.descriptor),
            ));
        }
        if self.state != ReceiveState::Completed {
            return Err(SessionError::invalid_state(
                &self.session,
                "no completed receive into the memory buffer",
            ));
        }
        self.state = ReceiveState::Idle;
        Ok(std::mem::take(&mut self.membuf))
    }

    fn close_writer(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let path = writer.path().display().to_string();
            let written = writer.finish()?;
            debug!(session = %self.session, path = %path, samples = written, "file sink closed");
        }
        Ok(())
    }
}
