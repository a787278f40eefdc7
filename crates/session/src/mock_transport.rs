//! Scripted transport for unit tests
//!
//! Inbound events come from a pre-queued script, from a responder closure
//! run on every sent command, or from a [`ScriptHandle`] at any time.
//! The transport never closes on its own while the handle is alive, so an
//! empty script produces timeouts rather than errors.

use std::collections::VecDeque;

use contracts::{Command, ContractError, Inbound, Reply, Transport};
use tokio::sync::mpsc;
use tracing::instrument;

type Responder = Box<dyn FnMut(&Command) -> Vec<Inbound> + Send>;

pub struct ScriptedTransport {
    peer: String,
    script: VecDeque<Inbound>,
    responder: Option<Responder>,
    injected: mpsc::UnboundedReceiver<Inbound>,
    sent: mpsc::UnboundedSender<Command>,
}

/// Test-side view of a [`ScriptedTransport`].
pub struct ScriptHandle {
    inject: mpsc::UnboundedSender<Inbound>,
    sent: mpsc::UnboundedReceiver<Command>,
}

impl ScriptedTransport {
    pub fn new(peer: impl Into<String>) -> (Self, ScriptHandle) {
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let transport = Self {
            peer: peer.into(),
            script: VecDeque::new(),
            responder: None,
            injected: inject_rx,
            sent: sent_tx,
        };
        let handle = ScriptHandle {
            inject: inject_tx,
            sent: sent_rx,
        };
        (transport, handle)
    }

    /// Queue events delivered before anything else.
    pub fn with_script(mut self, events: impl IntoIterator<Item = Inbound>) -> Self {
        self.script.extend(events);
        self
    }

    /// Queue replies delivered before anything else.
    pub fn with_replies(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.with_script(replies.into_iter().map(Inbound::Reply))
    }

    /// Produce inbound events in reaction to each sent command.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&Command) -> Vec<Inbound> + Send + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }
}

impl ScriptHandle {
    pub fn push(&self, event: Inbound) {
        let _ = self.inject.send(event);
    }

    pub fn push_reply(&self, reply: Reply) {
        self.push(Inbound::Reply(reply));
    }

    /// Commands sent since the last call.
    pub fn sent(&mut self) -> Vec<Command> {
        let mut out = Vec::new();
        while let Ok(command) = self.sent.try_recv() {
            out.push(command);
        }
        out
    }
}

impl Transport for ScriptedTransport {
    fn peer(&self) -> &str {
        &self.peer
    }

    #[instrument(name = "scripted_send", skip(self, command), fields(peer = %self.peer, kind = %command.kind()))]
    async fn send(&mut self, command: &Command) -> Result<(), ContractError> {
        let _ = self.sent.send(command.clone());
        if let Some(responder) = self.responder.as_mut() {
            self.script.extend(responder(command));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Inbound, ContractError> {
        if let Some(event) = self.script.pop_front() {
            return Ok(event);
        }
        match self.injected.recv().await {
            Some(event) => Ok(event),
            None => Err(ContractError::ConnectionClosed {
                peer: self.peer.clone(),
            }),
        }
    }

    async fn flush(&mut self) -> Result<usize, ContractError> {
        let mut dropped = self.script.len();
        self.script.clear();
        while self.injected.try_recv().is_ok() {
            dropped += 1;
        }
        Ok(dropped)
    }
}
