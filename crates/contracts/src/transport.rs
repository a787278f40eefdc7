//! Transport traits - connection to one modem
//!
//! The wire encoding lives behind these traits. Implementations exist for
//! the simulator and the scripted test transport in the `session` crate.

use std::future::Future;

use crate::{Command, ContractError, Reply};

/// One event decoded from the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Reply(Reply),
    /// A chunk of streamed samples belonging to the current receive
    Samples(Vec<i16>),
}

/// Ordered, reliable command/reply link to a single device.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Peer address (for logs and errors)
    fn peer(&self) -> &str;

    /// Send one command
    async fn send(&mut self, command: &Command) -> Result<(), ContractError>;

    /// Wait for the next inbound event
    ///
    /// # Errors
    /// `ConnectionClosed` when the peer is gone; never returns `Ok` spuriously.
    async fn recv(&mut self) -> Result<Inbound, ContractError>;

    /// Discard any backlog already received, returning how many events were dropped
    async fn flush(&mut self) -> Result<usize, ContractError>;
}

/// Opens transports.
pub trait Connector: Send + Sync {
    type Link: Transport + 'static;

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Link, ContractError>> + Send;
}
