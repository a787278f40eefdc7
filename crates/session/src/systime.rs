//! Device time retrieval and the post-receive drain

use contracts::{Command, Reply, ReplyKind, TimeSample, Transport};
use tracing::{debug, instrument};

use crate::error::{Result, SessionError};
use crate::session::Session;

impl<T: Transport> Session<T> {
    /// Request the four device counters.
    ///
    /// Older firmware reports only three counters; the transport decodes
    /// those with `syncin = 0`.
    #[instrument(name = "session_receive_systime", skip(self), fields(session = %self.id()))]
    pub async fn receive_systime(&mut self) -> Result<TimeSample> {
        self.send(Command::Systime).await?;
        match self.expect(ReplyKind::Systime, None).await? {
            Reply::Systime(time) => {
                debug!(session = %self.id(), time = %time, "systime received");
                Ok(time)
            }
            other => Err(SessionError::mismatch(
                self.id(),
                ReplyKind::Systime.as_str(),
                other.to_string(),
            )),
        }
    }

    /// Finish a pending receive, then run one SYSTIME round-trip.
    ///
    /// Devices may emit more than one STOP at the end of a receive. The
    /// extra STOPs are queued ahead of the SYSTIME reply and are consumed
    /// by that round-trip, leaving the session clean for the next command.
    #[instrument(name = "session_wait_data_receive", skip(self), fields(session = %self.id()))]
    pub async fn wait_data_receive(&mut self) -> Result<TimeSample> {
        self.expect(ReplyKind::Stop, None).await?;
        self.receive_systime().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use contracts::{Inbound, Role};

    use super::*;
    use crate::mock_transport::ScriptedTransport;

    fn scripted(extra_stops: usize) -> (Session<ScriptedTransport>, crate::mock_transport::ScriptHandle) {
        let (transport, handle) = ScriptedTransport::new("peer");
        let time = TimeSample::new(500, 100, 200, 50);
        let transport = transport.with_responder(move |command| match command {
            Command::Rx { .. } => {
                let mut events = vec![
                    Inbound::Reply(Reply::Rx),
                    Inbound::Samples(vec![4; 8]),
                    Inbound::Reply(Reply::Stop),
                ];
                events.extend((0..extra_stops).map(|_| Inbound::Reply(Reply::Stop)));
                events
            }
            Command::Systime => vec![Inbound::Reply(Reply::Systime(time))],
            _ => vec![],
        });
        let session = Session::from_transport("node", transport, Role::Passive, Duration::from_secs(1));
        (session, handle)
    }

    #[tokio::test]
    async fn test_receive_systime() {
        let (mut s, mut handle) = scripted(0);
        let time = s.receive_systime().await.unwrap();
        assert_eq!(time, TimeSample::new(500, 100, 200, 50));
        assert_eq!(s.last_time(), Some(time));
        assert_eq!(handle.sent(), vec![Command::Systime]);
    }

    #[tokio::test]
    async fn test_wait_data_receive_drains_extra_stops() {
        for extra in 0..=2 {
            let (mut s, _handle) = scripted(extra);
            s.add_sink_membuf().unwrap();
            s.send_rx(8).await.unwrap();

            let time = s.wait_data_receive().await.unwrap();
            assert_eq!(time.rx, 200);
            assert_eq!(s.get_membuf().unwrap().len(), 8);

            // the session is clean: the next round-trip sees its own reply
            let again = s.receive_systime().await.unwrap();
            assert_eq!(again, time);
        }
    }
}
