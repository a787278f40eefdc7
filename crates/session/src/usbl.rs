//! USBL multi-channel receive cycle

use contracts::{Command, ReplyKind, SinkDescriptor, Transport};
use tracing::{debug, instrument};

use crate::error::{Result, SessionError};
use crate::session::Session;

impl<T: Transport> Session<T> {
    /// Fetch `samples` samples from every USBL head, one channel at a time.
    ///
    /// Without a pattern each element holds that channel's samples. With a
    /// pattern such as `dir/u%d-node.raw` the data goes to one file per
    /// channel and the elements are empty. Any failure aborts the cycle.
    #[instrument(
        name = "session_receive_usbl_data",
        skip(self),
        fields(session = %self.id(), heads = self.usbl_heads())
    )]
    pub async fn receive_usbl_data(
        &mut self,
        samples: u32,
        pattern: Option<&str>,
    ) -> Result<Vec<Vec<i16>>> {
        let template = match pattern.map(SinkDescriptor::parse) {
            Some(SinkDescriptor::File(path)) => {
                return Err(SessionError::invalid_state(
                    self.id(),
                    format!(
                        "usbl pattern '{}' has no channel placeholder",
                        path.display()
                    ),
                ))
            }
            other => other,
        };

        let heads = self.usbl_heads();
        let mut channels = Vec::with_capacity(heads as usize);
        for channel in 0..heads {
            match &template {
                Some(template) => self.sinks.set_descriptor(template.for_channel(channel))?,
                None => self.add_sink_membuf()?,
            }
            self.send(Command::UsblRx { channel, samples }).await?;
            self.expect(ReplyKind::Stop, None).await?;

            let data = match &template {
                Some(_) => Vec::new(),
                None => self.get_membuf()?,
            };
            debug!(session = %self.id(), channel, samples = data.len(), "usbl channel received");
            channels.push(data);
        }
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use contracts::{Inbound, Reply, Role};

    use super::*;
    use crate::mock_transport::{ScriptHandle, ScriptedTransport};

    fn usbl_session(heads: u8) -> (Session<ScriptedTransport>, ScriptHandle) {
        let (transport, handle) = ScriptedTransport::new("peer");
        let transport = transport.with_responder(|command| match command {
            Command::UsblRx { channel, samples } => vec![
                Inbound::Reply(Reply::UsblRx),
                Inbound::Samples(vec![*channel as i16; *samples as usize]),
                Inbound::Reply(Reply::Stop),
            ],
            _ => vec![],
        });
        let mut session =
            Session::from_transport("node", transport, Role::Passive, Duration::from_secs(1));
        session.set_usbl_heads(heads).unwrap();
        (session, handle)
    }

    #[tokio::test]
    async fn test_membuf_cycle_returns_every_head() {
        let (mut s, mut handle) = usbl_session(5);
        let channels = s.receive_usbl_data(16, None).await.unwrap();

        assert_eq!(channels.len(), 5);
        for (i, data) in channels.iter().enumerate() {
            assert_eq!(data.len(), 16);
            assert!(data.iter().all(|&v| v == i as i16));
        }
        let sent = handle.sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[4], Command::UsblRx { channel: 4, samples: 16 });
    }

    #[tokio::test]
    async fn test_pattern_cycle_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("u%d-node.raw");
        let (mut s, _handle) = usbl_session(4);

        let channels = s
            .receive_usbl_data(8, Some(pattern.to_str().unwrap()))
            .await
            .unwrap();

        assert_eq!(channels.len(), 4);
        assert!(channels.iter().all(Vec::is_empty));
        for ch in 0..4 {
            let file = dir.path().join(format!("u{}-node.raw", ch));
            assert_eq!(std::fs::metadata(file).unwrap().len(), 16);
        }
    }

    #[tokio::test]
    async fn test_channel_failure_aborts_cycle() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_responder(|command| match command {
            Command::UsblRx { channel: 0, .. } => vec![
                Inbound::Samples(vec![1; 4]),
                Inbound::Reply(Reply::Stop),
            ],
            Command::UsblRx { .. } => vec![Inbound::Reply(Reply::Busy { param: 0 })],
            _ => vec![],
        });
        let mut s = Session::from_transport("node", transport, Role::Passive, Duration::from_secs(1));

        let err = s.receive_usbl_data(4, None).await.unwrap_err();
        assert!(matches!(err, SessionError::DeviceBusy { .. }));
    }

    #[tokio::test]
    async fn test_pattern_without_placeholder_rejected() {
        let (mut s, _handle) = usbl_session(4);
        let err = s.receive_usbl_data(8, Some("plain.raw")).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }
}
