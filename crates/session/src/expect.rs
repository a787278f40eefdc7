//! Expect engine - correlates replies with the command that is waiting for them
//!
//! The deadline is computed once per wait, so interleaved samples, residual
//! STOPs and async notifications cannot extend it.

use std::fmt;

use contracts::{ContractError, Inbound, ReplyKind, ReportKind, Reply, Transport};
use metrics::counter;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::error::{Result, SessionError};
use crate::session::Session;

/// What the current wait accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyExpectation {
    pub primary: ReplyKind,
    pub secondary: Option<ReportKind>,
    pub deadline: Option<Instant>,
}

impl ReplyExpectation {
    pub fn new(primary: ReplyKind, secondary: Option<ReportKind>, deadline: Option<Instant>) -> Self {
        Self {
            primary,
            secondary,
            deadline,
        }
    }
}

impl fmt::Display for ReplyExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.secondary {
            Some(report) => write!(f, "{} {}", self.primary, report),
            None => write!(f, "{}", self.primary),
        }
    }
}

/// Outcome of feeding one reply to an expectation.
enum Step {
    Done(Reply),
    Skip,
}

impl<T: Transport> Session<T> {
    /// Wait for `primary` (and `secondary` for REPORT) within the session timeout.
    pub async fn expect(&mut self, primary: ReplyKind, secondary: Option<ReportKind>) -> Result<Reply> {
        let deadline = Instant::now() + self.timeout();
        self.wait_for(ReplyExpectation::new(primary, secondary, Some(deadline)))
            .await
    }

    /// Wait without a deadline. Used for externally triggered events.
    pub async fn expect_unbounded(
        &mut self,
        primary: ReplyKind,
        secondary: Option<ReportKind>,
    ) -> Result<Reply> {
        self.wait_for(ReplyExpectation::new(primary, secondary, None))
            .await
    }

    #[instrument(name = "session_expect", skip(self), fields(session = %self.id(), expected = %expectation))]
    pub async fn wait_for(&mut self, expectation: ReplyExpectation) -> Result<Reply> {
        loop {
            let received = match expectation.deadline {
                Some(deadline) => match timeout_at(deadline, self.transport_mut().recv()).await {
                    Ok(received) => received,
                    Err(_) => {
                        counter!("sdm_sync_expect_timeouts_total", "session" => self.id().to_string())
                            .increment(1);
                        return Err(SessionError::Timeout {
                            session: self.id().clone(),
                            expected: expectation.to_string(),
                            waited_ms: self.timeout().as_millis() as u64,
                        });
                    }
                },
                None => self.transport_mut().recv().await,
            };

            let event = match received {
                Ok(event) => event,
                Err(ContractError::ConnectionClosed { .. }) => {
                    return Err(SessionError::ConnectionClosed {
                        session: self.id().clone(),
                    })
                }
                Err(e) => return Err(e.into()),
            };

            match event {
                Inbound::Samples(chunk) => {
                    self.sinks.push(&chunk)?;
                }
                Inbound::Reply(reply) => {
                    counter!("sdm_sync_replies_total", "kind" => reply.kind().as_str()).increment(1);
                    if let Step::Done(reply) = self.handle_reply(&expectation, reply)? {
                        self.last_reply = Some(reply);
                        if let Reply::Systime(time) = reply {
                            self.last_time = Some(time);
                        }
                        return Ok(reply);
                    }
                }
            }
        }
    }

    /// Route streamed data to the sink until `deadline`, expecting nothing.
    ///
    /// Returns the number of samples taken. The stream keeps running on the
    /// device; the caller stops it.
    #[instrument(name = "session_receive_until", skip(self), fields(session = %self.id()))]
    pub async fn receive_until(&mut self, deadline: Instant) -> Result<usize> {
        let mut received = 0;
        loop {
            let event = match timeout_at(deadline, self.transport_mut().recv()).await {
                Err(_) => return Ok(received),
                Ok(Ok(event)) => event,
                Ok(Err(ContractError::ConnectionClosed { .. })) => {
                    return Err(SessionError::ConnectionClosed {
                        session: self.id().clone(),
                    })
                }
                Ok(Err(e)) => return Err(e.into()),
            };
            match event {
                Inbound::Samples(chunk) => {
                    received += chunk.len();
                    self.sinks.push(&chunk)?;
                }
                Inbound::Reply(Reply::Busy { param }) => {
                    return Err(SessionError::DeviceBusy {
                        session: self.id().clone(),
                        param,
                    })
                }
                Inbound::Reply(Reply::Report {
                    kind: ReportKind::Drop,
                    value,
                }) => {
                    warn!(session = %self.id(), dropped = value, "device reported dropped samples");
                }
                Inbound::Reply(reply) => {
                    debug!(session = %self.id(), reply = %reply, "reply while streaming skipped");
                }
            }
        }
    }

    fn handle_reply(&mut self, expectation: &ReplyExpectation, reply: Reply) -> Result<Step> {
        let wanted = expectation.primary == reply.kind();
        match reply {
            Reply::Stop if wanted => {
                if self.sinks.is_residual_stop() {
                    debug!(session = %self.id(), "residual STOP before stream data skipped");
                    return Ok(Step::Skip);
                }
                let samples = self.sinks.finish_receive()?;
                debug!(session = %self.id(), samples, "stream stopped");
                Ok(Step::Done(reply))
            }
            Reply::Stop => {
                debug!(session = %self.id(), expected = %expectation, "residual STOP skipped");
                Ok(Step::Skip)
            }
            Reply::Rx | Reply::UsblRx | Reply::SyncIn | Reply::JanusDetected if wanted => {
                Ok(Step::Done(reply))
            }
            Reply::Rx | Reply::UsblRx => {
                debug!(session = %self.id(), reply = %reply, "stream started");
                Ok(Step::Skip)
            }
            Reply::SyncIn | Reply::JanusDetected => {
                debug!(session = %self.id(), reply = %reply, "async notification skipped");
                Ok(Step::Skip)
            }
            Reply::Busy { param } => Err(SessionError::DeviceBusy {
                session: self.id().clone(),
                param,
            }),
            Reply::Report { kind, value } => self.handle_report(expectation, reply, kind, value),
            Reply::Systime(_) if wanted => Ok(Step::Done(reply)),
            Reply::Systime(_) => Err(SessionError::mismatch(
                self.id(),
                expectation.to_string(),
                reply.to_string(),
            )),
        }
    }

    fn handle_report(
        &mut self,
        expectation: &ReplyExpectation,
        reply: Reply,
        kind: ReportKind,
        value: u32,
    ) -> Result<Step> {
        let wanted = expectation.primary == ReplyKind::Report
            && expectation.secondary.is_none_or(|s| s == kind);
        if wanted {
            if kind.is_acknowledgement() && value == 0 {
                return Err(SessionError::CommandRejected {
                    session: self.id().clone(),
                    report: kind,
                });
            }
            return Ok(Step::Done(reply));
        }
        if expectation.primary == ReplyKind::Report {
            return Err(SessionError::mismatch(
                self.id(),
                expectation.to_string(),
                reply.to_string(),
            ));
        }
        // stream notifications only pass while some other kind is awaited
        if kind.ends_stream() {
            debug!(session = %self.id(), report = %kind, "stream end report skipped");
            return Ok(Step::Skip);
        }
        if kind == ReportKind::Drop {
            warn!(session = %self.id(), dropped = value, "device reported dropped samples");
            return Ok(Step::Skip);
        }
        Err(SessionError::mismatch(
            self.id(),
            expectation.to_string(),
            reply.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use contracts::{Command, Role, TimeSample};

    use super::*;
    use crate::mock_transport::ScriptedTransport;

    fn session(transport: ScriptedTransport, timeout_ms: u64) -> Session<ScriptedTransport> {
        Session::from_transport(
            "node",
            transport,
            Role::Passive,
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_within_bound() {
        let (transport, _handle) = ScriptedTransport::new("10.0.0.1:4200");
        let mut s = session(transport, 50);

        let start = Instant::now();
        let err = s.expect(ReplyKind::Stop, None).await.unwrap_err();
        let waited = start.elapsed();

        assert!(err.is_timeout());
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_not_extended_by_noise() {
        let (transport, handle) = ScriptedTransport::new("peer");
        let mut s = session(transport, 100);
        tokio::spawn(async move {
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(30)).await;
                handle.push_reply(Reply::JanusDetected);
            }
        });

        let start = Instant::now();
        let err = s.expect(ReplyKind::Stop, None).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_millis(110));
    }

    #[tokio::test]
    async fn test_report_subkind_mismatch() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_replies([Reply::ack(ReportKind::Ref)]);
        let mut s = session(transport, 1000);

        let err = s
            .expect(ReplyKind::Report, Some(ReportKind::Config))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ProtocolMismatch { .. }));
    }

    #[tokio::test]
    async fn test_rejected_acknowledgement() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_replies([Reply::Report {
            kind: ReportKind::Config,
            value: 0,
        }]);
        let mut s = session(transport, 1000);

        let err = s
            .expect(ReplyKind::Report, Some(ReportKind::Config))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::CommandRejected {
                report: ReportKind::Config,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_busy_is_error() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_replies([Reply::Busy { param: 3 }]);
        let mut s = session(transport, 1000);

        let err = s.expect(ReplyKind::Stop, None).await.unwrap_err();
        assert!(matches!(err, SessionError::DeviceBusy { param: 3, .. }));
    }

    #[tokio::test]
    async fn test_unexpected_kind_is_mismatch() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_replies([Reply::Systime(TimeSample::default())]);
        let mut s = session(transport, 1000);

        let err = s.expect(ReplyKind::Stop, None).await.unwrap_err();
        assert!(matches!(err, SessionError::ProtocolMismatch { .. }));
    }

    #[tokio::test]
    async fn test_residual_stop_and_async_skipped() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_replies([
            Reply::Stop,
            Reply::SyncIn,
            Reply::ack(ReportKind::Config),
        ]);
        let mut s = session(transport, 1000);

        let reply = s
            .expect(ReplyKind::Report, Some(ReportKind::Config))
            .await
            .unwrap();
        assert_eq!(reply.report_kind(), Some(ReportKind::Config));
        assert_eq!(s.last_reply(), Some(&reply));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_report_fails_report_wait_immediately() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_replies([Reply::Report {
            kind: ReportKind::RxStop,
            value: 0,
        }]);
        let mut s = session(transport, 50);

        let start = Instant::now();
        let err = s
            .expect(ReplyKind::Report, Some(ReportKind::Config))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ProtocolMismatch { .. }));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_stream_reports_skipped_while_waiting_systime() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_replies([
            Reply::Report {
                kind: ReportKind::RxStop,
                value: 0,
            },
            Reply::Report {
                kind: ReportKind::UsblRxStop,
                value: 0,
            },
            Reply::Report {
                kind: ReportKind::Drop,
                value: 12,
            },
            Reply::Systime(TimeSample::new(1, 2, 3, 4)),
        ]);
        let mut s = session(transport, 1000);

        let reply = s.expect(ReplyKind::Systime, None).await.unwrap();
        assert_eq!(reply.kind(), ReplyKind::Systime);
    }

    #[tokio::test]
    async fn test_stop_before_data_is_residual() {
        let (transport, mut handle) = ScriptedTransport::new("peer");
        let transport = transport.with_script([
            Inbound::Reply(Reply::Stop),
            Inbound::Reply(Reply::Rx),
            Inbound::Samples(vec![1, 2, 3]),
            Inbound::Reply(Reply::Stop),
        ]);
        let mut s = session(transport, 1000);

        s.add_sink_membuf().unwrap();
        s.send(Command::Rx { samples: 3 }).await.unwrap();
        s.expect(ReplyKind::Stop, None).await.unwrap();

        assert_eq!(s.get_membuf().unwrap(), vec![1, 2, 3]);
        assert_eq!(handle.sent(), vec![Command::Rx { samples: 3 }]);
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let (transport, handle) = ScriptedTransport::new("peer");
        drop(handle);
        let mut s = session(transport, 1000);

        let err = s.expect(ReplyKind::Stop, None).await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectionClosed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_until_collects_stream() {
        let (transport, _handle) = ScriptedTransport::new("peer");
        let transport = transport.with_script([
            Inbound::Reply(Reply::Rx),
            Inbound::Samples(vec![1; 4]),
            Inbound::Reply(Reply::SyncIn),
            Inbound::Samples(vec![2; 4]),
        ]);
        let mut s = session(transport, 10);
        s.add_sink_membuf().unwrap();
        s.send_rx(0).await.unwrap();

        let deadline = Instant::now() + Duration::from_millis(200);
        let received = s.receive_until(deadline).await.unwrap();
        assert_eq!(received, 8);
        assert!(Instant::now() >= deadline);
        assert!(s.is_receiving());
    }

    #[tokio::test]
    async fn test_wait_syncin_ignores_timeout() {
        let (transport, handle) = ScriptedTransport::new("peer");
        let mut s = session(transport, 10);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.push_reply(Reply::SyncIn);
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        s.wait_syncin().await.unwrap();
        assert_eq!(s.last_reply(), Some(&Reply::SyncIn));
    }
}
