//! Simulated modem devices on a shared acoustic medium
//!
//! Every device runs a free-running microsecond counter with its own
//! offset. Transmissions propagate between device positions at the
//! configured sound speed, and a periodic pulse stands in for the external
//! sync line. Replies are released at their virtual time, so tests using
//! paused tokio time see the same ordering as a real run.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use contracts::{
    Command, Connector, ContractError, Inbound, Reply, ReportKind, SimulationConfig, TimeSample,
    Transport,
};
use tokio::sync::broadcast;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, instrument, trace};

const CHUNK_SAMPLES: usize = 1024;
const AIR_CAPACITY: usize = 256;
const USBL_DURATION: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
struct DeviceProfile {
    position_m: f64,
    clock_offset: u32,
}

#[derive(Debug, Clone)]
struct Transmission {
    from: String,
    position_m: f64,
    at: Instant,
}

struct Medium {
    epoch: Instant,
    sound_speed_mps: f64,
    reference_samples: u32,
    extra_stops: u8,
    devices: HashMap<String, DeviceProfile>,
    air: broadcast::Sender<Transmission>,
    sync: broadcast::Sender<Instant>,
}

impl Medium {
    fn propagation(&self, from_m: f64, to_m: f64) -> Duration {
        Duration::from_secs_f64((from_m - to_m).abs() / self.sound_speed_mps)
    }
}

/// Shared medium. Cloning is cheap; every clone connects to the same devices.
#[derive(Clone)]
pub struct SimulatedMedium {
    inner: Arc<Medium>,
}

impl SimulatedMedium {
    /// Build the medium and, when `sync_period_ms > 0`, start the sync pulse ticker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &SimulationConfig, reference_samples: u32) -> Self {
        let (air, _) = broadcast::channel(AIR_CAPACITY);
        let (sync, _) = broadcast::channel(AIR_CAPACITY);
        let devices = config
            .devices
            .iter()
            .map(|d| {
                (
                    d.host.clone(),
                    DeviceProfile {
                        position_m: d.position_m,
                        clock_offset: d.clock_offset,
                    },
                )
            })
            .collect();
        let medium = Self {
            inner: Arc::new(Medium {
                epoch: Instant::now(),
                sound_speed_mps: config.sound_speed_mps,
                reference_samples,
                extra_stops: config.extra_stops,
                devices,
                air,
                sync,
            }),
        };
        if config.sync_period_ms > 0 {
            spawn_sync_ticker(
                Arc::downgrade(&medium.inner),
                Duration::from_millis(config.sync_period_ms),
            );
        }
        medium
    }

    /// Emit one sync pulse to every connected device.
    pub fn trigger_sync(&self) {
        let _ = self.inner.sync.send(Instant::now());
    }
}

fn spawn_sync_ticker(medium: Weak<Medium>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(medium) = medium.upgrade() else {
                break;
            };
            let _ = medium.sync.send(Instant::now());
        }
    });
}

impl Connector for SimulatedMedium {
    type Link = SimulatedLink;

    #[instrument(name = "simulator_connect", skip(self), fields(host = %host, port))]
    async fn connect(&self, host: &str, port: u16) -> Result<SimulatedLink, ContractError> {
        let peer = format!("{}:{}", host, port);
        let profile = *self
            .inner
            .devices
            .get(host)
            .ok_or_else(|| ContractError::connection(&peer, "no simulated device at this host"))?;
        debug!(peer = %peer, position_m = profile.position_m, "simulated device attached");
        Ok(SimulatedLink {
            host: host.to_string(),
            peer,
            profile,
            air_rx: self.inner.air.subscribe(),
            sync_rx: self.inner.sync.subscribe(),
            medium: self.inner.clone(),
            outbox: VecDeque::new(),
            last_ready: Instant::now(),
            last_command_at: Instant::now(),
            threshold: 0,
            counters: TimeSample::default(),
            detecting: None,
            streaming: false,
        })
    }
}

/// Sized receive waiting for a transmission to cross the detection threshold.
#[derive(Debug, Clone, Copy)]
struct Detection {
    armed_at: Instant,
    samples: u32,
}

/// Connection to one simulated device.
pub struct SimulatedLink {
    host: String,
    peer: String,
    profile: DeviceProfile,
    medium: Arc<Medium>,
    air_rx: broadcast::Receiver<Transmission>,
    sync_rx: broadcast::Receiver<Instant>,
    outbox: VecDeque<(Instant, Inbound)>,
    last_ready: Instant,
    last_command_at: Instant,
    threshold: u16,
    counters: TimeSample,
    detecting: Option<Detection>,
    /// Unsized receive running until STOP
    streaming: bool,
}

impl SimulatedLink {
    fn local(&self, at: Instant) -> u32 {
        let micros = at.saturating_duration_since(self.medium.epoch).as_micros() as u32;
        micros.wrapping_add(self.profile.clock_offset)
    }

    fn schedule(&mut self, at: Instant, event: Inbound) {
        let ready = at.max(self.last_ready);
        self.last_ready = ready;
        self.outbox.push_back((ready, event));
    }

    fn schedule_reply(&mut self, at: Instant, reply: Reply) {
        self.schedule(at, Inbound::Reply(reply));
    }

    fn schedule_samples(&mut self, at: Instant, count: usize, seed: usize) {
        let samples: Vec<i16> = (0..count)
            .map(|i| (((seed + i) as f64 * 0.05).sin() * 8000.0) as i16)
            .collect();
        for chunk in samples.chunks(CHUNK_SAMPLES) {
            self.schedule(at, Inbound::Samples(chunk.to_vec()));
        }
    }

    /// Emit a full receive starting at `start`: RX, data, STOP and any extra STOPs.
    fn schedule_receive(&mut self, start: Instant, samples: u32) {
        self.schedule_reply(start, Reply::Rx);
        self.schedule_samples(start, samples as usize, 0);
        let end = start + Duration::from_micros(samples as u64);
        self.schedule_reply(end, Reply::Stop);
        for _ in 0..self.medium.extra_stops {
            self.schedule_reply(end, Reply::Stop);
        }
    }

    fn handle(&mut self, command: &Command) {
        let now = Instant::now();
        self.last_command_at = now;
        match command {
            Command::Stop => {
                self.detecting = None;
                self.streaming = false;
                self.schedule_reply(now, Reply::Stop);
            }
            Command::Systime => {
                let time = TimeSample {
                    current: self.local(now),
                    ..self.counters
                };
                self.schedule_reply(now, Reply::Systime(time));
            }
            Command::Config(config) => {
                self.threshold = config.threshold;
                self.schedule_reply(now, Reply::ack(ReportKind::Config));
            }
            Command::UsblConfig(_) => {
                self.schedule_reply(now, Reply::ack(ReportKind::UsblConfig));
            }
            Command::Ref(_) => {
                self.schedule_reply(now, Reply::ack(ReportKind::Ref));
            }
            Command::Tx(samples) => {
                self.counters.tx = self.local(now);
                let _ = self.medium.air.send(Transmission {
                    from: self.host.clone(),
                    position_m: self.profile.position_m,
                    at: now,
                });
                let end = now + Duration::from_micros(samples.len() as u64);
                self.schedule_reply(
                    end,
                    Reply::Report {
                        kind: ReportKind::TxStop,
                        value: samples.len() as u32,
                    },
                );
            }
            Command::Rx { samples: 0 } => {
                self.streaming = true;
                self.counters.rx = self.local(now);
                self.schedule_reply(now, Reply::Rx);
                self.schedule_samples(now, CHUNK_SAMPLES, 0);
            }
            Command::Rx { samples } if self.threshold == 0 => {
                self.counters.rx = self.local(now);
                self.schedule_receive(now, *samples);
            }
            Command::Rx { samples } => {
                self.detecting = Some(Detection {
                    armed_at: now,
                    samples: *samples,
                });
            }
            Command::UsblRx { channel, samples } => {
                self.schedule_reply(now, Reply::UsblRx);
                self.schedule_samples(now, *samples as usize, *channel as usize * 97);
                self.schedule_reply(now + USBL_DURATION, Reply::Stop);
            }
        }
    }

    fn hear(&mut self, transmission: Transmission) {
        let Some(detection) = self.detecting else {
            return;
        };
        if transmission.from == self.host {
            return;
        }
        let arrival = transmission.at
            + self
                .medium
                .propagation(transmission.position_m, self.profile.position_m);
        if arrival < detection.armed_at {
            return;
        }
        self.detecting = None;
        self.counters.rx = self
            .local(arrival)
            .wrapping_add(self.medium.reference_samples);
        trace!(peer = %self.peer, from = %transmission.from, rx = self.counters.rx, "signal detected");
        let start = arrival + Duration::from_micros(self.medium.reference_samples as u64);
        self.schedule_receive(start, detection.samples);
    }

    fn pulse(&mut self, at: Instant) {
        if at < self.last_command_at {
            return;
        }
        self.counters.syncin = self.local(at);
        self.schedule_reply(at, Reply::SyncIn);
    }
}

impl Transport for SimulatedLink {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, command: &Command) -> Result<(), ContractError> {
        trace!(peer = %self.peer, command = %command, "simulated command");
        self.handle(command);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Inbound, ContractError> {
        loop {
            if let Some((ready, _)) = self.outbox.front() {
                sleep_until(*ready).await;
                if let Some((_, event)) = self.outbox.pop_front() {
                    return Ok(event);
                }
            }
            tokio::select! {
                heard = self.air_rx.recv() => match heard {
                    Ok(transmission) => self.hear(transmission),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ContractError::ConnectionClosed { peer: self.peer.clone() })
                    }
                },
                pulse = self.sync_rx.recv() => match pulse {
                    Ok(at) => self.pulse(at),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ContractError::ConnectionClosed { peer: self.peer.clone() })
                    }
                },
            }
        }
    }

    async fn flush(&mut self) -> Result<usize, ContractError> {
        let dropped = self.outbox.len();
        self.outbox.clear();
        while self.air_rx.try_recv().is_ok() {}
        while self.sync_rx.try_recv().is_ok() {}
        self.last_command_at = Instant::now();
        Ok(dropped)
    }
}
