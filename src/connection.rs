//! Connection task owning the socket, the device state and all timers.
//!
//! Requests from [`RotelClient`](crate::RotelClient) handles, socket reads,
//! the poll timer and the reconnect timer are all serviced by one task, so
//! frames are processed and events published strictly in arrival order.

use crate::command::{self, Command, Query};
use crate::config::ClientConfig;
use crate::protocol::ReceiveBuffer;
use crate::subscription::DeviceEvent;
use crate::types::{ConnectionPhase, DeviceState, Dialect, Volume};
use std::future::{pending, Future};
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

const READ_CHUNK_SIZE: usize = 1024;

/// Request sent from client handles to the connection task
pub(crate) enum Request {
    Connect { host: String, port: u16 },
    Disconnect,
    SetVolume(f64),
    SetMute(bool),
    SetSource(String),
    Standby,
    State(oneshot::Sender<DeviceState>),
}

type PendingConnect = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

enum Transport {
    /// TCP connect in flight
    Opening(PendingConnect),
    Open(TcpStream),
}

enum IoEvent {
    Opened(io::Result<TcpStream>),
    Read(io::Result<usize>),
}

/// State belonging to a single connection attempt
struct Session {
    state: DeviceState,
    buffer: ReceiveBuffer,
    /// Connection start or last received byte, whichever is later
    last_data: Instant,
}

impl Session {
    fn new(dialect: Dialect) -> Self {
        Self {
            state: DeviceState::new(dialect),
            buffer: ReceiveBuffer::new(),
            last_data: Instant::now(),
        }
    }
}

struct PendingReconnect {
    timer: Pin<Box<Sleep>>,
    /// Switch dialect before reconnecting
    fallback: bool,
}

/// Connection manager for one device
pub(crate) struct Connection {
    config: ClientConfig,
    requests: mpsc::UnboundedReceiver<Request>,
    events: broadcast::Sender<DeviceEvent>,
    host: String,
    port: u16,
    /// Dialect used for the next connection attempt
    dialect: Dialect,
    /// Set by `disconnect`, never cleared
    abandoned: bool,
    session: Session,
    transport: Option<Transport>,
    poll: Option<Interval>,
    reconnect: Option<PendingReconnect>,
    read_buf: Box<[u8]>,
}

impl Connection {
    /// Spawn the connection task
    ///
    /// The task ends once every request sender has been dropped.
    pub(crate) fn spawn(
        config: ClientConfig,
        requests: mpsc::UnboundedReceiver<Request>,
        events: broadcast::Sender<DeviceEvent>,
    ) {
        let dialect = config.protocol_version;
        let connection = Self {
            port: config.port,
            config,
            requests,
            events,
            host: String::new(),
            dialect,
            abandoned: false,
            session: Session::new(dialect),
            transport: None,
            poll: None,
            reconnect: None,
            read_buf: vec![0; READ_CHUNK_SIZE].into_boxed_slice(),
        };

        tokio::spawn(connection.run());
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => {
                        tracing::debug!("All client handles dropped, shutting down");
                        self.disconnect();
                        break;
                    }
                },
                io = next_io(&mut self.transport, &mut self.read_buf) => self.handle_io(io).await,
                _ = next_tick(&mut self.poll) => self.handle_tick().await,
                fallback = reconnect_due(&mut self.reconnect) => self.handle_reconnect(fallback),
            }
        }
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::Connect { host, port } => self.connect(host, port),
            Request::Disconnect => self.disconnect(),
            Request::SetVolume(volume) => self.set_volume(volume).await,
            Request::SetMute(mute) => self.set_mute(mute).await,
            Request::SetSource(source) => self.set_source(source).await,
            Request::Standby => {
                self.send(&[Command::PowerOff, Command::Query(Query::Power)])
                    .await
            }
            Request::State(reply) => {
                let _ = reply.send(self.session.state.clone());
            }
        }
    }

    fn connect(&mut self, host: String, port: u16) {
        self.reconnect = None;

        if self.transport.is_some() || self.abandoned {
            return;
        }

        self.host = host;
        self.port = port;
        self.session = Session::new(self.dialect);
        self.session.state.phase = ConnectionPhase::Connecting;

        tracing::info!(
            "Connecting to {}:{} (protocol version {})",
            self.host,
            self.port,
            self.dialect.version()
        );

        let addr = (self.host.clone(), self.port);
        self.transport = Some(Transport::Opening(Box::pin(TcpStream::connect(addr))));
        self.emit(DeviceEvent::Connecting);

        let period = self.config.poll_interval(self.dialect);
        let mut poll = interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.poll = Some(poll);
    }

    fn disconnect(&mut self) {
        if !self.abandoned {
            tracing::info!("Disconnecting from {}:{}", self.host, self.port);
        }
        self.abandoned = true;
        self.reconnect = None;
        self.close();
    }

    async fn handle_io(&mut self, io: IoEvent) {
        match io {
            IoEvent::Opened(Ok(stream)) => {
                tracing::debug!("Socket connected to {}:{}", self.host, self.port);
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!("Failed to set TCP_NODELAY: {}", e);
                }
                self.transport = Some(Transport::Open(stream));
                self.send(&[Command::Query(Query::Power)]).await;
            }
            IoEvent::Read(Ok(0)) => {
                tracing::info!("Connection closed by device");
                self.close();
            }
            IoEvent::Read(Ok(n)) => self.receive(n).await,
            IoEvent::Opened(Err(e)) | IoEvent::Read(Err(e)) => self.fail(e),
        }
    }

    async fn receive(&mut self, n: usize) {
        let bytes = &self.read_buf[..n];
        tracing::debug!("Received: {}", String::from_utf8_lossy(bytes));

        self.session.last_data = Instant::now();
        self.session.buffer.push(bytes);

        let dialect = self.session.state.dialect;
        let mut queries = Vec::new();

        loop {
            let extraction = self.session.buffer.extract(dialect);

            for frame in extraction.frames {
                let reaction = self.session.state.apply(frame);
                for event in reaction.events {
                    self.emit(event);
                }
                queries.extend(reaction.queries);
            }

            match extraction.stall {
                Some(stall) => {
                    tracing::warn!(
                        "Malformed data in receive buffer ({:?}): {}",
                        stall,
                        String::from_utf8_lossy(self.session.buffer.as_bytes())
                    );
                    self.session.buffer.resync(stall);
                }
                None => break,
            }
        }

        if !queries.is_empty() {
            self.send(&command::queries(&queries)).await;
        }
    }

    async fn handle_tick(&mut self) {
        if self.abandoned {
            self.close();
            return;
        }

        let silent = self.session.last_data.elapsed() > self.config.liveness_window();

        match self.session.state.phase {
            ConnectionPhase::Connected if silent => {
                tracing::info!("No data from {}:{}, reconnecting", self.host, self.port);
                self.close();
                self.schedule_reconnect(self.config.stall_retry_delay(), false);
            }
            ConnectionPhase::Connected => {
                let poll = command::queries(Query::poll(self.session.state.dialect));
                self.send(&poll).await;
            }
            ConnectionPhase::Connecting if silent => {
                tracing::info!(
                    "No handshake from {}:{} with protocol version {}",
                    self.host,
                    self.port,
                    self.dialect.version()
                );
                self.close();
                self.schedule_reconnect(
                    self.config.stall_retry_delay(),
                    self.config.dialect_fallback,
                );
            }
            ConnectionPhase::Connecting | ConnectionPhase::Idle => {}
        }
    }

    fn handle_reconnect(&mut self, fallback: bool) {
        self.reconnect = None;

        if self.abandoned {
            return;
        }

        if fallback {
            let next = self.dialect.downgrade();
            tracing::info!(
                "Falling back from protocol version {} to {}",
                self.dialect.version(),
                next.version()
            );
            self.dialect = next;
        }

        self.connect(self.host.clone(), self.port);
    }

    async fn set_volume(&mut self, volume: f64) {
        let state = &self.session.state;
        if !state.power.is_on() {
            tracing::debug!("Ignoring volume change while power is {}", state.power);
            return;
        }

        // `as` saturates and maps NaN to zero, clamping handles the rest
        let volume = state.clamp_volume(volume.round() as Volume);
        self.send(&[Command::SetVolume(volume), Command::Query(Query::Volume)])
            .await;
    }

    async fn set_mute(&mut self, mute: bool) {
        let state = &self.session.state;
        if !state.power.is_on() {
            tracing::debug!("Ignoring mute change while power is {}", state.power);
            return;
        }

        let command = if mute { Command::MuteOn } else { Command::MuteOff };
        self.send(&[command, Command::Query(Query::Mute)]).await;
    }

    async fn set_source(&mut self, source: String) {
        self.send(&[
            Command::PowerOn,
            Command::SelectSource(source),
            Command::Query(Query::Source),
        ])
        .await;
    }

    /// Write commands if the socket is open
    async fn send(&mut self, commands: &[Command]) {
        let Some(Transport::Open(stream)) = self.transport.as_mut() else {
            return;
        };

        let wire = command::encode_all(commands, self.session.state.dialect);
        if wire.is_empty() {
            return;
        }

        tracing::debug!("Sending: {}", wire);
        let result = stream.write_all(wire.as_bytes()).await;
        if let Err(e) = result {
            self.fail(e);
        }
    }

    /// Transport error: tear down and retry later
    fn fail(&mut self, error: io::Error) {
        tracing::warn!("Socket error on {}:{}: {}", self.host, self.port, error);
        self.close();

        if self.abandoned {
            return;
        }

        self.emit(DeviceEvent::Error(error.to_string()));
        self.schedule_reconnect(self.config.error_retry_delay(), false);
    }

    /// Drop the socket and the poll timer; does not reconnect
    fn close(&mut self) {
        self.poll = None;
        self.transport = None;
        self.session.state.phase = ConnectionPhase::Idle;
    }

    fn schedule_reconnect(&mut self, delay: Duration, fallback: bool) {
        if self.abandoned {
            return;
        }

        tracing::debug!("Reconnecting in {:?}", delay);
        self.reconnect = Some(PendingReconnect {
            timer: Box::pin(sleep(delay)),
            fallback,
        });
    }

    fn emit(&self, event: DeviceEvent) {
        tracing::debug!("Event: {:?}", event);
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}

async fn next_io(transport: &mut Option<Transport>, buf: &mut [u8]) -> IoEvent {
    match transport {
        Some(Transport::Opening(connect)) => IoEvent::Opened(connect.as_mut().await),
        Some(Transport::Open(stream)) => IoEvent::Read(stream.read(buf).await),
        None => pending().await,
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

/// Resolves with the fallback flag once the reconnect delay has elapsed
async fn reconnect_due(reconnect: &mut Option<PendingReconnect>) -> bool {
    match reconnect {
        Some(pending_reconnect) => {
            pending_reconnect.timer.as_mut().await;
            pending_reconnect.fallback
        }
        None => pending().await,
    }
}
