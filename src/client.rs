use crate::config::ClientConfig;
use crate::connection::{Connection, Request};
use crate::error::{Result, RotelError};
use crate::subscription::{DeviceEvent, EventReceiver};
use crate::types::DeviceState;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Client for controlling a Rotel amplifier
///
/// The `RotelClient` is a handle to a background task that owns the TCP
/// connection to one device. The task keeps the connection alive, reconnects
/// after errors and stalls, and publishes [`DeviceEvent`]s to subscribers.
/// Handles are cheap to clone; the task stops when the last one is dropped.
#[derive(Clone)]
pub struct RotelClient {
    requests: mpsc::UnboundedSender<Request>,
    events: broadcast::Sender<DeviceEvent>,
    default_port: u16,
}

impl RotelClient {
    /// Create a client and spawn its connection task
    ///
    /// Must be called from within a tokio runtime. No connection is made
    /// until [`connect`](Self::connect) is called.
    pub fn new(config: ClientConfig) -> Self {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let default_port = config.port;

        Connection::spawn(config, requests_rx, events.clone());

        Self {
            requests,
            events,
            default_port,
        }
    }

    /// Connect to the device at `host`
    ///
    /// Uses the configured port (9590 by default) when `port` is `None`.
    /// Does nothing if a connection already exists or the client has been
    /// disconnected.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rotel_ip::{ClientConfig, DeviceEvent, RotelClient};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = RotelClient::new(ClientConfig::default());
    ///     let mut events = client.subscribe();
    ///     client.connect("192.168.1.50", None)?;
    ///
    ///     while let Ok(event) = events.recv().await {
    ///         if let DeviceEvent::Connected(snapshot) = event {
    ///             println!("Volume is {}", snapshot.volume);
    ///             break;
    ///         }
    ///     }
    ///
    ///     client.set_volume(30.0)?;
    ///     client.disconnect()?;
    ///     Ok(())
    /// }
    /// ```
    pub fn connect(&self, host: impl Into<String>, port: Option<u16>) -> Result<()> {
        self.request(Request::Connect {
            host: host.into(),
            port: port.unwrap_or(self.default_port),
        })
    }

    /// Close the connection for good
    ///
    /// Pending reconnects are cancelled and no new connection is attempted
    /// afterwards, even if `connect` is called again.
    pub fn disconnect(&self) -> Result<()> {
        self.request(Request::Disconnect)
    }

    /// Set the absolute volume
    ///
    /// The value is rounded and clamped to the device bounds. Ignored unless
    /// the amplifier is powered on.
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.request(Request::SetVolume(volume))
    }

    /// Mute or unmute. Ignored unless the amplifier is powered on.
    pub fn set_mute(&self, mute: bool) -> Result<()> {
        self.request(Request::SetMute(mute))
    }

    /// Power on and select the input with the given device token
    pub fn set_source(&self, source: impl Into<String>) -> Result<()> {
        self.request(Request::SetSource(source.into()))
    }

    /// Put the amplifier into standby
    pub fn standby(&self) -> Result<()> {
        self.request(Request::Standby)
    }

    /// Subscribe to device events
    ///
    /// Multiple subscriptions can be active simultaneously. Only events
    /// published after subscribing are received.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.events.subscribe())
    }

    /// Get a snapshot of the tracked device state
    pub async fn state(&self) -> Result<DeviceState> {
        let (tx, rx) = oneshot::channel();
        self.request(Request::State(tx))?;
        rx.await.map_err(|_| RotelError::ConnectionClosed)
    }

    fn request(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| RotelError::ConnectionClosed)
    }
}
