use crate::error::{Result, RotelError};
use crate::types::{DeviceSnapshot, Power, Volume};
use tokio::sync::broadcast;

/// Event published by the connection task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A new connection attempt has started
    Connecting,

    /// Handshake completed (once per connection)
    Connected(DeviceSnapshot),

    Volume(Volume),

    Mute(bool),

    Source(String),

    Power(Power),

    /// Transport failure; a reconnect is scheduled unless disconnected
    Error(String),
}

/// Receiver for device events
pub struct EventReceiver {
    rx: broadcast::Receiver<DeviceEvent>,
}

impl EventReceiver {
    /// Create a new event receiver
    pub(crate) fn new(rx: broadcast::Receiver<DeviceEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next device event
    ///
    /// Returns `ConnectionClosed` once the connection task has shut down.
    pub async fn recv(&mut self) -> Result<DeviceEvent> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => RotelError::ConnectionClosed,
            broadcast::error::RecvError::Lagged(n) => {
                RotelError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is available.
    pub fn try_recv(&mut self) -> Result<Option<DeviceEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(RotelError::ConnectionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(RotelError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }
}
