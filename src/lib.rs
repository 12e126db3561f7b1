//! Rust library for controlling Rotel amplifiers over their IP control protocol
//!
//! This library provides an async client for the ASCII protocol Rotel
//! amplifiers speak on TCP port 9590. It supports:
//!
//! - A persistent connection with automatic reconnects after errors and stalls
//! - Both protocol dialects (version 2 and legacy), with automatic fallback
//!   when a device does not answer the version 2 handshake
//! - Volume, mute, source and standby control
//! - Real-time state change events
//!
//! # Quick Start
//!
//! ```no_run
//! use rotel_ip::{ClientConfig, DeviceEvent, RotelClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RotelClient::new(ClientConfig::default());
//!     let mut events = client.subscribe();
//!
//!     client.connect("192.168.1.50", Some(9590))?;
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             DeviceEvent::Connected(snapshot) => {
//!                 println!("Connected: {:?}", snapshot);
//!                 client.set_source("aux")?;
//!             }
//!             DeviceEvent::Volume(volume) => println!("Volume: {}", volume),
//!             DeviceEvent::Error(error) => println!("Error: {}", error),
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Client**: Cloneable handle that forwards commands to the connection task
//! - **Connection**: Socket lifecycle, polling, reconnects and dialect fallback
//! - **State**: Interpretation of frames into device state and events
//! - **Protocol**: Frame extraction from the raw byte stream
//! - **Command**: Dialect specific encoding of outbound requests
//! - **Types**: Domain types and data structures

mod client;
mod command;
mod config;
mod connection;
mod error;
mod protocol;
mod state;
mod subscription;
mod types;

// Public exports
pub use client::RotelClient;
pub use command::{Command, Query};
pub use config::{ClientConfig, DEFAULT_PORT};
pub use error::{Result, RotelError};
pub use protocol::{Extraction, Frame, ReceiveBuffer, Stall};
pub use state::Reaction;
pub use subscription::{DeviceEvent, EventReceiver};
pub use types::{
    ConnectionPhase, DeviceSnapshot, DeviceState, Dialect, Power, Volume, DEFAULT_VOLUME_MAX,
    DEFAULT_VOLUME_MIN,
};
