use crate::error::RotelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Volume level as reported by the device
pub type Volume = i32;

/// Default lower volume bound used until the device reports its own
pub const DEFAULT_VOLUME_MIN: Volume = 1;

/// Default upper volume bound used until the device reports its own
pub const DEFAULT_VOLUME_MAX: Volume = 96;

/// Protocol dialect spoken by the device firmware
///
/// Version 2 terminates notifications with `$` and uses short `name?` queries.
/// The legacy dialect terminates everything with `!` and uses verbose
/// `get_*!` queries, but additionally reports its volume bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Dialect {
    /// Protocol version 1 (`!` terminated)
    Legacy,
    /// Protocol version 2 (`$` terminated notifications)
    #[default]
    V2,
}

impl Dialect {
    /// Numeric protocol version
    pub fn version(self) -> u8 {
        match self {
            Dialect::Legacy => 1,
            Dialect::V2 => 2,
        }
    }

    /// Terminator of incoming frames
    pub fn terminator(self) -> u8 {
        match self {
            Dialect::Legacy => b'!',
            Dialect::V2 => b'$',
        }
    }

    /// Dialect to retry with after a failed handshake
    ///
    /// Decrementing below version 1 starts over at version 2.
    pub fn downgrade(self) -> Self {
        match self {
            Dialect::V2 => Dialect::Legacy,
            Dialect::Legacy => Dialect::V2,
        }
    }
}

impl TryFrom<u8> for Dialect {
    type Error = RotelError;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        match version {
            1 => Ok(Dialect::Legacy),
            2 => Ok(Dialect::V2),
            other => Err(RotelError::InvalidProtocolVersion(other)),
        }
    }
}

impl From<Dialect> for u8 {
    fn from(dialect: Dialect) -> Self {
        dialect.version()
    }
}

/// Power state reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Power {
    /// Nothing reported yet
    #[default]
    Unknown,
    /// Amplifier is on
    On,
    /// Amplifier is in standby
    Standby,
    /// Any other token the firmware sends
    Other(String),
}

impl Power {
    /// Parse a power token from the wire
    pub fn from_token(token: &str) -> Self {
        match token {
            "" => Power::Unknown,
            "on" => Power::On,
            "standby" => Power::Standby,
            other => Power::Other(other.to_string()),
        }
    }

    /// Wire token for this power state
    pub fn as_token(&self) -> &str {
        match self {
            Power::Unknown => "",
            Power::On => "on",
            Power::Standby => "standby",
            Power::Other(token) => token,
        }
    }

    /// Whether the amplifier is on
    pub fn is_on(&self) -> bool {
        matches!(self, Power::On)
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl From<String> for Power {
    fn from(token: String) -> Self {
        Power::from_token(&token)
    }
}

impl From<Power> for String {
    fn from(power: Power) -> Self {
        power.as_token().to_string()
    }
}

/// Progress of the current connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// No socket
    #[default]
    Idle,
    /// Socket opened, handshake not yet answered
    Connecting,
    /// Handshake completed
    Connected,
}

/// Device state tracked from protocol frames
///
/// One instance exists per connection attempt; a fresh one replaces it
/// whenever a new connection is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub volume: Volume,
    pub volume_min: Volume,
    pub volume_max: Volume,
    pub muted: bool,
    pub power: Power,
    /// Device specific source token (e.g. `aux`, `coax1`, `opt2`)
    pub source: String,
    pub phase: ConnectionPhase,
    pub dialect: Dialect,
}

impl DeviceState {
    /// Fresh state for a connection speaking `dialect`
    pub fn new(dialect: Dialect) -> Self {
        Self {
            volume: 0,
            volume_min: DEFAULT_VOLUME_MIN,
            volume_max: DEFAULT_VOLUME_MAX,
            muted: false,
            power: Power::Unknown,
            source: String::new(),
            phase: ConnectionPhase::Idle,
            dialect,
        }
    }

    /// Clamp a volume level to the device bounds
    pub fn clamp_volume(&self, volume: Volume) -> Volume {
        volume.clamp(self.volume_min, self.volume_max.max(self.volume_min))
    }

    /// Snapshot carried by the `connected` event
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            volume: self.volume,
            muted: self.muted,
            power: self.power.clone(),
            source: self.source.clone(),
            volume_min: self.volume_min,
            volume_max: self.volume_max,
        }
    }
}

/// Full device snapshot published once a handshake completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub volume: Volume,
    pub muted: bool,
    pub power: Power,
    pub source: String,
    pub volume_min: Volume,
    pub volume_max: Volume,
}
