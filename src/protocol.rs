//! Frame extraction for the Rotel ASCII protocol.
//!
//! The device streams `key=value` frames closed by a dialect specific
//! terminator, interleaved with two fixed power envelopes and length
//! prefixed `display=` sub-frames that are never surfaced.

use crate::types::Dialect;
use bytes::{Buf, BytesMut};

/// Envelope the device sends when it powers on
pub const POWER_ON_ENVELOPE: &[u8] = b"!00:power_on!";

/// Envelope the device sends when it powers off
pub const POWER_OFF_ENVELOPE: &[u8] = b"!00:power_off!";

const DISPLAY_PREFIX: &[u8] = b"display=";

/// Bytes of a display sub-frame that precede its payload
const DISPLAY_HEADER_LEN: usize = 12;

/// Unterminated input beyond this many bytes is dropped
///
/// The largest well formed unit is a display sub-frame of 12 + 999 bytes.
pub const MAX_BUFFER_LEN: usize = 4096;

/// A recognized protocol frame with its raw value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Volume(String),
    /// Legacy dialect only
    VolumeMin(String),
    /// Legacy dialect only
    VolumeMax(String),
    Source(String),
    Mute(String),
    Power(String),
}

impl Frame {
    /// Parse frame text (terminator already stripped)
    ///
    /// Returns `None` for keys outside the dialect's vocabulary.
    pub fn parse(text: &str, dialect: Dialect) -> Option<Frame> {
        let (key, value) = text.split_once('=')?;
        let value = value.to_string();

        match key {
            "volume" => Some(Frame::Volume(value)),
            "volume_min" if dialect == Dialect::Legacy => Some(Frame::VolumeMin(value)),
            "volume_max" if dialect == Dialect::Legacy => Some(Frame::VolumeMax(value)),
            "source" => Some(Frame::Source(value)),
            "mute" => Some(Frame::Mute(value)),
            "power" => Some(Frame::Power(value)),
            _ => None,
        }
    }
}

/// Reason the buffer head cannot be parsed no matter how many bytes arrive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    /// A terminator at the head of the buffer that does not open a power envelope
    EmptyFrame,
    /// A display header whose length field is not three decimal digits
    DisplayLength,
}

/// Result of one extraction pass
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Recognized frames in arrival order
    pub frames: Vec<Frame>,
    /// Set when extraction stopped on malformed bytes rather than a partial frame
    pub stall: Option<Stall>,
}

enum Step {
    /// Drop bytes that carry no frame
    Discard(usize),
    /// A frame of the given length followed by its terminator
    Frame(usize),
    Incomplete,
    Stalled(Stall),
}

/// Accumulates bytes received on one connection
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    data: BytesMut,
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the socket
    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extract every complete frame, leaving a trailing partial frame in place
    pub fn extract(&mut self, dialect: Dialect) -> Extraction {
        let mut extraction = Extraction::default();

        while !self.data.is_empty() {
            match next_step(&self.data, dialect.terminator()) {
                Step::Discard(len) => self.data.advance(len),
                Step::Frame(len) => {
                    let raw = self.data.split_to(len);
                    self.data.advance(1);
                    let text = String::from_utf8_lossy(&raw).into_owned();

                    match Frame::parse(&text, dialect) {
                        Some(frame) => extraction.frames.push(frame),
                        None => tracing::debug!("Dropping unrecognized frame: {}", text),
                    }
                }
                Step::Incomplete => {
                    if self.data.len() > MAX_BUFFER_LEN {
                        tracing::warn!(
                            "Dropping {} buffered bytes without a terminator",
                            self.data.len()
                        );
                        self.data.clear();
                    }
                    break;
                }
                Step::Stalled(stall) => {
                    extraction.stall = Some(stall);
                    break;
                }
            }
        }

        extraction
    }

    /// Discard the bytes behind a stall so extraction can make progress again
    pub fn resync(&mut self, stall: Stall) {
        let len = match stall {
            Stall::EmptyFrame => 1,
            Stall::DisplayLength => DISPLAY_PREFIX.len(),
        };
        let len = len.min(self.data.len());
        self.data.advance(len);
    }
}

fn next_step(data: &[u8], terminator: u8) -> Step {
    for envelope in [POWER_ON_ENVELOPE, POWER_OFF_ENVELOPE] {
        if data.starts_with(envelope) {
            return Step::Discard(envelope.len());
        }
    }

    if data.starts_with(DISPLAY_PREFIX) {
        let Some(field) = data.get(DISPLAY_PREFIX.len()..DISPLAY_PREFIX.len() + 3) else {
            return Step::Incomplete;
        };
        let Some(payload_len) = display_length(field) else {
            return Step::Stalled(Stall::DisplayLength);
        };
        let total = DISPLAY_HEADER_LEN + payload_len;
        return if data.len() < total {
            Step::Incomplete
        } else {
            Step::Discard(total)
        };
    }

    match data.iter().position(|&b| b == terminator) {
        None => Step::Incomplete,
        Some(0) if is_envelope_prefix(data) => Step::Incomplete,
        Some(0) => Step::Stalled(Stall::EmptyFrame),
        Some(idx) => Step::Frame(idx),
    }
}

fn display_length(field: &[u8]) -> Option<usize> {
    if !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(field).ok()?.parse().ok()
}

fn is_envelope_prefix(data: &[u8]) -> bool {
    [POWER_ON_ENVELOPE, POWER_OFF_ENVELOPE]
        .iter()
        .any(|envelope| data.len() < envelope.len() && envelope.starts_with(data))
}
