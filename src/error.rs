use thiserror::Error;

/// Result type for Rotel operations
pub type Result<T> = std::result::Result<T, RotelError>;

/// Errors that can occur when interacting with a Rotel device
#[derive(Error, Debug)]
pub enum RotelError {
    /// The connection task has shut down
    #[error("Connection closed")]
    ConnectionClosed,

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Protocol version outside the supported dialects
    #[error("Unsupported protocol version: {0}")]
    InvalidProtocolVersion(u8),
}
