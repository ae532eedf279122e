//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while framing or decoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before sending any bytes of a frame.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The peer closed the stream in the middle of a frame.
    #[error("incomplete frame: expected {expected} bytes, got {received}")]
    IncompleteFrame { expected: usize, received: usize },

    /// Declared or actual payload length exceeds the allowed maximum.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u128, max: usize },

    /// Failed to serialize an envelope.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload did not decode to a request envelope.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Payload did not decode to a reply envelope.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// Operation timed out.
    #[error("timeout during {operation}")]
    Timeout { operation: String },
}

impl ProtocolError {
    /// Creates a timeout error for the given operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Returns true for stream-level failures, as opposed to payloads that
    /// arrived intact but had the wrong shape.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ConnectionClosed
                | Self::IncompleteFrame { .. }
                | Self::Timeout { .. }
        )
    }
}
