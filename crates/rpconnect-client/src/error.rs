//! Client error types.

use std::io::ErrorKind;

use thiserror::Error;

use rpconnect_protocol::{Fault, ProtocolError};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting to the server failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The stream failed while sending the request or receiving the reply.
    #[error("transport error: {0}")]
    Transport(#[source] ProtocolError),

    /// The reply did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(#[source] ProtocolError),

    /// Request timed out.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The remote procedure failed.
    #[error("remote fault: {0}")]
    Remote(#[from] Fault),

    /// The result could not be converted to the requested type.
    #[error("failed to decode result: {0}")]
    Decode(#[source] serde_json::Error),
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Timeout { operation } => Self::Timeout(operation),
            ProtocolError::Io(err)
                if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
            {
                Self::Timeout(err.to_string())
            }
            err if err.is_transport() => Self::Transport(err),
            err => Self::Protocol(err),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::from(ProtocolError::Io(err))
    }
}

impl ClientError {
    /// Returns the remote fault if the call itself failed on the server.
    pub fn remote_fault(&self) -> Option<&Fault> {
        match self {
            Self::Remote(fault) => Some(fault),
            _ => None,
        }
    }

    /// Returns true for stream-level failures: connect, send, receive or
    /// timeout.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Transport(_) | Self::Timeout(_)
        )
    }
}
