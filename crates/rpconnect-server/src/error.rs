//! Server error types.

use std::io;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket failure while binding, accepting or closing.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// A request could not be read or a reply could not be written.
    #[error("connection error: {0}")]
    Protocol(#[from] rpconnect_protocol::ProtocolError),

    /// A procedure without a usable identifier was registered by function.
    #[error("cannot derive a procedure name from `{type_name}`; register it with an explicit name")]
    UnnamedProcedure { type_name: String },

    /// The server configuration cannot be served.
    #[error("invalid server configuration: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an unnamed procedure error.
    pub fn unnamed_procedure(type_name: impl Into<String>) -> Self {
        Self::UnnamedProcedure {
            type_name: type_name.into(),
        }
    }
}
