//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use rpconnect_protocol::DEFAULT_MAX_FRAME_SIZE;

/// Port used when none is given.
pub const DEFAULT_PORT: u16 = 23000;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listening socket to.
    pub bind_addr: SocketAddr,

    /// Listen backlog for pending connections.
    pub backlog: u32,

    /// Timeout for reading the request and for writing the reply.
    ///
    /// Procedure execution is not covered.
    pub connection_timeout: Duration,

    /// Maximum concurrently handled connections.
    pub max_connections: usize,

    /// Largest request payload accepted, in bytes.
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            backlog: 5,
            connection_timeout: Duration::from_secs(30),
            max_connections: 128,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration bound to the given address.
    pub fn new(bind_addr: impl Into<SocketAddr>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Default::default()
        }
    }

    /// Creates a configuration listening on every IPv4 interface.
    pub fn all_interfaces(port: u16) -> Self {
        Self::new((Ipv4Addr::UNSPECIFIED, port))
    }

    /// Builder: set listen backlog.
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Builder: set connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Builder: set max frame size.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }
}
