//! TCP listener and per-connection I/O.
//!
//! The listening socket is opened when the server is created and closed when
//! it is dropped. Each accepted connection is handed to its own task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{Instrument, debug, error, info, info_span, warn};

use rpconnect_protocol::{
    Fault, ProtocolError, Request, decode_request, encode_reply, read_frame, write_frame,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::handle_connection;
use crate::registry::{Arguments, Registry};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server exposing registered procedures.
pub struct RpcServer {
    /// Server configuration.
    config: ServerConfig,
    /// Bound listening socket.
    listener: TcpListener,
    /// Procedures callable by clients.
    registry: Registry,
}

impl RpcServer {
    /// Binds the listening socket with an empty registry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        Self::with_registry(config, Registry::new())
    }

    /// Binds the listening socket, serving the given registry.
    pub fn with_registry(config: ServerConfig, registry: Registry) -> ServerResult<Self> {
        if config.max_connections == 0 {
            return Err(ServerError::config("max_connections must be at least 1"));
        }
        if config.backlog == 0 {
            return Err(ServerError::config("backlog must be at least 1"));
        }

        let socket = if config.bind_addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(config.bind_addr)?;
        let listener = socket.listen(config.backlog)?;

        info!(
            addr = %listener.local_addr()?,
            backlog = config.backlog,
            "RPC server listening"
        );

        Ok(Self {
            config,
            listener,
            registry,
        })
    }

    /// Returns the address the server is bound to.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the registry for adding procedures before serving.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Registers a blocking callable. See [`Registry::register`].
    pub fn register<F, T>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Arguments) -> Result<T, Fault> + Send + Sync + 'static,
        T: Serialize + 'static,
    {
        self.registry.register(name, f);
        self
    }

    /// Registers an async callable. See [`Registry::register_async`].
    pub fn register_async<F, Fut, T>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Fault>> + Send + 'static,
        T: Serialize + 'static,
    {
        self.registry.register_async(name, f);
        self
    }

    /// Registers a function under its own name. See [`Registry::register_fn`].
    pub fn register_fn<F, T>(&mut self, f: F) -> ServerResult<&mut Self>
    where
        F: Fn(Arguments) -> Result<T, Fault> + Send + Sync + 'static,
        T: Serialize + 'static,
    {
        self.registry.register_fn(f)?;
        Ok(self)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> ServerResult<()> {
        self.run_until_shutdown(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Connections already accepted keep running to completion on their own
    /// tasks.
    pub async fn run_until_shutdown<S>(self, shutdown: S) -> ServerResult<()>
    where
        S: Future<Output = ()> + Send,
    {
        let Self {
            config,
            listener,
            registry,
        } = self;
        let registry = Arc::new(registry);
        let semaphore = Arc::new(Semaphore::new(config.max_connections));

        info!(procedures = ?registry.names(), "Serving");
        tokio::pin!(shutdown);

        loop {
            let next = async {
                let permit = Arc::clone(&semaphore).acquire_owned().await;
                (permit, listener.accept().await)
            };

            let (permit, accepted) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    return Ok(());
                }
                next = next => next,
            };
            let Ok(permit) = permit else {
                return Ok(());
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Accepted new connection");
                    let conn = Connection::new(
                        stream,
                        peer,
                        config.connection_timeout,
                        config.max_frame_size,
                    )
                    .with_permit(permit);
                    let registry = Arc::clone(&registry);

                    tokio::spawn(
                        async move {
                            match handle_connection(registry, conn).await {
                                Ok(()) => {}
                                Err(ServerError::Protocol(ProtocolError::ConnectionClosed)) => {
                                    debug!("Peer closed without sending a request");
                                }
                                Err(e) => warn!(error = %e, "Connection handler error"),
                            }
                        }
                        .instrument(info_span!("connection", %peer)),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// One accepted client connection.
///
/// Dropping it closes the stream.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    timeout: Duration,
    max_frame_size: usize,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Connection {
    /// Wraps an accepted stream.
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        timeout: Duration,
        max_frame_size: usize,
    ) -> Self {
        Self {
            stream,
            peer,
            timeout,
            max_frame_size,
            _permit: None,
        }
    }

    fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }

    /// Returns the peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Reads and decodes the request envelope.
    pub async fn read_request(&mut self) -> ServerResult<Request> {
        let payload = tokio::time::timeout(
            self.timeout,
            read_frame(&mut self.stream, self.max_frame_size),
        )
        .await
        .map_err(|_| ProtocolError::timeout("read request"))??;

        Ok(decode_request(&payload)?)
    }

    /// Encodes and writes the reply for a call outcome.
    pub async fn write_reply(&mut self, outcome: &Result<Value, Fault>) -> ServerResult<()> {
        let payload = encode_reply(outcome)?;

        tokio::time::timeout(self.timeout, write_frame(&mut self.stream, &payload))
            .await
            .map_err(|_| ProtocolError::timeout("write reply"))??;

        Ok(())
    }

    /// Shuts down the write half and releases the stream.
    pub async fn close(mut self) -> ServerResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
