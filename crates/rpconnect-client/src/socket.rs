//! TCP client performing one call per connection.

use std::net::ToSocketAddrs;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tracing::debug;

use rpconnect_protocol::{
    DEFAULT_MAX_FRAME_SIZE, FrameReader, FrameWriter, ProtocolError, decode_reply, encode_request,
    read_frame, write_frame,
};

use crate::error::{ClientError, ClientResult};

/// Client for calling procedures on an rpconnect server.
///
/// Every call opens a fresh connection, sends one request, reads one reply
/// and closes the connection again.
#[derive(Debug, Clone)]
pub struct RpcClient {
    host: String,
    port: u16,
    timeout: Duration,
    max_frame_size: usize,
}

impl RpcClient {
    /// Creates a client for the server at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(30),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Builder: set the timeout applied to connecting, sending and receiving.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: set the largest reply accepted, in bytes.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Returns the server address as `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts building a call to `name`.
    pub fn request(&self, name: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder {
            client: self,
            name: name.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    /// Calls `name` and returns its result.
    ///
    /// An error reply from the server is returned as [`ClientError::Remote`].
    pub async fn call(
        &self,
        name: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> ClientResult<Value> {
        let payload = encode_request(name, args, kwargs)?;

        debug!(addr = %self.addr(), procedure = %name, "Connecting to server");
        let mut stream = tokio::time::timeout(
            self.timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| ClientError::Timeout(format!("connecting to {}", self.addr())))?
        .map_err(|e| {
            ClientError::Connection(format!("failed to connect to {}: {e}", self.addr()))
        })?;

        // The stream is dropped, and so closed, on every return path below.
        let reply = self.exchange(&mut stream, &payload).await?;
        debug!(procedure = %name, bytes = reply.len(), "Reply received");

        Ok(decode_reply(&reply)??)
    }

    /// Calls `name` and converts the result into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        name: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> ClientResult<T> {
        let value = self.call(name, args, kwargs).await?;
        serde_json::from_value(value).map_err(ClientError::Decode)
    }

    /// Blocking version of [`RpcClient::call`] for callers without a runtime.
    pub fn call_blocking(
        &self,
        name: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> ClientResult<Value> {
        let payload = encode_request(name, args, kwargs)?;

        debug!(addr = %self.addr(), procedure = %name, "Connecting to server");
        let stream = self.connect_blocking()?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        FrameWriter::new(&stream).write_frame(&payload)?;
        let reply = FrameReader::new(&stream)
            .with_max_frame_size(self.max_frame_size)
            .read_frame()?;
        debug!(procedure = %name, bytes = reply.len(), "Reply received");

        Ok(decode_reply(&reply)??)
    }

    async fn exchange(&self, stream: &mut TcpStream, payload: &[u8]) -> ClientResult<Vec<u8>> {
        tokio::time::timeout(self.timeout, write_frame(stream, payload))
            .await
            .map_err(|_| ProtocolError::timeout("sending request"))??;

        debug!("Request sent, waiting for reply");

        let reply = tokio::time::timeout(self.timeout, read_frame(stream, self.max_frame_size))
            .await
            .map_err(|_| ProtocolError::timeout("reading reply"))??;

        Ok(reply)
    }

    fn connect_blocking(&self) -> ClientResult<std::net::TcpStream> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| {
                ClientError::Connection(format!("failed to resolve {}: {e}", self.addr()))
            })?;

        let mut last_error = None;
        for addr in addrs {
            match std::net::TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        let reason = last_error.map_or_else(
            || "no addresses resolved".to_string(),
            |e| e.to_string(),
        );
        Err(ClientError::Connection(format!(
            "failed to connect to {}: {reason}",
            self.addr()
        )))
    }
}

/// A call under construction, created by [`RpcClient::request`].
#[derive(Debug)]
pub struct CallBuilder<'a> {
    client: &'a RpcClient,
    name: String,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl CallBuilder<'_> {
    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Sends the call.
    pub async fn send(self) -> ClientResult<Value> {
        self.client.call(&self.name, &self.args, &self.kwargs).await
    }

    /// Sends the call and converts the result into `T`.
    pub async fn send_as<T: DeserializeOwned>(self) -> ClientResult<T> {
        self.client
            .call_as(&self.name, &self.args, &self.kwargs)
            .await
    }

    /// Sends the call without an async runtime.
    pub fn send_blocking(self) -> ClientResult<Value> {
        self.client
            .call_blocking(&self.name, &self.args, &self.kwargs)
    }
}

/// Calls `name` on the server at `host:port` with default client settings.
pub async fn remote_call(
    host: &str,
    port: u16,
    name: &str,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> ClientResult<Value> {
    RpcClient::new(host, port).call(name, args, kwargs).await
}
