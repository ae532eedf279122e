//! Per-connection request/reply exchange.
//!
//! Each connection walks `accepted -> reading -> dispatching -> replying ->
//! closed`. Any failure while reading or replying moves it to `faulted` and
//! then `closed` without a reply. Faults raised while dispatching, including
//! panics, are turned into error replies.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, trace, warn};

use rpconnect_protocol::Fault;

use crate::dispatch::dispatch;
use crate::error::ServerResult;
use crate::registry::Registry;
use crate::socket::Connection;

/// Stage of a connection's single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Accepted,
    Reading,
    Dispatching,
    Replying,
    Faulted,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "accepted",
            Self::Reading => "reading",
            Self::Dispatching => "dispatching",
            Self::Replying => "replying",
            Self::Faulted => "faulted",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

struct Session {
    conn: Connection,
    state: ConnectionState,
}

impl Session {
    fn enter(&mut self, next: ConnectionState) {
        trace!(from = %self.state, to = %next, "Connection state change");
        self.state = next;
    }

    async fn exchange(&mut self, registry: &Registry) -> ServerResult<()> {
        self.enter(ConnectionState::Reading);
        let request = self.conn.read_request().await?;
        let name = request.name.clone();

        self.enter(ConnectionState::Dispatching);
        let outcome = match AssertUnwindSafe(dispatch(registry, request))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(procedure = %name, panic = %message, "Procedure panicked");
                Err(Fault::panic(message))
            }
        };

        match &outcome {
            Ok(_) => debug!(procedure = %name, "Call succeeded"),
            Err(fault) => warn!(
                procedure = %name,
                kind = %fault.kind(),
                message = %fault.message(),
                "Call raised a fault"
            ),
        }

        self.enter(ConnectionState::Replying);
        self.conn.write_reply(&outcome).await
    }

    async fn close(mut self) {
        self.enter(ConnectionState::Closed);
        if let Err(e) = self.conn.close().await {
            trace!(error = %e, "Error shutting down stream");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "procedure panicked".to_string()
    }
}

/// Runs the single request/reply exchange on `conn` and closes it.
///
/// Returns an error only when no reply could be sent: the request never
/// arrived intact, or the reply could not be written. The stream is released
/// on every path.
pub async fn handle_connection(registry: Arc<Registry>, conn: Connection) -> ServerResult<()> {
    debug!(peer = %conn.peer_addr(), "Handling connection");
    let mut session = Session {
        conn,
        state: ConnectionState::Accepted,
    };

    let result = session.exchange(&registry).await;
    if result.is_err() {
        session.enter(ConnectionState::Faulted);
    }
    session.close().await;
    result
}
