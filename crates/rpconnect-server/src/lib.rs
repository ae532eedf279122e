//! Procedure registry, call dispatcher and TCP connection server.
//!
//! The server accepts connections on a TCP socket and handles each one in
//! its own task: read one framed request, dispatch it to the registered
//! procedure, write one framed reply, close.
//!
//! # Example
//!
//! ```rust,no_run
//! use rpconnect_server::{Arguments, Fault, RpcServer, ServerConfig};
//!
//! fn add(args: Arguments) -> Result<i64, Fault> {
//!     Ok(args.arg::<i64>(0, "a")? + args.arg::<i64>(1, "b")?)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = RpcServer::bind(ServerConfig::default())?;
//!     server.register_fn(add)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod dispatch;
mod error;
mod handler;
mod registry;
mod socket;
pub mod tracing;

pub use config::{DEFAULT_PORT, ServerConfig};
pub use dispatch::dispatch;
pub use error::{ServerError, ServerResult};
pub use handler::handle_connection;
pub use registry::{Arguments, Procedure, ProcedureFuture, Registry};
pub use socket::{Connection, RpcServer};

pub use rpconnect_protocol::{Fault, FaultKind};
