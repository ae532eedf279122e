//! Single-shot client for rpconnect servers.
//!
//! ```rust,no_run
//! use rpconnect_client::RpcClient;
//!
//! # async fn example() -> rpconnect_client::ClientResult<()> {
//! let client = RpcClient::new("localhost", 23000);
//! let sum: i64 = client.request("add").arg(2).kwarg("b", 3).send_as().await?;
//! assert_eq!(sum, 5);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod socket;

pub use error::{ClientError, ClientResult};
pub use socket::{CallBuilder, RpcClient, remote_call};

pub use rpconnect_protocol::{Fault, FaultKind};
