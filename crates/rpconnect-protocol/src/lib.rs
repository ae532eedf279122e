//! Wire protocol for rpconnect remote calls.
//!
//! A single request/reply exchange happens per connection. Both directions
//! use the same framing:
//!
//! - 16 bytes: payload length (u128, little-endian)
//! - N bytes: UTF-8 JSON payload
//!
//! # Envelopes
//!
//! Requests carry the name of a registered procedure plus its positional and
//! keyword arguments. Replies are tagged with `"type"`: either a `"result"`
//! with its `content`, or an `"error"` carrying the fault kind and message.
//!
//! # Example
//!
//! ```rust
//! use rpconnect_protocol::{decode_request, encode_request};
//! use serde_json::{Map, json};
//!
//! let bytes = encode_request("add", &[json!(2), json!(3)], &Map::new()).unwrap();
//! let request = decode_request(&bytes).unwrap();
//! assert_eq!(request.name, "add");
//! ```

mod envelope;
mod error;
mod fault;
mod framing;

pub use envelope::{Reply, Request, decode_reply, decode_request, encode_reply, encode_request};
pub use error::{ProtocolError, ProtocolResult};
pub use fault::{Fault, FaultKind};
pub use framing::{
    FrameReader, FrameWriter, decode_frame, encode_frame, read_frame, write_frame,
};

/// Width of the length prefix in bytes.
pub const PREFIX_LEN: usize = 16;

/// Default upper bound for a single frame payload (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
