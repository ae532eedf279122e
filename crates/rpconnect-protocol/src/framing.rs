//! Length-prefixed framing over byte streams.
//!
//! Every frame is a 16-byte little-endian length prefix followed by exactly
//! that many payload bytes:
//!
//! ```text
//! +-------------------+------------------+
//! | length (16 LE)    |  payload         |
//! +-------------------+------------------+
//! ```
//!
//! A frame cut short by the peer is always an error, never a shorter frame.

use std::io::{ErrorKind, Read, Write};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};
use crate::{DEFAULT_MAX_FRAME_SIZE, PREFIX_LEN};

/// Encodes a payload into a complete frame.
///
/// # Example
///
/// ```rust
/// use rpconnect_protocol::{PREFIX_LEN, encode_frame};
///
/// let frame = encode_frame(b"hello");
/// assert_eq!(frame.len(), PREFIX_LEN + 5);
/// assert_eq!(frame[0], 5);
/// ```
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(PREFIX_LEN + payload.len());
    buffer.extend_from_slice(&(payload.len() as u128).to_le_bytes());
    buffer.extend_from_slice(payload);
    buffer
}

/// Extracts the payload from a complete frame held in memory.
///
/// Bytes after the declared payload are ignored.
pub fn decode_frame(data: &[u8]) -> ProtocolResult<&[u8]> {
    if data.len() < PREFIX_LEN {
        return Err(ProtocolError::IncompleteFrame {
            expected: PREFIX_LEN,
            received: data.len(),
        });
    }

    let (prefix, rest) = data.split_at(PREFIX_LEN);
    let mut len_bytes = [0u8; PREFIX_LEN];
    len_bytes.copy_from_slice(prefix);
    let declared = u128::from_le_bytes(len_bytes);

    if declared > rest.len() as u128 {
        return Err(ProtocolError::IncompleteFrame {
            expected: usize::try_from(declared).unwrap_or(usize::MAX),
            received: rest.len(),
        });
    }

    Ok(&rest[..declared as usize])
}

/// Validates a decoded prefix against the maximum frame size.
fn payload_len(prefix: [u8; PREFIX_LEN], max_frame_size: usize) -> ProtocolResult<usize> {
    let declared = u128::from_le_bytes(prefix);
    if declared > max_frame_size as u128 {
        return Err(ProtocolError::FrameTooLarge {
            size: declared,
            max: max_frame_size,
        });
    }
    Ok(declared as usize)
}

/// Maps the number of prefix bytes received to an error when short.
fn check_prefix(received: usize) -> ProtocolResult<()> {
    match received {
        PREFIX_LEN => Ok(()),
        0 => Err(ProtocolError::ConnectionClosed),
        received => Err(ProtocolError::IncompleteFrame {
            expected: PREFIX_LEN,
            received,
        }),
    }
}

async fn fill_async<R>(reader: &mut R, buf: &mut [u8]) -> ProtocolResult<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn fill_sync<R: Read>(reader: &mut R, buf: &mut [u8]) -> ProtocolResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Reads one complete frame from an async stream.
///
/// Accumulates across partial reads until the declared length has arrived.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> ProtocolResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; PREFIX_LEN];
    check_prefix(fill_async(reader, &mut prefix).await?)?;

    let len = payload_len(prefix, max_frame_size)?;
    let mut payload = vec![0u8; len];
    let received = fill_async(reader, &mut payload).await?;
    if received < len {
        return Err(ProtocolError::IncompleteFrame {
            expected: len,
            received,
        });
    }

    Ok(payload)
}

/// Writes one frame to an async stream and flushes it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_frame(payload)).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads frames from a blocking byte stream.
pub struct FrameReader<R> {
    reader: R,
    max_frame_size: usize,
}

impl<R: Read> FrameReader<R> {
    /// Creates a new FrameReader with the default maximum frame size.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Builder: set the maximum accepted payload size.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Reads a single frame, blocking until it is complete.
    pub fn read_frame(&mut self) -> ProtocolResult<Vec<u8>> {
        let mut prefix = [0u8; PREFIX_LEN];
        check_prefix(fill_sync(&mut self.reader, &mut prefix)?)?;

        let len = payload_len(prefix, self.max_frame_size)?;
        let mut payload = vec![0u8; len];
        let received = fill_sync(&mut self.reader, &mut payload)?;
        if received < len {
            return Err(ProtocolError::IncompleteFrame {
                expected: len,
                received,
            });
        }

        Ok(payload)
    }
}

/// Writes frames to a blocking byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a new FrameWriter wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a single frame and flushes the underlying writer.
    pub fn write_frame(&mut self, payload: &[u8]) -> ProtocolResult<()> {
        self.writer.write_all(&encode_frame(payload))?;
        self.writer.flush()?;
        Ok(())
    }
}
