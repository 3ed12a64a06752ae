//! Frame codec.
//!
//! One WebSocket binary message is one frame: a tag byte followed by a
//! payload whose layout depends on the tag. There is no length prefix.
//!
//! # Layout
//!
//! | Frame | Payload after the tag |
//! |-------|-----------------------|
//! | `PtyWrite` / `PtyData` | raw bytes |
//! | `PtyOpen` | MessagePack [`PtyOpenOptions`] |
//! | `PtyResize` | `cols` u16 LE, `rows` u16 LE |
//! | `FileWriteOrTruncate` | `offset` u64 LE, `length` u64 LE, path, `length` bytes |
//! | `FileQueryInfo` | path |
//! | `FileRead` | `offset` i64 LE, `max_length` u64 LE, path |
//! | `FileWritten` | `offset` u64 LE, path |
//! | `FileInfo` | MessagePack [`FileInfo`] |
//! | `FileChunkRead` | `offset` u64 LE, `length` u64 LE, path, `length` bytes |
//! | `Log` | UTF-8 text |
//!
//! Paths are UTF-8 without a length prefix. Where a frame also carries
//! file data, the explicit `length` field marks where the path ends.

// ============================================================================
// Imports
// ============================================================================

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

use super::message::{RecvMessageType, SendMessageType};
use super::payload::{Chunk, FileInfo, PtyOpenOptions};

// ============================================================================
// Constants
// ============================================================================

/// Length of the tag plus the two u64 fields that open chunk frames.
pub const CHUNK_HEADER_LEN: usize = 17;

/// Length of a `PtyResize` frame.
pub const RESIZE_FRAME_LEN: usize = 5;

// ============================================================================
// SendFrame
// ============================================================================

/// A frame sent from the client to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFrame {
    /// Bytes for PTY stdin.
    PtyWrite(Vec<u8>),
    /// Open the PTY.
    PtyOpen(PtyOpenOptions),
    /// Close the PTY.
    PtyClose,
    /// Resize the PTY.
    PtyResize {
        /// Columns.
        cols: u16,
        /// Rows.
        rows: u16,
    },
    /// Write `chunk` at its offset, or truncate to the offset when empty.
    FileWriteOrTruncate {
        /// Remote path.
        path: String,
        /// Offset and data.
        chunk: Chunk,
    },
    /// Query file metadata.
    FileQueryInfo {
        /// Remote path.
        path: String,
    },
    /// Read up to `max_length` bytes at `offset`.
    FileRead {
        /// Remote path.
        path: String,
        /// Signed on the wire.
        offset: i64,
        /// Upper bound on the returned chunk.
        max_length: u64,
    },
}

impl SendFrame {
    /// Returns the tag of this frame.
    #[must_use]
    pub fn message_type(&self) -> SendMessageType {
        match self {
            Self::PtyWrite(_) => SendMessageType::PtyWrite,
            Self::PtyOpen(_) => SendMessageType::PtyOpen,
            Self::PtyClose => SendMessageType::PtyClose,
            Self::PtyResize { .. } => SendMessageType::PtyResize,
            Self::FileWriteOrTruncate { .. } => SendMessageType::FileWriteOrTruncate,
            Self::FileQueryInfo { .. } => SendMessageType::FileQueryInfo,
            Self::FileRead { .. } => SendMessageType::FileRead,
        }
    }

    /// Encodes the frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MsgpackEncode`] if the PTY options fail to serialize.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size_hint());
        buf.put_u8(self.message_type().as_u8());

        match self {
            Self::PtyWrite(data) => buf.put_slice(data),
            Self::PtyOpen(options) => buf.put_slice(&options.to_msgpack()?),
            Self::PtyClose => {}
            Self::PtyResize { cols, rows } => {
                buf.put_u16_le(*cols);
                buf.put_u16_le(*rows);
            }
            Self::FileWriteOrTruncate { path, chunk } => {
                buf.put_u64_le(chunk.offset);
                buf.put_u64_le(chunk.data.len() as u64);
                buf.put_slice(path.as_bytes());
                buf.put_slice(&chunk.data);
            }
            Self::FileQueryInfo { path } => buf.put_slice(path.as_bytes()),
            Self::FileRead {
                path,
                offset,
                max_length,
            } => {
                buf.put_i64_le(*offset);
                buf.put_u64_le(*max_length);
                buf.put_slice(path.as_bytes());
            }
        }

        Ok(buf)
    }

    /// Decodes a frame as the agent would.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the frame is empty, truncated or has an unknown tag
    /// - [`Error::Codec`] if a path is not UTF-8
    /// - [`Error::MsgpackDecode`] if the PTY options are malformed
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (tag, mut buf) = split_tag(frame)?;
        let Some(kind) = SendMessageType::from_u8(tag) else {
            return Err(Error::protocol(format!("unknown send tag {tag:#04x}")));
        };

        let decoded = match kind {
            SendMessageType::PtyWrite => Self::PtyWrite(buf.to_vec()),
            SendMessageType::PtyOpen => Self::PtyOpen(PtyOpenOptions::from_msgpack(buf)?),
            SendMessageType::PtyClose => Self::PtyClose,
            SendMessageType::PtyResize => {
                ensure_remaining(buf, 4, kind)?;
                Self::PtyResize {
                    cols: buf.get_u16_le(),
                    rows: buf.get_u16_le(),
                }
            }
            SendMessageType::FileWriteOrTruncate => {
                ensure_remaining(buf, 16, kind)?;
                let offset = buf.get_u64_le();
                let length = buf.get_u64_le();
                let (path, data) = split_trailing(buf, length, kind)?;
                Self::FileWriteOrTruncate {
                    path: decode_path(path)?,
                    chunk: Chunk::new(offset, data.to_vec()),
                }
            }
            SendMessageType::FileQueryInfo => Self::FileQueryInfo {
                path: decode_path(buf)?,
            },
            SendMessageType::FileRead => {
                ensure_remaining(buf, 16, kind)?;
                let offset = buf.get_i64_le();
                let max_length = buf.get_u64_le();
                Self::FileRead {
                    path: decode_path(buf)?,
                    offset,
                    max_length,
                }
            }
        };

        Ok(decoded)
    }

    fn size_hint(&self) -> usize {
        1 + match self {
            Self::PtyWrite(data) => data.len(),
            Self::PtyOpen(_) | Self::PtyClose => 0,
            Self::PtyResize { .. } => 4,
            Self::FileWriteOrTruncate { path, chunk } => 16 + path.len() + chunk.data.len(),
            Self::FileQueryInfo { path } => path.len(),
            Self::FileRead { path, .. } => 16 + path.len(),
        }
    }
}

// ============================================================================
// RecvFrame
// ============================================================================

/// A frame received from the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvFrame {
    /// PTY output.
    PtyData(Vec<u8>),
    /// PTY started.
    PtyOpened,
    /// PTY exited.
    PtyClosed,
    /// Write or truncate at `offset` acknowledged.
    FileWritten {
        /// Remote path.
        path: String,
        /// Offset echoed from the request.
        offset: u64,
    },
    /// File metadata.
    FileInfo(FileInfo),
    /// File chunk contents.
    FileChunkRead {
        /// Remote path.
        path: String,
        /// Offset and data; empty data marks end of file.
        chunk: Chunk,
    },
    /// Agent diagnostic text.
    Log(String),
    /// Tag this client does not know.
    Unknown {
        /// Tag byte.
        tag: u8,
        /// Remaining bytes.
        payload: Vec<u8>,
    },
}

impl RecvFrame {
    /// Returns the tag byte of this frame.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Self::PtyData(_) => RecvMessageType::PtyData.as_u8(),
            Self::PtyOpened => RecvMessageType::PtyOpened.as_u8(),
            Self::PtyClosed => RecvMessageType::PtyClosed.as_u8(),
            Self::FileWritten { .. } => RecvMessageType::FileWritten.as_u8(),
            Self::FileInfo(_) => RecvMessageType::FileInfo.as_u8(),
            Self::FileChunkRead { .. } => RecvMessageType::FileChunkRead.as_u8(),
            Self::Log(_) => RecvMessageType::Log.as_u8(),
            Self::Unknown { tag, .. } => *tag,
        }
    }

    /// Decodes an inbound frame.
    ///
    /// Unrecognized tags decode to [`RecvFrame::Unknown`] rather than failing.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the frame is empty or truncated
    /// - [`Error::Codec`] if a path is not UTF-8
    /// - [`Error::MsgpackDecode`] if the file metadata is malformed
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (tag, mut buf) = split_tag(frame)?;
        let Some(kind) = RecvMessageType::from_u8(tag) else {
            return Ok(Self::Unknown {
                tag,
                payload: buf.to_vec(),
            });
        };

        let decoded = match kind {
            RecvMessageType::PtyData => Self::PtyData(buf.to_vec()),
            RecvMessageType::PtyOpened => Self::PtyOpened,
            RecvMessageType::PtyClosed => Self::PtyClosed,
            RecvMessageType::FileWritten => {
                ensure_remaining(buf, 8, kind)?;
                let offset = buf.get_u64_le();
                Self::FileWritten {
                    path: decode_path(buf)?,
                    offset,
                }
            }
            RecvMessageType::FileInfo => Self::FileInfo(FileInfo::from_msgpack(buf)?),
            RecvMessageType::FileChunkRead => {
                ensure_remaining(buf, 16, kind)?;
                let offset = buf.get_u64_le();
                let length = buf.get_u64_le();
                let (path, data) = split_trailing(buf, length, kind)?;
                Self::FileChunkRead {
                    path: decode_path(path)?,
                    chunk: Chunk::new(offset, data.to_vec()),
                }
            }
            RecvMessageType::Log => Self::Log(String::from_utf8_lossy(buf).into_owned()),
        };

        Ok(decoded)
    }

    /// Encodes the frame as the agent would.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MsgpackEncode`] if the file metadata fails to serialize.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.put_u8(self.tag());

        match self {
            Self::PtyData(data) => buf.put_slice(data),
            Self::PtyOpened | Self::PtyClosed => {}
            Self::FileWritten { path, offset } => {
                buf.put_u64_le(*offset);
                buf.put_slice(path.as_bytes());
            }
            Self::FileInfo(info) => buf.put_slice(&info.to_msgpack()?),
            Self::FileChunkRead { path, chunk } => {
                buf.reserve(CHUNK_HEADER_LEN - 1 + path.len() + chunk.data.len());
                buf.put_u64_le(chunk.offset);
                buf.put_u64_le(chunk.data.len() as u64);
                buf.put_slice(path.as_bytes());
                buf.put_slice(&chunk.data);
            }
            Self::Log(text) => buf.put_slice(text.as_bytes()),
            Self::Unknown { payload, .. } => buf.put_slice(payload),
        }

        Ok(buf)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Splits off the tag byte.
fn split_tag(frame: &[u8]) -> Result<(u8, &[u8])> {
    match frame.split_first() {
        Some((tag, rest)) => Ok((*tag, rest)),
        None => Err(Error::protocol("empty frame")),
    }
}

/// Fails unless `buf` holds at least `needed` bytes.
fn ensure_remaining(buf: &[u8], needed: usize, kind: impl std::fmt::Display) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::protocol(format!(
            "{kind} frame truncated: need {needed} bytes after tag, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

/// Splits `buf` into the path and a trailing payload of `length` bytes.
fn split_trailing(buf: &[u8], length: u64, kind: impl std::fmt::Display) -> Result<(&[u8], &[u8])> {
    let length = usize::try_from(length)
        .ok()
        .filter(|length| *length <= buf.len())
        .ok_or_else(|| {
            Error::protocol(format!(
                "{kind} payload length {length} exceeds {} remaining bytes",
                buf.len()
            ))
        })?;

    Ok(buf.split_at(buf.len() - length))
}

/// Decodes a UTF-8 path.
fn decode_path(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::codec(format!("path is not valid UTF-8: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
