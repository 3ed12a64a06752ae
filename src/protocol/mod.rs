//! Agent link wire protocol.
//!
//! This module defines the binary frames exchanged with the remote agent.
//!
//! # Protocol Overview
//!
//! | Direction | Frames |
//! |-----------|--------|
//! | Client → Agent | `PtyWrite`, `PtyOpen`, `PtyClose`, `PtyResize`, `FileWriteOrTruncate`, `FileQueryInfo`, `FileRead` |
//! | Agent → Client | `PtyData`, `PtyOpened`, `PtyClosed`, `FileWritten`, `FileInfo`, `FileChunkRead`, `Log` |
//!
//! Integers are little-endian. Structured payloads are MessagePack maps.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame encode/decode |
//! | `message` | Tag enumerations |
//! | `payload` | MessagePack payloads and chunks |

// ============================================================================
// Submodules
// ============================================================================

/// Frame encode/decode.
pub mod frame;

/// Message-type tags.
pub mod message;

/// Structured payloads.
pub mod payload;

mod proptest;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{CHUNK_HEADER_LEN, RESIZE_FRAME_LEN, RecvFrame, SendFrame};
pub use message::{RecvMessageType, SendMessageType};
pub use payload::{Chunk, FileInfo, PtyOpenOptions};
