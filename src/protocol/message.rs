//! Message-type tags.
//!
//! Byte 0 of every frame selects the message type. The two directions use
//! separate enumerations that happen to share numeric values.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// SendMessageType
// ============================================================================

/// Tags of frames sent to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SendMessageType {
    /// Bytes for PTY stdin.
    PtyWrite = 0x00,
    /// Open the PTY with MessagePack options.
    PtyOpen = 0x01,
    /// Close the PTY.
    PtyClose = 0x02,
    /// Resize the PTY.
    PtyResize = 0x03,
    /// Write a file chunk, or truncate when the chunk is empty.
    FileWriteOrTruncate = 0x10,
    /// Query file metadata.
    FileQueryInfo = 0x11,
    /// Read a file chunk.
    FileRead = 0x12,
}

impl SendMessageType {
    /// Returns the tag byte.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a tag byte.
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::PtyWrite),
            0x01 => Some(Self::PtyOpen),
            0x02 => Some(Self::PtyClose),
            0x03 => Some(Self::PtyResize),
            0x10 => Some(Self::FileWriteOrTruncate),
            0x11 => Some(Self::FileQueryInfo),
            0x12 => Some(Self::FileRead),
            _ => None,
        }
    }
}

impl fmt::Display for SendMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// RecvMessageType
// ============================================================================

/// Tags of frames received from the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecvMessageType {
    /// PTY output.
    PtyData = 0x00,
    /// PTY started.
    PtyOpened = 0x01,
    /// PTY exited; the connection stays up.
    PtyClosed = 0x02,
    /// Write or truncate acknowledged.
    FileWritten = 0x10,
    /// MessagePack file metadata.
    FileInfo = 0x11,
    /// File chunk contents.
    FileChunkRead = 0x12,
    /// Diagnostic text from the agent.
    Log = 0xFF,
}

impl RecvMessageType {
    /// Returns the tag byte.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a tag byte.
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::PtyData),
            0x01 => Some(Self::PtyOpened),
            0x02 => Some(Self::PtyClosed),
            0x10 => Some(Self::FileWritten),
            0x11 => Some(Self::FileInfo),
            0x12 => Some(Self::FileChunkRead),
            0xFF => Some(Self::Log),
            _ => None,
        }
    }

    /// Returns `true` for tags the connection handles itself.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::PtyData | Self::PtyOpened | Self::PtyClosed | Self::Log
        )
    }
}

impl fmt::Display for RecvMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Tests
// ============================================================================
