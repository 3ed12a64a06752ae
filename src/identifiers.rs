//! Type-safe identifiers.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AgentId`] | Numeric agent instance selected on the server |
//! | [`RequestKey`] | Correlation key of a file-transfer request |
//!
//! The wire format carries no request IDs, so replies are matched to
//! requests by a key derived from the operation, path and offset.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// AgentId
// ============================================================================

/// Identifier of one agent instance registered under an agent name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(u64);

impl AgentId {
    /// Creates a new agent ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AgentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// RequestKey
// ============================================================================

/// Correlation key of an outstanding file-transfer request.
///
/// Two requests with equal keys cannot be told apart by their replies,
/// so at most one request per key is in flight at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// `FileQueryInfo` answered by `FileInfo`.
    FileInfo {
        /// Remote path.
        path: String,
    },
    /// `FileRead` answered by `FileChunkRead`.
    ReadChunk {
        /// Remote path.
        path: String,
        /// Byte offset of the chunk.
        offset: u64,
    },
    /// `FileWriteOrTruncate` answered by `FileWritten`.
    WriteChunk {
        /// Remote path.
        path: String,
        /// Byte offset of the chunk.
        offset: u64,
    },
}

impl RequestKey {
    /// Key for a file-info query.
    #[inline]
    #[must_use]
    pub fn file_info(path: impl Into<String>) -> Self {
        Self::FileInfo { path: path.into() }
    }

    /// Key for a chunk read.
    #[inline]
    #[must_use]
    pub fn read_chunk(path: impl Into<String>, offset: u64) -> Self {
        Self::ReadChunk {
            path: path.into(),
            offset,
        }
    }

    /// Key for a chunk write or truncate.
    #[inline]
    #[must_use]
    pub fn write_chunk(path: impl Into<String>, offset: u64) -> Self {
        Self::WriteChunk {
            path: path.into(),
            offset,
        }
    }

    /// Returns the remote path this key refers to.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::FileInfo { path }
            | Self::ReadChunk { path, .. }
            | Self::WriteChunk { path, .. } => path,
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileInfo { path } => write!(f, "getFileInfo:{path}"),
            Self::ReadChunk { path, offset } => write!(f, "downloadFileChunk:{path}:{offset}"),
            Self::WriteChunk { path, offset } => write!(f, "uploadFileChunk:{offset}:{path}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
