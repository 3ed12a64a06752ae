//! Services running over the agent link.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Pty`] | Remote pseudo-terminal control |
//! | [`FileTransfer`] | Chunked file download and upload |
//! | [`DownloadedFile`] | Result of a full download |
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `pty` | PTY control frames |
//! | `fs` | File primitives and composite transfers |
//! | `pending` | Reply correlation and per-key lanes |

// ============================================================================
// Submodules
// ============================================================================

mod fs;
mod pending;
mod pty;

// ============================================================================
// Re-exports
// ============================================================================

pub use fs::{DEFAULT_CHUNK_SIZE, DEFAULT_REQUEST_TIMEOUT, DownloadedFile, FileTransfer};
pub use pty::Pty;
