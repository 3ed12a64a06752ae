//! Extension points of the connection.
//!
//! | Trait | Receives |
//! |-------|----------|
//! | [`TerminalSink`] | PTY output and status lines |
//! | [`FrameHandler`] | Every other inbound frame, in a chain |

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::RecvFrame;

// ============================================================================
// TerminalSink
// ============================================================================

/// Consumer of terminal output.
///
/// Receives raw `PtyData` bytes and human-readable status lines. The bytes
/// are not interpreted; escape sequences pass through untouched.
///
/// Implemented for closures, which makes forwarding into a channel a
/// one-liner:
///
/// ```
/// use std::sync::Arc;
/// use agent_link::TerminalSink;
///
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
/// let sink: Arc<dyn TerminalSink> = Arc::new(move |data: &[u8]| {
///     let _ = tx.send(data.to_vec());
/// });
///
/// sink.write(b"hello");
/// assert_eq!(rx.try_recv().unwrap(), b"hello");
/// ```
pub trait TerminalSink: Send + Sync {
    /// Writes bytes to the terminal.
    fn write(&self, data: &[u8]);
}

impl<F> TerminalSink for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn write(&self, data: &[u8]) {
        self(data);
    }
}

// ============================================================================
// FrameHandler
// ============================================================================

/// A link in the inbound dispatch chain.
///
/// Handlers see every frame that is not PTY output, a PTY status or a log
/// line, in registration order. The first handler returning `true` claims
/// the frame; unclaimed frames are dropped.
pub trait FrameHandler: Send + Sync {
    /// Handles a frame, returning `true` if it was claimed.
    fn handle(&self, frame: &RecvFrame) -> bool;

    /// Called once when the socket of `generation` closes.
    ///
    /// Generations count successful opens of the connection, starting at 1.
    /// A newer socket may already be open when an older one reports.
    fn disconnected(&self, generation: u64) {
        let _ = generation;
    }
}

impl<F> FrameHandler for F
where
    F: Fn(&RecvFrame) -> bool + Send + Sync,
{
    fn handle(&self, frame: &RecvFrame) -> bool {
        self(frame)
    }
}

// ============================================================================
// Tests
// ============================================================================
