//! Pending request table for file operations.
//!
//! Replies to file requests carry no request id; they are matched by a
//! [`RequestKey`] derived from the reply itself. Requests sharing a key
//! queue behind each other in a per-key lane, so at most one entry per key
//! is ever in flight.
//!
//! | Reply frame | Key |
//! |-------------|-----|
//! | `FileInfo` | `FileInfo { path }` |
//! | `FileChunkRead` | `ReadChunk { path, offset }` |
//! | `FileWritten` | `WriteChunk { path, offset }` |
//!
//! Each entry remembers the socket generation its request went out on;
//! a closing socket fails only its own entries.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{OwnedMutexGuard, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::RequestKey;
use crate::protocol::{Chunk, FileInfo, RecvFrame, SendFrame};
use crate::transport::{Connection, FrameHandler};

// ============================================================================
// Types
// ============================================================================

/// Reply channel of one request, typed by the reply it waits for.
pub(crate) enum ReplySender {
    Info(oneshot::Sender<FileInfo>),
    Chunk(oneshot::Sender<Chunk>),
    Written(oneshot::Sender<()>),
}

/// A value a file request resolves to.
pub(crate) trait FileReply: Send + Sized + 'static {
    /// Wraps the reply channel for storage in the table.
    fn sender(tx: oneshot::Sender<Self>) -> ReplySender;
}

impl FileReply for FileInfo {
    fn sender(tx: oneshot::Sender<Self>) -> ReplySender {
        ReplySender::Info(tx)
    }
}

impl FileReply for Chunk {
    fn sender(tx: oneshot::Sender<Self>) -> ReplySender {
        ReplySender::Chunk(tx)
    }
}

impl FileReply for () {
    fn sender(tx: oneshot::Sender<Self>) -> ReplySender {
        ReplySender::Written(tx)
    }
}

/// One request awaiting its reply.
struct Entry {
    /// Generation of the socket the request was sent on.
    generation: u64,
    sender: ReplySender,
}

/// FIFO lane serializing requests that share a key.
type Lane = Arc<tokio::sync::Mutex<()>>;

// ============================================================================
// PendingRequests
// ============================================================================

/// In-flight file requests keyed by their reply key.
#[derive(Default)]
pub(crate) struct PendingRequests {
    /// Reply senders, one per key at most.
    in_flight: Mutex<FxHashMap<RequestKey, Entry>>,
    /// Lanes for keys that have a request queued or in flight.
    lanes: Mutex<FxHashMap<RequestKey, Lane>>,
}

impl PendingRequests {
    /// Creates an empty table.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the number of requests awaiting a reply.
    pub(crate) fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Sends `frame` and waits for the reply matching `key`.
    ///
    /// Waits for earlier requests with the same key first. Dropping the
    /// returned future frees the table entry.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the socket is not open
    /// - [`Error::RequestTimeout`] if no reply arrives within `deadline`
    /// - [`Error::ConnectionClosed`] if the socket closes first
    pub(crate) async fn request<R: FileReply>(
        &self,
        connection: &Connection,
        key: RequestKey,
        frame: &SendFrame,
        deadline: Option<Duration>,
    ) -> Result<R> {
        let bytes = frame.encode()?;
        let lane = self.lane(&key);
        let turn = lane.lock_owned().await;

        let (reply_tx, reply_rx) = oneshot::channel();
        let ticket = Ticket {
            pending: self,
            key,
            turn: Some(turn),
        };

        // Held across the send so a reply or a disconnect cannot run
        // before the entry exists.
        let generation = {
            let mut in_flight = self.in_flight.lock();
            let generation = connection.try_send(bytes)?;
            let entry = Entry {
                generation,
                sender: R::sender(reply_tx),
            };
            if in_flight.insert(ticket.key.clone(), entry).is_some() {
                debug!(key = %ticket.key, "Replaced stale pending entry");
            }
            generation
        };
        trace!(key = %ticket.key, generation, "Request sent");

        let reply = match deadline {
            Some(deadline) => match timeout(deadline, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    debug!(key = %ticket.key, "Request timed out");
                    return Err(Error::request_timeout(
                        ticket.key.clone(),
                        deadline.as_millis() as u64,
                    ));
                }
            },
            None => reply_rx.await,
        };

        reply.map_err(|_| Error::ConnectionClosed)
    }

    /// Returns the lane for `key`, creating it if needed.
    fn lane(&self, key: &RequestKey) -> Lane {
        let mut lanes = self.lanes.lock();
        Arc::clone(lanes.entry(key.clone()).or_default())
    }

    /// Removes the entry for `key` and releases its lane.
    fn release(&self, key: &RequestKey, turn: Option<OwnedMutexGuard<()>>) {
        self.in_flight.lock().remove(key);
        drop(turn);

        let mut lanes = self.lanes.lock();
        if let Some(lane) = lanes.get(key)
            && Arc::strong_count(lane) == 1
        {
            lanes.remove(key);
        }
    }
}

impl FrameHandler for PendingRequests {
    fn handle(&self, frame: &RecvFrame) -> bool {
        let key = match frame {
            RecvFrame::FileInfo(info) => RequestKey::file_info(&info.path),
            RecvFrame::FileChunkRead { path, chunk } => RequestKey::read_chunk(path, chunk.offset),
            RecvFrame::FileWritten { path, offset } => RequestKey::write_chunk(path, *offset),
            _ => return false,
        };

        let Some(entry) = self.in_flight.lock().remove(&key) else {
            debug!(%key, "Reply without pending request dropped");
            return true;
        };

        // The key variant fixes the reply kind, so the pair always matches.
        let delivered = match (entry.sender, frame) {
            (ReplySender::Info(tx), RecvFrame::FileInfo(info)) => tx.send(info.clone()).is_ok(),
            (ReplySender::Chunk(tx), RecvFrame::FileChunkRead { chunk, .. }) => {
                tx.send(chunk.clone()).is_ok()
            }
            (ReplySender::Written(tx), RecvFrame::FileWritten { .. }) => tx.send(()).is_ok(),
            _ => false,
        };
        if !delivered {
            trace!(%key, "Requester went away");
        }

        true
    }

    fn disconnected(&self, generation: u64) {
        let mut in_flight = self.in_flight.lock();
        let before = in_flight.len();
        in_flight.retain(|_, entry| entry.generation != generation);

        let failed = before - in_flight.len();
        if failed > 0 {
            debug!(count = failed, generation, "Failing in-flight requests");
        }
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// Holds a lane turn; frees the table entry on drop.
struct Ticket<'a> {
    pending: &'a PendingRequests,
    key: RequestKey,
    turn: Option<OwnedMutexGuard<()>>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.pending.release(&self.key, self.turn.take());
    }
}

// ============================================================================
// Tests
// ============================================================================
