//! WebSocket connection and event loop.
//!
//! This module owns the single WebSocket to the agent, including the
//! connect lifecycle and inbound frame routing.
//!
//! # Event Loop
//!
//! Once open, the connection spawns a tokio task that handles:
//!
//! - Incoming frames from the agent, strictly in arrival order
//! - Outgoing frames from the Rust API
//! - PTY output and status lines written to the terminal sink
//! - The handler chain for every other frame
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──connect()──► Connecting ──open──► Open
//!  ▲                      │                 │
//!  └──────── error ───────┘◄── close/error ─┘
//! ```
//!
//! `close()` moves to `Closed`; a later `connect()` may reopen. There is no
//! automatic reconnect.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{RecvFrame, SendFrame};

use super::handler::{FrameHandler, TerminalSink};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for opening the socket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracing target for agent `Log` frames.
pub const AGENT_LOG_TARGET: &str = "agent_link::agent";

// ============================================================================
// Types
// ============================================================================

/// In-flight connect attempt shared by every caller of `connect()`.
type ConnectFuture = Shared<BoxFuture<'static, StdResult<(), ConnectFailure>>>;

/// Cloneable outcome of a failed connect attempt.
#[derive(Debug, Clone)]
enum ConnectFailure {
    Timeout { timeout_ms: u64 },
    Failed { message: String },
    Aborted,
}

impl From<ConnectFailure> for Error {
    fn from(failure: ConnectFailure) -> Self {
        match failure {
            ConnectFailure::Timeout { timeout_ms } => Error::connection_timeout(timeout_ms),
            ConnectFailure::Failed { message } => Error::connection(message),
            ConnectFailure::Aborted => Error::connection("closed while connecting"),
        }
    }
}

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write one frame.
    Send(Vec<u8>),
    /// Close the socket.
    Shutdown,
}

/// Internal lifecycle state.
enum LinkState {
    Idle,
    Connecting {
        attempt: u64,
        future: ConnectFuture,
    },
    Open {
        generation: u64,
        command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    },
    Closed,
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Observable lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; `connect()` will open one.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// The socket is open.
    Open,
    /// Closed by `close()`.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Status Lines
// ============================================================================

/// Human-readable notices written to the terminal sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Connected,
    ConnectionClosed,
    PtyOpened,
    PtyClosed,
}

impl Status {
    /// Formats the notice with an ANSI-highlighted agent label.
    pub(crate) fn line(self, label: &str) -> String {
        let (color, text) = match self {
            Self::Connected => (32, "Connected"),
            Self::ConnectionClosed => (31, "Connection Closed"),
            Self::PtyOpened => (32, "Pty Opened"),
            Self::PtyClosed => (31, "Pty Closed, connection intact."),
        };
        format!("\x1B[1;3;{color}m[{label}]\x1B[0m {text}\r\n")
    }
}

// ============================================================================
// ConnectionInner
// ============================================================================

/// State shared between the handles and the event loop.
struct ConnectionInner {
    /// Full endpoint URL, including the API key.
    url: Url,
    /// Agent name used in status lines.
    label: String,
    /// Deadline for opening the socket.
    connect_timeout: Duration,
    /// Lifecycle state.
    state: Mutex<LinkState>,
    /// Incremented on every `connect()` that starts a new attempt.
    attempts: AtomicU64,
    /// Incremented on every successful open.
    generation: AtomicU64,
    /// Handler chain, in registration order.
    handlers: RwLock<Vec<Arc<dyn FrameHandler>>>,
    /// Attached terminal, if any.
    sink: RwLock<Option<Arc<dyn TerminalSink>>>,
}

impl ConnectionInner {
    /// Routes one inbound frame.
    fn dispatch(&self, data: &[u8]) {
        let frame = match RecvFrame::decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, len = data.len(), "Dropping malformed frame");
                return;
            }
        };

        match frame {
            RecvFrame::PtyData(bytes) => self.write_term(&bytes),
            RecvFrame::PtyOpened => {
                debug!(agent = %self.label, "PTY opened");
                self.write_status(Status::PtyOpened);
            }
            RecvFrame::PtyClosed => {
                debug!(agent = %self.label, "PTY closed");
                self.write_status(Status::PtyClosed);
            }
            RecvFrame::Log(text) => {
                info!(target: AGENT_LOG_TARGET, agent = %self.label, "{text}");
            }
            frame => self.dispatch_to_handlers(&frame),
        }
    }

    /// Offers a frame to each handler until one claims it.
    fn dispatch_to_handlers(&self, frame: &RecvFrame) {
        let handlers = self.handlers.read().clone();

        if !handlers.iter().any(|handler| handler.handle(frame)) {
            trace!(tag = frame.tag(), "Unhandled frame dropped");
        }
    }

    fn write_term(&self, data: &[u8]) {
        if let Some(sink) = self.sink.read().as_ref() {
            sink.write(data);
        }
    }

    fn write_status(&self, status: Status) {
        self.write_term(status.line(&self.label).as_bytes());
    }

    /// Installs an opened socket and starts its event loop.
    ///
    /// Only the attempt currently recorded in the state may install its
    /// socket; an attempt abandoned by `close()` drops it instead.
    fn attach<S>(
        self: &Arc<Self>,
        attempt: u64,
        ws_stream: WebSocketStream<S>,
    ) -> StdResult<(), ConnectFailure>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let generation = {
            let mut state = self.state.lock();
            if !state.is_attempt(attempt) {
                debug!(attempt, "Connect attempt abandoned, dropping socket");
                return Err(ConnectFailure::Aborted);
            }

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let (command_tx, command_rx) = mpsc::unbounded_channel();
            *state = LinkState::Open {
                generation,
                command_tx,
            };

            tokio::spawn(run_event_loop(
                ws_stream,
                command_rx,
                Arc::downgrade(self),
                generation,
            ));

            generation
        };

        info!(agent = %self.label, generation, "Agent link open");
        self.write_status(Status::Connected);
        Ok(())
    }

    /// Returns to idle after a failed attempt unless it was abandoned.
    fn reset_after_failure(&self, attempt: u64) {
        let mut state = self.state.lock();
        if state.is_attempt(attempt) {
            *state = LinkState::Idle;
        }
    }

    /// Called by the event loop once its socket is gone.
    fn on_socket_closed(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if let LinkState::Open {
                generation: current,
                ..
            } = &*state
                && *current == generation
            {
                *state = LinkState::Idle;
            }
        }

        info!(agent = %self.label, generation, "Agent link closed");
        self.write_status(Status::ConnectionClosed);

        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler.disconnected(generation);
        }
    }
}

impl LinkState {
    /// Returns `true` if `attempt` is the connect attempt in flight.
    fn is_attempt(&self, attempt: u64) -> bool {
        matches!(self, Self::Connecting { attempt: current, .. } if *current == attempt)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// The one WebSocket link to an agent.
///
/// Cheap to clone; every clone drives the same socket.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. Inbound frames are processed one at a
/// time by the event loop, so handlers never run concurrently.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &redact(&self.inner.url))
            .field("agent", &self.inner.label)
            .field("state", &format_args!("{}", self.state()))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructor
// ============================================================================

impl Connection {
    /// Creates an idle connection to `url`.
    ///
    /// Nothing is opened until [`Connection::connect`] is called.
    pub(crate) fn new(url: Url, label: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                url,
                label: label.into(),
                connect_timeout,
                state: Mutex::new(LinkState::Idle),
                attempts: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                handlers: RwLock::new(Vec::new()),
                sink: RwLock::new(None),
            }),
        }
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Opens the socket, or joins the attempt already in flight.
    ///
    /// Returns immediately when already open. A failed attempt resets the
    /// connection so the next call starts fresh. An attempt abandoned by
    /// [`Connection::close`] fails for the callers that joined it, even if
    /// its handshake completes later.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the socket cannot be opened
    /// - [`Error::ConnectionTimeout`] if opening exceeds the connect timeout
    pub async fn connect(&self) -> Result<()> {
        let future = {
            let mut state = self.inner.state.lock();
            match &*state {
                LinkState::Open { .. } => return Ok(()),
                LinkState::Connecting { future, .. } => future.clone(),
                LinkState::Idle | LinkState::Closed => {
                    let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = open_socket(Arc::downgrade(&self.inner), attempt)
                        .boxed()
                        .shared();
                    *state = LinkState::Connecting {
                        attempt,
                        future: future.clone(),
                    };
                    future
                }
            }
        };

        future.await.map_err(Error::from)
    }

    /// Writes a raw frame.
    ///
    /// Silently does nothing when the socket is not open; this is not a queue.
    pub fn send(&self, frame: impl Into<Vec<u8>>) {
        if let Err(e) = self.try_send(frame.into()) {
            trace!(error = %e, "Frame dropped");
        }
    }

    /// Encodes and writes a frame with the same semantics as [`Connection::send`].
    pub fn send_frame(&self, frame: &SendFrame) {
        match frame.encode() {
            Ok(bytes) => self.send(bytes),
            Err(e) => warn!(error = %e, kind = %frame.message_type(), "Failed to encode frame"),
        }
    }

    /// Registers a handler at the end of the chain.
    pub fn add_message_handler<H>(&self, handler: H)
    where
        H: FrameHandler + 'static,
    {
        self.add_shared_handler(Arc::new(handler));
    }

    /// Registers an already shared handler at the end of the chain.
    pub fn add_shared_handler(&self, handler: Arc<dyn FrameHandler>) {
        let mut handlers = self.inner.handlers.write();
        handlers.push(handler);
        debug!(count = handlers.len(), "Message handler registered");
    }

    /// Attaches or detaches the terminal sink.
    ///
    /// Detaching leaves the socket and the remote PTY running.
    pub fn set_term(&self, sink: Option<Arc<dyn TerminalSink>>) {
        *self.inner.sink.write() = sink;
    }

    /// Closes the socket. Registered handlers stay in place.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), LinkState::Closed);

        match previous {
            LinkState::Open { command_tx, .. } => {
                debug!(agent = %self.inner.label, "Closing agent link");
                let _ = command_tx.send(ConnectionCommand::Shutdown);
            }
            LinkState::Connecting { attempt, .. } => {
                debug!(agent = %self.inner.label, attempt, "Abandoning connect attempt");
            }
            LinkState::Idle | LinkState::Closed => {}
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match &*self.inner.state.lock() {
            LinkState::Idle => ConnectionState::Idle,
            LinkState::Connecting { .. } => ConnectionState::Connecting,
            LinkState::Open { .. } => ConnectionState::Open,
            LinkState::Closed => ConnectionState::Closed,
        }
    }

    /// Returns `true` while the socket is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the agent name.
    #[inline]
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.inner.label
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.read().len()
    }
}

// ============================================================================
// Connection - Internal
// ============================================================================

impl Connection {
    /// Writes a raw frame, failing when the socket is not open.
    ///
    /// Returns the generation of the socket the frame was queued on.
    pub(crate) fn try_send(&self, frame: Vec<u8>) -> Result<u64> {
        match &*self.inner.state.lock() {
            LinkState::Open {
                generation,
                command_tx,
            } => command_tx
                .send(ConnectionCommand::Send(frame))
                .map(|()| *generation)
                .map_err(|_| Error::ConnectionClosed),
            _ => Err(Error::NotConnected),
        }
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Opens the socket for connect attempt `attempt` of the connection behind `inner`.
async fn open_socket(inner: Weak<ConnectionInner>, attempt: u64) -> StdResult<(), ConnectFailure> {
    let Some((url, connect_timeout)) = inner
        .upgrade()
        .map(|inner| (inner.url.clone(), inner.connect_timeout))
    else {
        return Err(ConnectFailure::Aborted);
    };

    debug!(endpoint = %redact(&url), attempt, "Connecting to agent");
    let result = timeout(connect_timeout, connect_async(url.as_str())).await;

    let Some(inner) = inner.upgrade() else {
        return Err(ConnectFailure::Aborted);
    };

    match result {
        Ok(Ok((ws_stream, _response))) => inner.attach(attempt, ws_stream),
        Ok(Err(e)) => {
            warn!(endpoint = %redact(&url), error = %e, "Agent connection failed");
            inner.reset_after_failure(attempt);
            Err(ConnectFailure::Failed {
                message: e.to_string(),
            })
        }
        Err(_) => {
            let timeout_ms = connect_timeout.as_millis() as u64;
            warn!(endpoint = %redact(&url), timeout_ms, "Agent connection timed out");
            inner.reset_after_failure(attempt);
            Err(ConnectFailure::Timeout { timeout_ms })
        }
    }
}

/// Event loop that handles WebSocket I/O for one socket.
async fn run_event_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    inner: Weak<ConnectionInner>,
    generation: u64,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the agent
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Binary(data))) => {
                        let Some(inner) = inner.upgrade() else {
                            break;
                        };
                        inner.dispatch(&data);
                    }

                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Ignoring text message");
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by agent");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ping/Pong are answered by tungstenite
                    _ => {}
                }
            }

            // Frames from the Rust API
            command = command_rx.recv() => {
                match command {
                    Some(ConnectionCommand::Send(frame)) => {
                        let len = frame.len();
                        if let Err(e) = ws_write.send(Message::Binary(frame.into())).await {
                            warn!(error = %e, "Failed to send frame");
                            break;
                        }
                        trace!(len, "Frame sent");
                    }

                    Some(ConnectionCommand::Shutdown) => {
                        debug!("Shutdown command received");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!("Command channel closed");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        inner.on_socket_closed(generation);
    }

    debug!(generation, "Event loop terminated");
}

/// Strips the query (and with it the API key) for logging.
pub(crate) fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.to_string()
}

// ============================================================================
// Tests
// ============================================================================
