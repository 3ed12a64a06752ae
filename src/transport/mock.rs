//! In-process mock agent for tests.
//!
//! Binds a WebSocket server to `127.0.0.1:0`, records every frame the
//! client sends and answers through a scripted responder.
//!
//! | Constructor | Behavior |
//! |-------------|----------|
//! | [`MockAgent::silent`] | Records frames, never answers |
//! | [`MockAgent::with_responder`] | Answers each frame through a closure |
//! | [`MockAgent::with_files`] | Serves an in-memory filesystem |
//! | [`MockAgent::with_handshake_delays`] | Stalls the n-th handshake, never answers |

// ============================================================================
// Imports
// ============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

use crate::protocol::{Chunk, FileInfo, RecvFrame, SendFrame};

use super::handler::TerminalSink;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for every wait in the helpers.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// `mtime` reported for served files.
pub(crate) const MOCK_MTIME: i64 = 1_700_000_000;

// ============================================================================
// Types
// ============================================================================

type Responder = Arc<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

/// Shared in-memory filesystem served by [`MockAgent::with_files`].
pub(crate) type MockFiles = Arc<Mutex<HashMap<String, Vec<u8>>>>;

enum AgentCommand {
    Frame(Vec<u8>),
    Close,
}

struct AgentState {
    responder: Responder,
    frames: Mutex<Vec<Vec<u8>>>,
    uris: Mutex<Vec<String>>,
    peers: Mutex<Vec<mpsc::UnboundedSender<AgentCommand>>>,
    handshake_delays: Mutex<VecDeque<Duration>>,
    dialed: AtomicUsize,
    accepted: AtomicUsize,
    open: AtomicUsize,
}

// ============================================================================
// MockAgent
// ============================================================================

/// A scripted agent listening on a random local port.
pub(crate) struct MockAgent {
    port: u16,
    state: Arc<AgentState>,
}

impl MockAgent {
    /// Starts an agent that never answers.
    pub(crate) async fn silent() -> Self {
        Self::with_responder(|_| Vec::new()).await
    }

    /// Starts an agent that answers each received frame with the
    /// returned frames, in order.
    pub(crate) async fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        Self::start(Arc::new(responder), VecDeque::new()).await
    }

    /// Starts a silent agent that holds the n-th TCP connection for
    /// `delays[n]` before answering its handshake.
    pub(crate) async fn with_handshake_delays(delays: impl IntoIterator<Item = Duration>) -> Self {
        let silent: Responder = Arc::new(|_: &[u8]| -> Vec<Vec<u8>> { Vec::new() });
        Self::start(silent, delays.into_iter().collect()).await
    }

    async fn start(responder: Responder, handshake_delays: VecDeque<Duration>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state = Arc::new(AgentState {
            responder,
            frames: Mutex::new(Vec::new()),
            uris: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
            handshake_delays: Mutex::new(handshake_delays),
            dialed: AtomicUsize::new(0),
            accepted: AtomicUsize::new(0),
            open: AtomicUsize::new(0),
        });

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let delay = accept_state.handshake_delays.lock().pop_front();
                accept_state.dialed.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, Arc::clone(&accept_state), delay));
            }
        });

        Self { port, state }
    }

    /// Starts an agent serving `files`, returning the shared table.
    pub(crate) async fn with_files<I, P>(files: I) -> (Self, MockFiles)
    where
        I: IntoIterator<Item = (P, Vec<u8>)>,
        P: Into<String>,
    {
        let table: MockFiles = Arc::new(Mutex::new(
            files.into_iter().map(|(path, data)| (path.into(), data)).collect(),
        ));
        let served = Arc::clone(&table);
        let agent = Self::with_responder(move |data| serve_file_request(&served, data)).await;
        (agent, table)
    }

    /// Returns a port nothing listens on.
    pub(crate) async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    /// Returns `ws://127.0.0.1:<port>/<path>/`.
    pub(crate) fn url(&self, path: &str) -> Url {
        Url::parse(&format!("ws://127.0.0.1:{}/{path}/", self.port)).unwrap()
    }

    /// Returns `ws://127.0.0.1:<port>`.
    pub(crate) fn endpoint(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Returns every frame received so far.
    pub(crate) fn received(&self) -> Vec<Vec<u8>> {
        self.state.frames.lock().clone()
    }

    /// Returns every received frame decoded.
    pub(crate) fn received_frames(&self) -> Vec<SendFrame> {
        self.received()
            .iter()
            .map(|data| SendFrame::decode(data).unwrap())
            .collect()
    }

    /// Waits until at least `count` frames arrived.
    pub(crate) async fn wait_for_frames(&self, count: usize) -> Vec<Vec<u8>> {
        wait_until(|| self.state.frames.lock().len() >= count).await;
        self.received()
    }

    /// Returns the request URIs of every accepted handshake.
    pub(crate) fn uris(&self) -> Vec<String> {
        self.state.uris.lock().clone()
    }

    /// Returns the number of TCP connections, handshaken or not.
    pub(crate) fn dial_count(&self) -> usize {
        self.state.dialed.load(Ordering::SeqCst)
    }

    /// Returns the number of accepted sockets.
    pub(crate) fn connection_count(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// Returns the number of sockets still open.
    pub(crate) fn open_connections(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Sends an unsolicited frame on every open socket.
    pub(crate) fn push(&self, frame: Vec<u8>) {
        for peer in self.state.peers.lock().iter() {
            let _ = peer.send(AgentCommand::Frame(frame.clone()));
        }
    }

    /// Closes every open socket from the agent side.
    pub(crate) fn disconnect_all(&self) {
        for peer in self.state.peers.lock().drain(..) {
            let _ = peer.send(AgentCommand::Close);
        }
    }
}

// ============================================================================
// Server Loop
// ============================================================================

async fn serve(stream: TcpStream, state: Arc<AgentState>, delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let uri_state = Arc::clone(&state);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        uri_state.uris.lock().push(request.uri().to_string());
        Ok(response)
    };

    let Ok(ws_stream) = accept_hdr_async(stream, callback).await else {
        return;
    };

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.peers.lock().push(tx.clone());
    state.accepted.fetch_add(1, Ordering::SeqCst);
    state.open.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            message = ws_read.next() => match message {
                Some(Ok(Message::Binary(data))) => {
                    state.frames.lock().push(data.to_vec());
                    for reply in (state.responder)(&data) {
                        let _ = tx.send(AgentCommand::Frame(reply));
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },

            command = rx.recv() => match command {
                Some(AgentCommand::Frame(frame)) => {
                    if ws_write.send(Message::Binary(frame.into())).await.is_err() {
                        break;
                    }
                }
                Some(AgentCommand::Close) | None => {
                    let _ = ws_write.close().await;
                    break;
                }
            },
        }
    }

    state.open.fetch_sub(1, Ordering::SeqCst);
}

/// Answers file requests from the in-memory table.
fn serve_file_request(files: &MockFiles, data: &[u8]) -> Vec<Vec<u8>> {
    let reply = match SendFrame::decode(data) {
        Ok(SendFrame::FileQueryInfo { path }) => match files.lock().get(&path) {
            Some(content) => RecvFrame::FileInfo(FileInfo {
                size: content.len() as u64,
                mode: 0o644,
                mtime: MOCK_MTIME,
                path,
            }),
            None => RecvFrame::Log(format!("stat {path}: no such file or directory")),
        },

        Ok(SendFrame::FileRead {
            path,
            offset,
            max_length,
        }) => match files.lock().get(&path) {
            Some(content) => {
                let start = (offset.max(0) as usize).min(content.len());
                let end = start.saturating_add(max_length as usize).min(content.len());
                RecvFrame::FileChunkRead {
                    chunk: Chunk::new(offset as u64, content[start..end].to_vec()),
                    path,
                }
            }
            None => RecvFrame::Log(format!("open {path}: no such file or directory")),
        },

        Ok(SendFrame::FileWriteOrTruncate { path, chunk }) => {
            let mut files = files.lock();
            let content = files.entry(path.clone()).or_default();
            let offset = chunk.offset as usize;
            if chunk.is_empty() {
                content.resize(offset, 0);
            } else {
                let end = offset + chunk.len();
                if content.len() < end {
                    content.resize(end, 0);
                }
                content[offset..end].copy_from_slice(&chunk.data);
            }
            RecvFrame::FileWritten {
                path,
                offset: chunk.offset,
            }
        }

        _ => return Vec::new(),
    };

    vec![reply.encode().unwrap()]
}

// ============================================================================
// Helpers
// ============================================================================

/// Polls `condition` until it holds, panicking after a few seconds.
pub(crate) async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {WAIT_LIMIT:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Returns a sink that appends to the returned buffer.
pub(crate) fn capture_sink() -> (Arc<dyn TerminalSink>, Arc<Mutex<Vec<u8>>>) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&written);
    let sink: Arc<dyn TerminalSink> =
        Arc::new(move |data: &[u8]| captured.lock().extend_from_slice(data));
    (sink, written)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_binds_random_port() {
        let agent = MockAgent::silent().await;
        assert_ne!(agent.port, 0);
        assert!(agent.endpoint().starts_with("ws://127.0.0.1:"));
        assert_eq!(agent.connection_count(), 0);
    }

    #[test]
    fn test_served_write_then_truncate() {
        let files: MockFiles = Arc::new(Mutex::new(HashMap::new()));

        let write = SendFrame::FileWriteOrTruncate {
            path: "/f".into(),
            chunk: Chunk::new(2, b"xy".to_vec()),
        };
        serve_file_request(&files, &write.encode().unwrap());
        assert_eq!(files.lock()["/f"], vec![0, 0, b'x', b'y']);

        let truncate = SendFrame::FileWriteOrTruncate {
            path: "/f".into(),
            chunk: Chunk::new(3, Vec::new()),
        };
        serve_file_request(&files, &truncate.encode().unwrap());
        assert_eq!(files.lock()["/f"], vec![0, 0, b'x']);
    }

    #[test]
    fn test_served_read_past_end_is_empty() {
        let files: MockFiles = Arc::new(Mutex::new(HashMap::from([(
            "/f".to_string(),
            b"abc".to_vec(),
        )])));

        let read = SendFrame::FileRead {
            path: "/f".into(),
            offset: 10,
            max_length: 4,
        };
        let replies = serve_file_request(&files, &read.encode().unwrap());
        match RecvFrame::decode(&replies[0]).unwrap() {
            RecvFrame::FileChunkRead { chunk, .. } => assert!(chunk.is_empty()),
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
