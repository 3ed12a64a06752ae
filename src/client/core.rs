//! Agent link client.
//!
//! The [`AgentClient`] ties one [`Connection`] to the PTY and file services
//! that run over it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use agent_link::{AgentClient, PtyOpenOptions, TerminalSink};
//!
//! # async fn example() -> agent_link::Result<()> {
//! let client = AgentClient::builder()
//!     .endpoint("wss://control.example.com")
//!     .api_key("secret")
//!     .agent("build-box")
//!     .build()?;
//!
//! let sink: Arc<dyn TerminalSink> =
//!     Arc::new(|data: &[u8]| print!("{}", String::from_utf8_lossy(data)));
//! client.pty().set_term(Some(sink));
//! client.connect().await?;
//! client.pty().create_pty(&PtyOpenOptions::default());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::identifiers::AgentId;
use crate::session::{FileTransfer, Pty};
use crate::transport::{Connection, ConnectionState};

use super::builder::{AgentClientBuilder, ClientConfig};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
struct AgentClientInner {
    /// Agent id, if configured.
    agent_id: Option<AgentId>,
    /// The socket to the agent.
    connection: Connection,
    /// PTY control.
    pty: Pty,
    /// File transfers.
    fs: FileTransfer,
}

// ============================================================================
// AgentClient
// ============================================================================

/// Client for one remote agent.
///
/// Cheap to clone. Several clients, for the same or different agents, can
/// coexist; each owns its own socket.
#[derive(Clone)]
pub struct AgentClient {
    inner: Arc<AgentClientInner>,
}

impl fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentClient")
            .field("agent", &self.agent())
            .field("agent_id", &self.inner.agent_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AgentClient {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> AgentClientBuilder {
        AgentClientBuilder::new()
    }

    pub(crate) fn new(config: ClientConfig) -> Self {
        let connection = Connection::new(config.url, config.agent, config.connect_timeout);
        let fs = FileTransfer::new(connection.clone(), config.request_timeout, config.chunk_size);
        let pty = Pty::new(connection.clone());

        Self {
            inner: Arc::new(AgentClientInner {
                agent_id: config.agent_id,
                connection,
                pty,
                fs,
            }),
        }
    }
}

// ============================================================================
// AgentClient - Public API
// ============================================================================

impl AgentClient {
    /// Opens the socket, or joins the attempt already in flight.
    ///
    /// # Errors
    ///
    /// See [`Connection::connect`].
    pub async fn connect(&self) -> Result<()> {
        self.inner.connection.connect().await?;
        info!(agent = %self.agent(), "Client connected");
        Ok(())
    }

    /// Closes the socket.
    pub fn close(&self) {
        self.inner.connection.close();
    }

    /// Returns the PTY controller.
    #[inline]
    #[must_use]
    pub fn pty(&self) -> &Pty {
        &self.inner.pty
    }

    /// Returns the file transfer service.
    #[inline]
    #[must_use]
    pub fn fs(&self) -> &FileTransfer {
        &self.inner.fs
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Returns the agent name.
    #[inline]
    #[must_use]
    pub fn agent(&self) -> &str {
        self.inner.connection.agent()
    }

    /// Returns the agent id, if configured.
    #[inline]
    #[must_use]
    pub fn agent_id(&self) -> Option<AgentId> {
        self.inner.agent_id
    }

    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::protocol::PtyOpenOptions;
    use crate::transport::mock::{MockAgent, capture_sink, wait_until};

    fn client_for(agent: &MockAgent) -> AgentClient {
        AgentClient::builder()
            .endpoint(agent.endpoint())
            .api_key("test-key")
            .agent("box")
            .agent_id(7u64)
            .request_timeout(Some(Duration::from_secs(5)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_uses_agent_path() {
        let agent = MockAgent::silent().await;
        let client = client_for(&agent);
        assert_eq!(client.state(), ConnectionState::Idle);

        client.connect().await.unwrap();

        assert_eq!(client.state(), ConnectionState::Open);
        wait_until(|| !agent.uris().is_empty()).await;
        assert_eq!(
            agent.uris(),
            vec!["/api/agent/box/omni/?api_key=test-key&agent_id=7".to_string()]
        );
    }

    #[tokio::test]
    async fn test_shell_and_transfer_share_one_socket() {
        let (agent, files) = MockAgent::with_files([("/etc/hostname", b"box\n".to_vec())]).await;
        let client = client_for(&agent);
        let (sink, written) = capture_sink();
        client.pty().set_term(Some(sink));
        client.connect().await.unwrap();

        client.pty().create_pty(&PtyOpenOptions::default());
        client.pty().resize_term(120, 40);
        let file = client.fs().download_file("/etc/hostname", |_| {}).await.unwrap();
        client
            .fs()
            .upload_file("/tmp/copy", &file.data, |_| {})
            .await
            .unwrap();

        assert_eq!(file.data, b"box\n");
        assert_eq!(files.lock()["/tmp/copy"], b"box\n");
        assert_eq!(agent.connection_count(), 1);
        assert!(String::from_utf8_lossy(&written.lock()).contains("[box]"));
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let agent = MockAgent::silent().await;
        let first = client_for(&agent);
        let second = client_for(&agent);

        first.connect().await.unwrap();
        second.connect().await.unwrap();
        first.close();

        assert_eq!(first.state(), ConnectionState::Closed);
        assert_eq!(second.state(), ConnectionState::Open);
        wait_until(|| agent.connection_count() == 2).await;
    }

    #[test]
    fn test_debug_output() {
        let client = AgentClient::builder()
            .endpoint("ws://localhost:1")
            .api_key("hidden")
            .agent("dbg")
            .build()
            .unwrap();

        let debug = format!("{client:?}");
        assert!(debug.contains("dbg"));
        assert!(!debug.contains("hidden"));
        assert_eq!(client.agent_id(), None);
    }
}
