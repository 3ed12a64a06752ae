//! Remote PTY control.
//!
//! Every operation is fire-and-forget: the frame is written if the socket
//! is open and silently dropped otherwise. The agent's answers arrive as
//! terminal output and status lines in the attached sink.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::protocol::{PtyOpenOptions, SendFrame};
use crate::transport::{Connection, TerminalSink};

// ============================================================================
// Pty
// ============================================================================

/// Handle to the agent's pseudo-terminal.
#[derive(Clone)]
pub struct Pty {
    connection: Connection,
}

impl fmt::Debug for Pty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pty")
            .field("agent", &self.connection.agent())
            .finish_non_exhaustive()
    }
}

impl Pty {
    pub(crate) fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Asks the agent to spawn a PTY.
    ///
    /// Success shows up as a "Pty Opened" line in the sink.
    pub fn create_pty(&self, options: &PtyOpenOptions) {
        debug!(cmd = %options.cmd, args = options.args.len(), "Opening PTY");
        self.connection.send_frame(&SendFrame::PtyOpen(options.clone()));
    }

    /// Resizes the remote terminal.
    pub fn resize_term(&self, cols: u16, rows: u16) {
        self.connection.send_frame(&SendFrame::PtyResize { cols, rows });
    }

    /// Types `text` into the PTY.
    pub fn send_term_data(&self, text: &str) {
        self.send_term_bytes(text.as_bytes());
    }

    /// Writes raw bytes to the PTY.
    pub fn send_term_bytes(&self, data: &[u8]) {
        self.connection.send_frame(&SendFrame::PtyWrite(data.to_vec()));
    }

    /// Asks the agent to close the PTY; the socket stays open.
    pub fn close_pty(&self) {
        debug!("Closing PTY");
        self.connection.send_frame(&SendFrame::PtyClose);
    }

    /// Attaches or detaches the terminal sink.
    pub fn set_term(&self, sink: Option<Arc<dyn TerminalSink>>) {
        self.connection.set_term(sink);
    }

    /// Closes the connection.
    pub fn close(&self) {
        self.connection.close();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::protocol::RecvFrame;
    use crate::transport::ConnectionState;
    use crate::transport::mock::{MockAgent, capture_sink, wait_until};

    async fn open_pty(agent: &MockAgent) -> Pty {
        let connection = Connection::new(agent.url("omni"), "pty", Duration::from_secs(5));
        connection.connect().await.unwrap();
        Pty::new(connection)
    }

    #[tokio::test]
    async fn test_resize_frame_bytes() {
        let agent = MockAgent::silent().await;
        let pty = open_pty(&agent).await;

        pty.resize_term(80, 24);

        assert_eq!(agent.wait_for_frames(1).await, vec![vec![3, 80, 0, 24, 0]]);
    }

    #[tokio::test]
    async fn test_create_pty_sends_options() {
        let agent = MockAgent::silent().await;
        let pty = open_pty(&agent).await;
        let options = PtyOpenOptions::new("bash").arg("-l").env("TERM", "xterm");

        pty.create_pty(&options);

        agent.wait_for_frames(1).await;
        assert_eq!(agent.received_frames(), vec![SendFrame::PtyOpen(options)]);
    }

    #[tokio::test]
    async fn test_term_data_and_close() {
        let agent = MockAgent::silent().await;
        let pty = open_pty(&agent).await;

        pty.send_term_data("ls\n");
        pty.send_term_bytes(&[0x03]);
        pty.close_pty();

        let frames = agent.wait_for_frames(3).await;
        assert_eq!(frames[0], b"\x00ls\n".to_vec());
        assert_eq!(frames[1], vec![0, 0x03]);
        assert_eq!(frames[2], vec![2]);
    }

    #[tokio::test]
    async fn test_operations_before_connect_are_dropped() {
        let agent = MockAgent::silent().await;
        let connection = Connection::new(agent.url("omni"), "pty", Duration::from_secs(5));
        let pty = Pty::new(connection.clone());

        pty.resize_term(80, 24);
        pty.send_term_data("lost");
        pty.create_pty(&PtyOpenOptions::default());

        connection.connect().await.unwrap();
        pty.send_term_data("kept");

        let frames = agent.wait_for_frames(1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(agent.received().len(), 1);
        assert_eq!(frames[0], b"\x00kept".to_vec());
    }

    #[tokio::test]
    async fn test_session_output_reaches_sink() {
        let agent = MockAgent::silent().await;
        let pty = open_pty(&agent).await;
        let (sink, written) = capture_sink();
        pty.set_term(Some(sink));

        agent.push(RecvFrame::PtyOpened.encode().unwrap());
        agent.push(RecvFrame::PtyData(b"hello\r\n".to_vec()).encode().unwrap());

        wait_until(|| String::from_utf8_lossy(&written.lock()).contains("hello")).await;
        assert!(String::from_utf8_lossy(&written.lock()).contains("[pty]"));
    }

    #[tokio::test]
    async fn test_close_closes_connection() {
        let agent = MockAgent::silent().await;
        let connection = Connection::new(agent.url("omni"), "pty", Duration::from_secs(5));
        connection.connect().await.unwrap();
        let pty = Pty::new(connection.clone());

        pty.close();

        assert_eq!(connection.state(), ConnectionState::Closed);
    }
}
