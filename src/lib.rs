//! Agent Link - remote shell and file transfer over one WebSocket.
//!
//! This library drives a remote agent through a single binary WebSocket:
//! an interactive pseudo-terminal and chunked file transfer share the link.
//!
//! # Architecture
//!
//! The client follows a simple local/remote model:
//!
//! - **Local End (Rust)**: Sends tagged binary frames, routes replies
//! - **Remote End (Agent)**: Owns the PTY and the filesystem
//!
//! Key design principles:
//!
//! - Each [`AgentClient`] owns: one [`Connection`] + event loop + services
//! - Frames are `tag byte + payload`; structured payloads are MessagePack
//! - PTY control is fire-and-forget; file requests are correlated by key
//! - Requests sharing a key queue behind each other instead of colliding
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use agent_link::{AgentClient, PtyOpenOptions, Result, TerminalSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = AgentClient::builder()
//!         .endpoint("wss://control.example.com")
//!         .api_key("secret")
//!         .agent("build-box")
//!         .build()?;
//!
//!     // Print terminal output
//!     let sink: Arc<dyn TerminalSink> =
//!         Arc::new(|data: &[u8]| print!("{}", String::from_utf8_lossy(data)));
//!     client.pty().set_term(Some(sink));
//!
//!     client.connect().await?;
//!     client.pty().create_pty(&PtyOpenOptions::new("bash"));
//!     client.pty().send_term_data("uname -a\n");
//!
//!     // Fetch a file over the same socket
//!     let file = client.fs().download_file("/etc/hostname", |_| {}).await?;
//!     println!("hostname: {}", String::from_utf8_lossy(&file.data));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client entry point and configuration |
//! | [`session`] | PTY control and file transfer |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Agent ids and request keys |
//! | [`protocol`] | Binary frame codec |
//! | [`transport`] | WebSocket connection and event loop |
//!
//! # Logging
//!
//! All diagnostics go through `tracing`. Agent-side log lines are emitted
//! under the `agent_link::agent` target. API keys are never logged.

// ============================================================================
// Modules
// ============================================================================

/// Client entry point and configuration.
///
/// Use [`AgentClient::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Agent ids and request correlation keys.
pub mod identifiers;

/// Binary frame codec.
///
/// Tags, payloads and the encode/decode functions for both directions.
pub mod protocol;

/// PTY control and file transfer services.
pub mod session;

/// WebSocket transport layer.
///
/// Connection lifecycle, event loop and the handler chain.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{AgentClient, AgentClientBuilder};

// Session types
pub use session::{DownloadedFile, FileTransfer, Pty};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{AgentId, RequestKey};

// Protocol types
pub use protocol::{Chunk, FileInfo, PtyOpenOptions, RecvFrame, SendFrame};

// Transport types
pub use transport::{Connection, ConnectionState, FrameHandler, TerminalSink};
