//! WebSocket transport layer.
//!
//! This module owns the single WebSocket between the client (Rust) and the
//! remote agent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  AgentClient    │                              │  Remote agent   │
//! │                 │         WebSocket            │                 │
//! │  Connection ────┼─────────────────────────────►│  PTY + files    │
//! │  → sink         │  /api/agent/<name>/omni/     │                 │
//! │  → handlers     │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` - Open the socket (shared by concurrent callers)
//! 2. `Connection::send` - Write frames while open
//! 3. Event loop - Route PTY frames to the sink, the rest to the handler chain
//! 4. `Connection::close` - Close the socket; handlers stay registered
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `handler` | Terminal sink and frame handler traits |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Extension points of the connection.
pub mod handler;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{AGENT_LOG_TARGET, Connection, ConnectionState, DEFAULT_CONNECT_TIMEOUT};
pub use handler::{FrameHandler, TerminalSink};

pub(crate) use connection::redact;
