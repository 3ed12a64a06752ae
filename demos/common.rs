//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Client construction from the environment

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use agent_link::{AgentClient, Result};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub positional: Vec<String>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            positional: args.into_iter().filter(|a| !a.starts_with("--")).collect(),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "agent_link=debug"
    } else {
        "agent_link=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Builds a client from `AGENT_LINK_ENDPOINT`, `AGENT_LINK_API_KEY`,
/// `AGENT_LINK_AGENT` and the optional `AGENT_LINK_AGENT_ID`.
pub fn client_from_env() -> Result<AgentClient> {
    let mut builder = AgentClient::builder();

    if let Ok(endpoint) = std::env::var("AGENT_LINK_ENDPOINT") {
        builder = builder.endpoint(endpoint);
    }
    if let Ok(api_key) = std::env::var("AGENT_LINK_API_KEY") {
        builder = builder.api_key(api_key);
    }
    if let Ok(agent) = std::env::var("AGENT_LINK_AGENT") {
        builder = builder.agent(agent);
    }
    if let Some(agent_id) = std::env::var("AGENT_LINK_AGENT_ID")
        .ok()
        .and_then(|id| id.parse::<u64>().ok())
    {
        builder = builder.agent_id(agent_id);
    }

    builder.build()
}
