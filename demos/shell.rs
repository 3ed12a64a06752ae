//! Interactive remote shell.
//!
//! Demonstrates:
//! - Attaching a terminal sink to stdout
//! - Opening a PTY with custom options
//! - Forwarding stdin lines as keystrokes
//!
//! Usage:
//!   AGENT_LINK_ENDPOINT=wss://host AGENT_LINK_API_KEY=.. AGENT_LINK_AGENT=box \
//!     cargo run --example shell -- [command] [--debug]

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;

use agent_link::{PtyOpenOptions, Result, TerminalSink};
use common::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let client = common::client_from_env()?;

    let sink: Arc<dyn TerminalSink> = Arc::new(|data: &[u8]| {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(data);
        let _ = stdout.flush();
    });
    client.pty().set_term(Some(sink));

    client.connect().await?;

    let cmd = args.positional.first().cloned().unwrap_or_default();
    let options = PtyOpenOptions::new(cmd).env("TERM", "xterm-256color");
    client.pty().create_pty(&options);
    client.pty().resize_term(120, 40);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !client.connection().is_open() {
            break;
        }
        client.pty().send_term_data(&format!("{line}\n"));
    }

    client.pty().close_pty();
    client.close();
    Ok(())
}
