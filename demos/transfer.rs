//! File download and upload.
//!
//! Demonstrates:
//! - Querying remote file metadata
//! - Downloading with progress reporting
//! - Uploading a local file
//!
//! Usage:
//!   cargo run --example transfer -- get <remote> <local> [--debug]
//!   cargo run --example transfer -- put <local> <remote> [--debug]

mod common;

// ============================================================================
// Imports
// ============================================================================

use anyhow::{Result, bail};
use common::Args;

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
    let [mode, from, to] = args.positional.as_slice() else {
        bail!("usage: transfer get|put <from> <to>");
    };

    let client = common::client_from_env()?;
    client.connect().await?;
    let fs = client.fs();

    match mode.as_str() {
        "get" => {
            let info = fs.get_file_info(from).await?;
            println!("[Info] {} ({} bytes, mode {:o})", info.path, info.size, info.mode);

            fs.download_to(from, to, |percent| eprint!("\r        {percent:5.1}%"))
                .await?;
            eprintln!();
            println!("        ✓ Saved to {to}");
        }
        "put" => {
            let size = fs
                .upload_from(from, to, |percent| eprint!("\r        {percent:5.1}%"))
                .await?;
            eprintln!();
            println!("        ✓ Uploaded {size} bytes to {to}");
        }
        other => bail!("unknown mode: {other}"),
    }

    client.close();
    Ok(())
}
