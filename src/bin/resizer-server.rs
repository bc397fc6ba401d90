//! Resizer server binary
//!
//! Runs the HTTP image processing service or processes a single file from
//! the command line.

use resizer_server::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}
