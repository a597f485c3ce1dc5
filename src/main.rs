//! naga-bridge: console channel for the NagaAgent chat bridge.
//!
//! Reads chat lines from stdin (`<user>: <text>`, or plain text for the
//! `--user` default) and prints the bridge's replies to stdout.

use std::path::PathBuf;

use clap::Parser;

/// Chat bridge to the NagaAgent conversational API
#[derive(Parser, Debug)]
#[command(name = "naga-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to naga-bridge.yaml (overrides NAGA_BRIDGE_CONFIG and the upward search)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// User name for lines without a `<user>:` prefix
    #[arg(short, long, default_value = "me")]
    user: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    naga_bridge::run(naga_bridge::RunOptions {
        config_path: cli.config,
        default_user: cli.user,
    })
    .await
}
