//! # Peerlink Chat Node
//!
//! Reads `nickname: text` lines from stdin and sends each from that peer.
//! Chat lines of every peer are printed as they arrive. Stops on Ctrl+C or
//! end of input.
//!
//! Logging follows `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use node_runtime::{NodeConfig, NodeRuntime};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Split `nickname: text`.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (nickname, text) = line.split_once(':')?;
    let nickname = nickname.trim();
    let text = text.trim();
    if nickname.is_empty() || text.is_empty() {
        return None;
    }
    Some((nickname, text))
}

/// Print every peer's history as it grows.
fn spawn_printers(runtime: &NodeRuntime) {
    for peer in runtime.peers() {
        let nickname = peer.nickname().to_string();
        let mut updates = peer.history().subscribe();
        tokio::spawn(async move {
            while let Ok(line) = updates.recv().await {
                println!("[{nickname}] {}: {}", line.from, line.text);
            }
        });
    }
}

async fn run_console(runtime: &NodeRuntime) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("End of input");
                    return Ok(());
                };
                match parse_line(&line) {
                    Some((nickname, text)) => {
                        if let Err(error) = runtime.say(nickname, text).await {
                            warn!(%error, "Send failed");
                        }
                    }
                    None => warn!("Expected `nickname: text`"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Ctrl+C received");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    let runtime = NodeRuntime::new(config).context("Failed to create node runtime")?;
    spawn_printers(&runtime);
    runtime.start().await.context("Failed to start peers")?;

    let nicknames: Vec<&str> = runtime.peers().iter().map(|p| p.nickname()).collect();
    info!(peers = ?nicknames, "Node is running. Type `nickname: text`, Ctrl+C to stop.");

    let console = run_console(&runtime).await;
    runtime.shutdown().await.context("Shutdown failed")?;
    console
}
