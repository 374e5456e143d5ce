//! marketd — marketplace escrow protocol node
//!
//! Reads line-delimited protocol envelopes from stdin (one JSON envelope
//! per line, attributed to the configured peer address) and applies them
//! against the local store and wallet. Outbound envelopes go to stdout.
//! Network delivery of payloads is out of scope; pipe in whatever carrier
//! you use.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use marketd::{
    Config, InboundMessage, MarketStorage, MessageProcessor, MessageTransport, ProtocolResult,
    WalletClient,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Transport over the process's standard streams
struct StdioTransport {
    peer: String,
    lines: Lines<BufReader<Stdin>>,
}

impl StdioTransport {
    fn new(peer: String) -> Self {
        Self {
            peer,
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl MessageTransport for StdioTransport {
    async fn send(&self, payload: String) -> ProtocolResult<()> {
        println!("{payload}");
        Ok(())
    }

    async fn recv(&mut self) -> Option<InboundMessage> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    return Some(InboundMessage {
                        from: self.peer.clone(),
                        payload: line,
                    })
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!(error = %e, "stdin read failed");
                    return None;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketd=info".into()),
        )
        .init();

    let config = Config::from_env();

    tracing::info!(
        market = %config.market,
        address = %config.address,
        "starting marketd"
    );

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir))?;
    let storage = MarketStorage::open(config.db_path())
        .with_context(|| format!("opening database at {}", config.db_path().display()))?;

    let wallet = Arc::new(WalletClient::new(
        &config.wallet_rpc_url,
        &config.wallet_rpc_user,
        &config.wallet_rpc_password,
    ));

    let processor = MessageProcessor::new(
        config.market.clone(),
        config.address.clone(),
        storage,
        wallet,
    );

    let mut transport = StdioTransport::new(config.peer_address.clone());
    processor.run(&mut transport).await;

    Ok(())
}
